//! Runtime error taxonomy (spec §7's `RuntimeError` kind, split into
//! distinct variants the way `noo-ty::TypeError` splits the static
//! taxonomy -- a `thiserror`-derived enum rather than a bag of strings).

use noo_ast::Name;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: Name },

    #[error("attempted to call a non-function value")]
    NotCallable,

    #[error("expected {expected} argument(s) in {context}, got {got}")]
    ArityMismatch { expected: usize, got: usize, context: String },

    #[error("non-exhaustive match: no arm matched the scrutinee")]
    NonExhaustiveMatch,

    #[error("no implementation of `{trait_name}.{function}` for `{type_name}`")]
    NoImplementation { trait_name: Name, function: Name, type_name: Name },

    #[error("`|?` is unavailable for `{type_name}`: no `Monad.bind` implementation")]
    SafeBindUnavailable { type_name: Name },

    #[error("cell misuse: {message}")]
    CellMisuse { message: String },

    #[error("import failed: {path}")]
    ImportFailure { path: String },

    #[error("type error at runtime: {message}")]
    TypeError { message: String },

    #[error("exceeded maximum call depth ({max})")]
    StackOverflow { max: usize },
}
