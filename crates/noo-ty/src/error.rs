//! The error taxonomy from spec §7, as a real `std::error::Error` hierarchy
//! instead of prose. Every variant carries enough to render a one-line
//! repair hint without re-walking the program.

use crate::display::HirDisplay;
use crate::ty::Type;
use noo_ast::Span;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TypeError {
    #[error("type mismatch: expected {expected}, got {got}{}", hint_suffix(.hint))]
    TypeMismatch { expected: String, got: String, location: Span, hint: Option<String> },

    #[error("occurs check failed: {var} occurs in {in_ty}")]
    OccursCheck { var: SmolStr, in_ty: String, location: Span },

    #[error("undefined variable `{name}`{}", hint_suffix(.hint))]
    UndefinedVariable { name: SmolStr, location: Span, hint: Option<String> },

    #[error("arity mismatch in {context}: expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize, context: String, location: Span },

    #[error("record is missing field `{field}`")]
    RowMissingField { record: String, field: SmolStr, location: Span },

    #[error("no implementation of `{trait_name}.{function}` for `{type_name}`")]
    NoImplementation {
        trait_name: SmolStr,
        function: SmolStr,
        type_name: SmolStr,
        available_types: Vec<SmolStr>,
        location: Span,
    },

    #[error("ambiguous implementation of `{function}` for `{type_name}`: matched by traits {traits:?}")]
    AmbiguousImplementation { function: SmolStr, type_name: SmolStr, traits: Vec<SmolStr> },

    #[error("unsolved constraint on `{var}`: {constraint}")]
    ConstraintUnsolved { var: SmolStr, constraint: String, location: Span },

    #[error("recursive ADT definitions are not supported (`{name}`)")]
    RecursiveAdtUnsupported { name: SmolStr, location: Span },
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" ({h})"),
        None => String::new(),
    }
}

impl TypeError {
    pub fn mismatch(expected: &Type, got: &Type, location: Span, hint: impl Into<Option<String>>) -> Self {
        TypeError::TypeMismatch {
            expected: expected.display_string(),
            got: got.display_string(),
            location,
            hint: hint.into(),
        }
    }
}
