//! Operators and effect tags.
//!
//! The precedence table lives in the parser (out of scope here); what this
//! module fixes is the *closed* set of binary operators and effect tags the
//! rest of the pipeline switches on.

/// Binary operators, lowest precedence first -- matches spec §6.1's table.
/// `;` (sequencing) and bindings are not operators, they're `Expr` shapes
/// (`Expr::Seq`, `Expr::Let`); they are not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `$` -- low precedence application, right-associative.
    Dollar,
    /// `|` -- thrush: value-then-function application.
    Thrush,
    /// `|?` -- safe bind, desugars to trait `Monad::bind`.
    SafeBind,
    /// `|>` -- left-to-right pipeline.
    PipeRight,
    /// `<|` -- right-to-left pipeline.
    PipeLeft,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// The trait the inferencer attaches a constraint to for this operator,
    /// if it is dispatched through the trait system rather than being a
    /// structural/control-flow operator. `None` for operators handled
    /// directly by the inferencer (pipelines, thrush, safe bind).
    pub fn trait_name(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("Add"),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => Some("Numeric"),
            BinaryOp::Eq | BinaryOp::NotEq => None, // see spec open question on `==`
            _ => None,
        }
    }

    /// `true` for the comparison family, which always returns `Bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
        )
    }
}

/// The closed set of effect tags a function's body may carry. Unioned
/// across composition (spec §3.1, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Effect {
    Read,
    Write,
    State,
    Rand,
    Log,
    Err,
}

impl Effect {
    pub const ALL: [Effect; 6] =
        [Effect::Read, Effect::Write, Effect::State, Effect::Rand, Effect::Log, Effect::Err];

    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Read => "read",
            Effect::Write => "write",
            Effect::State => "state",
            Effect::Rand => "rand",
            Effect::Log => "log",
            Effect::Err => "err",
        }
    }
}
