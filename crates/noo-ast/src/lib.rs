//! AST data types for Noolang.
//!
//! This crate is deliberately *not* a lexer or parser: it only defines the
//! shapes that a lexer/parser (or, in tests, a hand-built fixture) produces
//! and that the inferencer (`noo-ty`) and evaluator (`noo-eval`) consume.
//! Source spans, token kinds and grammar productions are someone else's
//! problem; what lives here is the contract between "parsed program" and
//! "type-checked and evaluated program".

pub mod expr;
pub mod item;
pub mod op;
pub mod pattern;
pub mod type_ref;

pub use expr::{Body, Expr, ExprId};
pub use item::{Definition, ImplDef, Program, TraitDef, TypeDef, ValueDef, VariantDef};
pub use op::{BinaryOp, Effect};
pub use pattern::{PatId, Pattern};
pub use type_ref::{ConstraintRef, TypeRef};

#[cfg(test)]
mod tests;

use smol_str::SmolStr;

/// A source location. Kept as an opaque, copyable span rather than anything
/// byte-range-specific, since this crate never looks inside it -- it only
/// threads it through to diagnostics produced by `noo-ty`/`noo-eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
}

impl Span {
    pub const DUMMY: Span = Span { lo: 0, hi: 0 };
}

/// An identifier: a variable, field, trait, or type name.
pub type Name = SmolStr;
