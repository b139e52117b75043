//! Patterns, as matched by `match` arms and destructured in `let`-like
//! binding positions (spec §4.6: "Pattern matching evaluation traverses a
//! `Pattern` tree, collecting a bindings map").

use crate::Name;
use la_arena::{Arena, Idx};

pub type PatId = Idx<Pattern>;
pub type PatternArena = Arena<Pattern>;

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard,
    Variable(Name),
    Number(f64),
    String(String),
    /// `Some x`, `Cons h t`, `True` (zero args), ...
    Constructor { name: Name, args: Vec<PatId> },
    Tuple(Vec<PatId>),
    /// `{@name n, @age a}` -- matching a subset of fields is fine, matching
    /// width subtyping just like the `has` constraint does for accessors.
    Record(Vec<(Name, PatId)>),
}
