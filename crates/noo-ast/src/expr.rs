//! Expressions. An arena-allocated tree (`la_arena`, the published successor
//! to rust-analyzer's internal `ra_arena`) rather than a `Box`-linked tree:
//! every sub-expression gets a small `Idx<Expr>` handle, so the inferencer
//! and evaluator can both build side tables (`ExprId -> Type`, `ExprId ->
//! Value`) keyed by that handle instead of threading results through the
//! tree itself.

use crate::{op::BinaryOp, pattern::PatId, type_ref::TypeRef, Name};
use la_arena::{Arena, Idx};

pub type ExprId = Idx<Expr>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal. Noolang collapses int/float (spec §4.4): there is no
    /// separate integer literal kind here.
    Number(f64),
    StringLit(String),
    Unit,
    Var(Name),
    /// `fn x y => body` -- stored pre-curried: `params` is the full
    /// parameter list, and `noo-ty`/`noo-eval` are responsible for treating
    /// an n-ary lambda as sugar for nested unary ones when unifying or
    /// applying.
    Lambda { params: Vec<PatId>, body: ExprId },
    /// Juxtaposition application, `f a b`. `args` may be a partial prefix of
    /// `f`'s arity; the inferencer and evaluator both handle partial
    /// application uniformly via currying.
    App { func: ExprId, args: Vec<ExprId> },
    If { cond: ExprId, then_branch: ExprId, else_branch: ExprId },
    Match { scrutinee: ExprId, arms: Vec<(PatId, ExprId)> },
    Record(Vec<(Name, ExprId)>),
    Tuple(Vec<ExprId>),
    List(Vec<ExprId>),
    /// `@field` or `@field?` used as a value (a function), not applied here.
    Accessor { field: Name, optional: bool },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    /// `a ; b` -- evaluate `a` for effect, discard, continue with `b`.
    Seq { first: ExprId, rest: ExprId },
    /// `pat = value; body` (also covers recursive defs: `recursive` is true
    /// when `pat` is a single variable that occurs free in `value`).
    Let { pat: PatId, value: ExprId, body: ExprId, recursive: bool },
    /// `body where (p1 = e1; p2 = e2; ...)`
    Where { body: ExprId, bindings: Vec<(PatId, ExprId)> },
    Import { path: String },
    /// `e : T` / `e : T given ...`
    Annotate { expr: ExprId, ty: TypeRef },
    /// `mut x = init; body` -- introduces a `Cell`-backed binding.
    Mut { name: Name, init: ExprId, body: ExprId },
    /// `mut! x = value; body` -- reassigns an existing `Cell` binding.
    MutSet { name: Name, value: ExprId, body: ExprId },
}

/// A function/value body: the arena owning every sub-expression and pattern
/// reachable from `root`, plus the arenas owning their patterns.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub exprs: Arena<Expr>,
    pub pats: Arena<crate::Pattern>,
    pub root: Option<ExprId>,
}

impl Body {
    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.alloc(expr)
    }

    pub fn alloc_pat(&mut self, pat: crate::Pattern) -> crate::PatId {
        self.pats.alloc(pat)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn pattern(&self, id: crate::PatId) -> &crate::Pattern {
        &self.pats[id]
    }
}
