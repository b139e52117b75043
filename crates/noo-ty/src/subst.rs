//! Substitution and unification (spec §4.1).
//!
//! Unlike the prose in spec §4.1, which describes substitution as a plain
//! `Map<var, Type>`, this port follows `ra_hir_ty`'s own lead (its doc
//! comment: "we use the union-find implementation from the `ena` crate,
//! which is extracted from rustc") and backs the substitution with
//! `ena::unify::InPlaceUnificationTable`. A type variable is an opaque
//! `TypeVar(u32)` key into that table rather than a name; `Type::Variable`
//! carries the key plus whatever constraints were attached to it at the
//! point of instantiation. The table is the single source of truth for
//! "is this variable bound, and to what" and composes without loss: binding
//! `a -> b` and then `b -> c` makes `find`/`probe_value` report `c` for `a`
//! directly, which is `ena`'s path compression giving us spec's required
//! "apply(α) = γ" for free.

use crate::ty::{merge_constraints, Constraint, Type};
use ena::unify::{InPlaceUnificationTable, NoError, UnifyKey, UnifyValue};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub(crate) u32);

impl std::fmt::Display for TypeVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSlot(pub Option<Type>);

impl UnifyValue for TypeSlot {
    type Error = NoError;

    fn unify_values(a: &Self, b: &Self) -> Result<Self, NoError> {
        match (&a.0, &b.0) {
            (None, None) => Ok(TypeSlot(None)),
            (Some(t), None) | (None, Some(t)) => Ok(TypeSlot(Some(t.clone()))),
            // Both sides already resolved: the caller (`unify`) always
            // resolves before binding, so this only happens when two
            // variables that are each already bound get unioned directly;
            // keep the left value and let the next `apply` re-check equality.
            (Some(t), Some(_)) => Ok(TypeSlot(Some(t.clone()))),
        }
    }
}

impl UnifyKey for TypeVar {
    type Value = TypeSlot;

    fn index(&self) -> u32 {
        self.0
    }
    fn from_index(u: u32) -> Self {
        TypeVar(u)
    }
    fn tag() -> &'static str {
        "TypeVar"
    }
}

#[derive(Default)]
pub struct UnificationStats {
    pub calls: u64,
}

/// The mutable context threaded through inference (spec §3.4's `TypeState`,
/// minus `env`/`adtRegistry`/`traitRegistry`/`accessorCache`, which live at
/// the `Inferencer` level in `infer.rs` since they aren't part of the
/// substitution itself).
pub struct InferenceTable {
    table: InPlaceUnificationTable<TypeVar>,
    constraints: FxHashMap<TypeVar, Vec<Constraint>>,
    counter: u32,
    pub stats: UnificationStats,
}

impl Default for InferenceTable {
    fn default() -> Self {
        InferenceTable {
            table: InPlaceUnificationTable::new(),
            constraints: FxHashMap::default(),
            counter: 0,
            stats: UnificationStats::default(),
        }
    }
}

impl InferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freshens a brand new variable, per spec §4.3 instantiation ("freshen
    /// to a new `α_n`, n from state counter").
    pub fn new_var(&mut self, constraints: Vec<Constraint>) -> TypeVar {
        let var = self.table.new_key(TypeSlot(None));
        self.counter += 1;
        if !constraints.is_empty() {
            self.constraints.insert(var, constraints);
        }
        var
    }

    pub fn fresh_name(&mut self) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("t{n}")
    }

    pub fn constraints_of(&self, var: TypeVar) -> &[Constraint] {
        let root = {
            // `find` needs `&mut self`; callers that only want a read should
            // have already canonicalized via `apply`. For convenience here
            // we fall back to the unresolved key if we can't get mutable
            // access to the table (this function takes `&self`).
            var
        };
        self.constraints.get(&root).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn find(&mut self, var: TypeVar) -> TypeVar {
        self.table.find(var)
    }

    pub fn probe_value(&mut self, var: TypeVar) -> Option<Type> {
        let root = self.table.find(var);
        self.table.probe_value(root).0
    }

    /// Attaches an extra constraint directly to `var`'s root, e.g. for a
    /// `given` clause on a surface annotation discovered after the variable
    /// it targets was already lowered.
    pub fn add_constraint(&mut self, var: TypeVar, c: Constraint) {
        let root = self.table.find(var);
        let entry = self.constraints.entry(root).or_default();
        if !entry.contains(&c) {
            entry.push(c);
        }
    }

    fn merge_constraints_onto(&mut self, from: TypeVar, onto: TypeVar) {
        if let Some(existing) = self.constraints.remove(&from) {
            let entry = self.constraints.entry(onto).or_default();
            merge_constraints(entry, &existing);
        }
    }

    fn bind(&mut self, var: TypeVar, ty: Type) {
        self.table.union_value(var, TypeSlot(Some(ty)));
    }

    /// `apply(sigma, T)`: rewrites every `Variable` leaf by following the
    /// table to its current binding, recursively. Idempotent once the
    /// substitution is stable (testable property "unification idempotence").
    pub fn apply(&mut self, ty: &Type) -> Type {
        match ty {
            Type::Variable { var, constraints } => {
                let root = self.table.find(*var);
                match self.table.probe_value(root).0 {
                    Some(bound) => self.apply(&bound),
                    None => {
                        let mut all = constraints.clone();
                        merge_constraints(&mut all, self.constraints.get(&root).map(|v| v.as_slice()).unwrap_or(&[]));
                        Type::Variable { var: root, constraints: all }
                    }
                }
            }
            Type::Primitive(_) | Type::Unit | Type::Unknown => ty.clone(),
            Type::Function { params, ret, effects, constraints } => Type::Function {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
                effects: effects.clone(),
                constraints: constraints.clone(),
            },
            Type::List(elem) => Type::List(Box::new(self.apply(elem))),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            Type::Record(fields) => {
                Type::Record(fields.iter().map(|(k, v)| (k.clone(), self.apply(v))).collect())
            }
            Type::Variant { name, args } => {
                Type::Variant { name: name.clone(), args: args.iter().map(|a| self.apply(a)).collect() }
            }
            Type::Union(types) => Type::Union(types.iter().map(|t| self.apply(t)).collect()),
            Type::Constrained { base, constraints } => {
                Type::Constrained { base: Box::new(self.apply(base)), constraints: constraints.clone() }
            }
        }
    }

    fn occurs(&mut self, var: TypeVar, ty: &Type) -> bool {
        match ty {
            Type::Variable { var: other, .. } => self.table.find(*other) == self.table.find(var),
            Type::Primitive(_) | Type::Unit | Type::Unknown => false,
            Type::Function { params, ret, .. } => {
                params.iter().any(|p| self.occurs(var, p)) || self.occurs(var, ret)
            }
            Type::List(elem) => self.occurs(var, elem),
            Type::Tuple(elems) => elems.iter().any(|e| self.occurs(var, e)),
            Type::Record(fields) => fields.values().any(|v| self.occurs(var, v)),
            Type::Variant { args, .. } => args.iter().any(|a| self.occurs(var, a)),
            Type::Union(types) => types.iter().any(|t| self.occurs(var, t)),
            Type::Constrained { base, .. } => self.occurs(var, base),
        }
    }

    /// Binds `var` to `resolved` (a non-variable, or a variable with a
    /// *different* root), moving `var`'s constraints across.
    fn bind_var(&mut self, var: TypeVar, resolved: Type) -> Result<(), UnifyError> {
        if self.occurs(var, &resolved) {
            return Err(UnifyError::OccursCheck {
                var: format!("{var}"),
                in_ty: crate::display::debug_string(&resolved),
            });
        }
        match resolved {
            Type::Variable { var: other, constraints } => {
                let other_root = self.table.find(other);
                self.merge_constraints_onto(var, other_root);
                if !constraints.is_empty() {
                    let entry = self.constraints.entry(other_root).or_default();
                    merge_constraints(entry, &constraints);
                }
                self.table.union(var, other_root);
            }
            other => self.bind(var, other),
        }
        Ok(())
    }

    /// `unify(t1, t2, state) -> state'` from spec §4.1.
    pub fn unify(&mut self, t1: &Type, t2: &Type) -> Result<(), UnifyError> {
        self.stats.calls += 1;

        let a = self.apply(t1);
        let b = self.apply(t2);

        if a == b {
            return Ok(());
        }

        match (&a, &b) {
            (Type::Variable { var, .. }, _) => return self.bind_var(*var, b),
            (_, Type::Variable { var, .. }) => return self.bind_var(*var, a),
            _ => {}
        }

        match (&a, &b) {
            (Type::Primitive(x), Type::Primitive(y)) if x == y => Ok(()),
            (Type::Unit, Type::Unit) => Ok(()),
            (Type::Unknown, _) | (_, Type::Unknown) => Ok(()),
            (Type::List(x), Type::List(y)) => self.unify(x, y),
            (Type::Tuple(xs), Type::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return Err(UnifyError::Mismatch {
                        expected: crate::display::debug_string(&a),
                        got: crate::display::debug_string(&b),
                    });
                }
                for (x, y) in xs.iter().zip(ys.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (Type::Record(xs), Type::Record(ys)) => {
                if xs.len() != ys.len() || !xs.keys().all(|k| ys.contains_key(k)) {
                    return Err(UnifyError::Mismatch {
                        expected: crate::display::debug_string(&a),
                        got: crate::display::debug_string(&b),
                    });
                }
                for (k, xv) in xs {
                    self.unify(xv, &ys[k])?;
                }
                Ok(())
            }
            (Type::Variant { name: n1, args: a1 }, Type::Variant { name: n2, args: a2 })
                if n1 == n2 && a1.len() == a2.len() =>
            {
                for (x, y) in a1.iter().zip(a2.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            (
                Type::Function { params: p1, ret: r1, effects: e1, .. },
                Type::Function { params: p2, ret: r2, effects: e2, .. },
            ) => {
                if p1.len() != p2.len() {
                    return Err(UnifyError::Mismatch {
                        expected: crate::display::debug_string(&a),
                        got: crate::display::debug_string(&b),
                    });
                }
                for (x, y) in p1.iter().zip(p2.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(r1, r2)?;
                // Effects never disagree in a way that fails unification
                // ("union the effect sets, no inequality", spec §4.1 point
                // 4) -- `e1`/`e2` themselves are combined by
                // `unify_functions` below, not here: a plain `unify` call
                // only records compatibility in the substitution table and
                // has nowhere to store a merged effect set for two already-
                // concrete `Function` types that aren't bound through a
                // shared variable.
                let _ = (e1, e2);
                Ok(())
            }
            (Type::Constrained { base: b1, .. }, _) => self.unify(b1, &b),
            (_, Type::Constrained { base: b2, .. }) => self.unify(&a, b2),
            _ => Err(UnifyError::Mismatch {
                expected: crate::display::debug_string(&a),
                got: crate::display::debug_string(&b),
            }),
        }
    }

    /// `unify`, then hands back the unified type with its effect row
    /// unioned (spec §4.1 point 4), for call sites that merge two
    /// independently-inferred branches into one result type (`if`/`match`
    /// arms) -- those can't rely on plain `unify` for this, since neither
    /// branch's `Function` type is bound through a shared variable for
    /// `apply` to resolve a merged effect row back out of afterward. Falls
    /// back to `apply(t1)` unchanged when the unified type isn't a
    /// `Function` at all.
    pub fn unify_functions(&mut self, t1: &Type, t2: &Type) -> Result<Type, UnifyError> {
        self.unify(t1, t2)?;
        let a = self.apply(t1);
        let b = self.apply(t2);
        match (a, b) {
            (
                Type::Function { params, ret, mut effects, constraints },
                Type::Function { effects: other_effects, .. },
            ) => {
                effects.extend(other_effects);
                Ok(Type::Function { params, ret, effects, constraints })
            }
            (a, _) => Ok(a),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UnifyError {
    #[error("occurs check failed: {var} occurs in {in_ty}")]
    OccursCheck { var: String, in_ty: String },
    #[error("type mismatch: expected {expected}, got {got}")]
    Mismatch { expected: String, got: String },
}
