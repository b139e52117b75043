//! Type schemes and the type environment (spec §3.4), plus generalization
//! and instantiation (spec §4.3).

use crate::subst::{InferenceTable, TypeVar};
use crate::ty::{merge_constraints, Constraint, Type};
use noo_ast::op::Effect;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScheme {
    pub ty: Type,
    pub quantified_vars: Vec<TypeVar>,
    pub effects: Option<BTreeSet<Effect>>,
}

impl TypeScheme {
    /// A scheme with no quantified variables: a monomorphic type lifted to
    /// scheme position (every binding in the environment is a scheme).
    pub fn monomorphic(ty: Type) -> Self {
        TypeScheme { ty, quantified_vars: Vec::new(), effects: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    bindings: FxHashMap<SmolStr, TypeScheme>,
}

impl TypeEnvironment {
    pub fn get(&self, name: &str) -> Option<&TypeScheme> {
        self.bindings.get(name)
    }

    pub fn insert(&mut self, name: SmolStr, scheme: TypeScheme) {
        self.bindings.insert(name, scheme);
    }

    /// A child environment for a function body or `where`/`match` arm,
    /// sharing the parent's bindings but free to shadow them.
    pub fn child(&self) -> TypeEnvironment {
        self.clone()
    }

    /// Free type variables across every binding's *type* (schemes contribute
    /// only their free, i.e. non-quantified, variables).
    pub fn free_vars(&self, table: &mut InferenceTable) -> HashSet<TypeVar> {
        let mut out = HashSet::new();
        for scheme in self.bindings.values() {
            let resolved = table.apply(&scheme.ty);
            let mut vars = HashSet::new();
            resolved.free_vars(&mut vars);
            for v in vars {
                if !scheme.quantified_vars.contains(&v) {
                    out.insert(v);
                }
            }
        }
        out
    }
}

/// Is `expr`'s inferred value restricted to generalize? Spec §4.3: "only
/// syntactic values... are generalized. Applications return monomorphic
/// types." The inferencer calls this with the *shape* of the expression
/// that produced `ty`, not `ty` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    SyntacticValue,
    Application,
}

/// `generalize(type, env, table)` (spec §4.3).
pub fn generalize(ty: &Type, env: &TypeEnvironment, table: &mut InferenceTable, shape: ValueShape) -> TypeScheme {
    let resolved = table.apply(ty);
    if shape == ValueShape::Application {
        return TypeScheme::monomorphic(resolved);
    }
    let mut free = HashSet::new();
    resolved.free_vars(&mut free);
    let env_free = env.free_vars(table);
    let quantified: Vec<TypeVar> = free.difference(&env_free).copied().collect();
    TypeScheme { ty: resolved, quantified_vars: quantified, effects: None }
}

/// `instantiate(scheme, table)` (spec §4.3): freshens every quantified
/// variable, carrying its constraints onto the fresh variable (deduped).
pub fn instantiate(scheme: &TypeScheme, table: &mut InferenceTable) -> Type {
    let mut mapping: FxHashMap<TypeVar, TypeVar> = FxHashMap::default();
    for &q in &scheme.quantified_vars {
        let existing_constraints = table.constraints_of(q).to_vec();
        let fresh = table.new_var(existing_constraints);
        mapping.insert(q, fresh);
    }
    substitute_vars(&scheme.ty, &mapping)
}

fn substitute_vars(ty: &Type, mapping: &FxHashMap<TypeVar, TypeVar>) -> Type {
    match ty {
        Type::Variable { var, constraints } => {
            if let Some(&fresh) = mapping.get(var) {
                let mut new_constraints = Vec::new();
                for c in constraints {
                    merge_constraints(&mut new_constraints, std::slice::from_ref(&retarget_for(c, *var, fresh)));
                }
                Type::Variable { var: fresh, constraints: new_constraints }
            } else {
                ty.clone()
            }
        }
        Type::Primitive(_) | Type::Unit | Type::Unknown => ty.clone(),
        Type::Function { params, ret, effects, constraints } => Type::Function {
            params: params.iter().map(|p| substitute_vars(p, mapping)).collect(),
            ret: Box::new(substitute_vars(ret, mapping)),
            effects: effects.clone(),
            constraints: constraints.clone(),
        },
        Type::List(elem) => Type::List(Box::new(substitute_vars(elem, mapping))),
        Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| substitute_vars(e, mapping)).collect()),
        Type::Record(fields) => {
            Type::Record(fields.iter().map(|(k, v)| (k.clone(), substitute_vars(v, mapping))).collect())
        }
        Type::Variant { name, args } => {
            Type::Variant { name: name.clone(), args: args.iter().map(|a| substitute_vars(a, mapping)).collect() }
        }
        Type::Union(types) => Type::Union(types.iter().map(|t| substitute_vars(t, mapping)).collect()),
        Type::Constrained { base, constraints } => {
            Type::Constrained { base: Box::new(substitute_vars(base, mapping)), constraints: constraints.clone() }
        }
    }
}

fn retarget_for(c: &Constraint, _old: TypeVar, _new: TypeVar) -> Constraint {
    // Constraints in this representation are already scoped to the
    // `Type::Variable` they hang off rather than addressed by name, so
    // retargeting is a no-op; kept as a named step to mirror spec's
    // "constraints attached to q transfer to the fresh variable".
    c.clone()
}
