//! The tagged union of types (spec §3.1) and constraints (spec §3.2).
//!
//! `Type` is kept cheap to clone the way the teacher's `Ty` is (see its own
//! doc comment: "this should be cheap to clone"): compound fields are
//! `Vec`/`IndexMap` of owned `Type`s rather than interned/arena'd, which is
//! fine at Noolang's program sizes but is the first thing to revisit if this
//! ever needs to scale to rustc-sized inputs.

use crate::subst::TypeVar;
use indexmap::IndexMap;
use noo_ast::op::Effect;
use smol_str::SmolStr;
use std::collections::BTreeSet;

pub type Name = SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Float,
    String,
    Bool,
}

/// A row of named field types. `fields` composes associatively (spec §4.1:
/// "given `α has {@f: β}` and `β has {@g: γ}`, the solver composes them into
/// `α has {@h: {@f: γ}}`") -- see `RowStructure::compose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStructure {
    pub fields: IndexMap<Name, RowField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowField {
    Type(Box<Type>),
    Nested(RowStructure),
}

impl RowStructure {
    pub fn single(field: Name, ty: Type) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(field, RowField::Type(Box::new(ty)));
        RowStructure { fields }
    }

    /// Composes `self` (the outer row, e.g. `β has {@f: γ}`) into the slot
    /// named `field` of `outer` (e.g. `α has {@h: β}`), producing
    /// `α has {@h: {@f: γ}}`. Associative: composing three structures in
    /// either grouping yields equivalent results, since composition is just
    /// substitution of one row into a named slot of another.
    /// Width-subtyping-compatible merge: fields present in both must agree;
    /// extra fields from either side are kept.
    pub fn merge(mut self, other: RowStructure) -> Option<RowStructure> {
        for (name, field) in other.fields {
            match self.fields.get(&name) {
                None => {
                    self.fields.insert(name, field);
                }
                Some(existing) => {
                    if existing != &field {
                        return None;
                    }
                }
            }
        }
        Some(self)
    }
}

/// A predicate attached to a type variable (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Implements { type_var: Name, interface_name: Name },
    HasStructure { type_var: Name, structure: RowStructure },
    HasField { type_var: Name, field: Name, field_type: Box<Type> },
    Is { type_var: Name, constraint: Name },
    Custom { type_var: Name, name: Name, args: Vec<Type> },
}

impl Constraint {
    pub fn type_var(&self) -> &Name {
        match self {
            Constraint::Implements { type_var, .. }
            | Constraint::HasStructure { type_var, .. }
            | Constraint::HasField { type_var, .. }
            | Constraint::Is { type_var, .. }
            | Constraint::Custom { type_var, .. } => type_var,
        }
    }

    pub fn retarget(&self, new_var: Name) -> Constraint {
        let mut c = self.clone();
        match &mut c {
            Constraint::Implements { type_var, .. }
            | Constraint::HasStructure { type_var, .. }
            | Constraint::HasField { type_var, .. }
            | Constraint::Is { type_var, .. }
            | Constraint::Custom { type_var, .. } => *type_var = new_var,
        }
        c
    }
}

/// Deduplicating merge of two constraint lists, used whenever constraints
/// are copied from one variable onto another (spec §4.1 step 3, §4.3
/// instantiation).
pub fn merge_constraints(into: &mut Vec<Constraint>, from: &[Constraint]) {
    for c in from {
        if !into.contains(c) {
            into.push(c.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    Unit,
    /// An unbound type variable. `constraints` are the ones attached
    /// directly at the point this `Type::Variable` value was produced
    /// (e.g. by `instantiate`); the authoritative, possibly-larger set for
    /// the *underlying* unification variable lives in the `InferenceTable`
    /// side table and is what `apply` consults.
    Variable { var: TypeVar, constraints: Vec<Constraint> },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        effects: BTreeSet<Effect>,
        constraints: Vec<Constraint>,
    },
    List(Box<Type>),
    Tuple(Vec<Type>),
    Record(IndexMap<Name, Type>),
    Variant { name: Name, args: Vec<Type> },
    Union(Vec<Type>),
    Constrained { base: Box<Type>, constraints: IndexMap<Name, Vec<Constraint>> },
    Unknown,
}

impl Type {
    pub const fn float() -> Type {
        Type::Primitive(Primitive::Float)
    }
    pub const fn string() -> Type {
        Type::Primitive(Primitive::String)
    }
    pub const fn bool() -> Type {
        Type::Primitive(Primitive::Bool)
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function { params, ret: Box::new(ret), effects: BTreeSet::new(), constraints: Vec::new() }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Bool))
            || matches!(self, Type::Variant { name, .. } if name == "Bool")
    }

    /// Structural equality per spec §3.1: records compare by key-set and
    /// per-field equality, irrespective of insertion order (`IndexMap`'s own
    /// `PartialEq` already does this).
    pub fn structurally_eq(&self, other: &Type) -> bool {
        self == other
    }

    /// Free type-variable names reachable from `self`, *not* crossing into
    /// the unification table (use after `apply`-ing a substitution if you
    /// want the fully-resolved set).
    pub fn free_vars(&self, out: &mut std::collections::HashSet<TypeVar>) {
        match self {
            Type::Primitive(_) | Type::Unit | Type::Unknown => {}
            Type::Variable { var, .. } => {
                out.insert(*var);
            }
            Type::Function { params, ret, .. } => {
                for p in params {
                    p.free_vars(out);
                }
                ret.free_vars(out);
            }
            Type::List(elem) => elem.free_vars(out),
            Type::Tuple(elems) => elems.iter().for_each(|e| e.free_vars(out)),
            Type::Record(fields) => fields.values().for_each(|v| v.free_vars(out)),
            Type::Variant { args, .. } => args.iter().for_each(|a| a.free_vars(out)),
            Type::Union(types) => types.iter().for_each(|t| t.free_vars(out)),
            Type::Constrained { base, .. } => base.free_vars(out),
        }
    }
}

/// Concrete dispatch-type mapping (spec §4.2): maps a concrete `Type` to the
/// name the trait registry indexes implementations by, or `None` if `ty` is
/// not concrete enough to dispatch on (a bare variable or `Unknown`).
pub fn dispatch_type_name(ty: &Type) -> Option<Name> {
    match ty {
        Type::Primitive(Primitive::Float) => Some("Float".into()),
        Type::Primitive(Primitive::String) => Some("String".into()),
        Type::Primitive(Primitive::Bool) => Some("Bool".into()),
        Type::List(_) => Some("List".into()),
        Type::Tuple(_) => Some("Tuple".into()),
        Type::Record(_) => Some("Record".into()),
        Type::Variant { name, .. } => Some(name.clone()),
        Type::Unit | Type::Variable { .. } | Type::Unknown | Type::Union(_) => None,
        Type::Function { .. } => Some("Function".into()),
        Type::Constrained { base, .. } => dispatch_type_name(base),
    }
}

/// Dispatch-type name of `ty`'s single type-parameter slot, for discharging
/// an impl's `given a implements U` clause (spec §3.3/§4.2): a `List`'s
/// element, or a single-payload `Variant`'s first argument. Traits in this
/// language are single-type-parameter by convention, so this is the one slot
/// a `given` clause could ever refer to.
pub fn type_param_slot(ty: &Type) -> Option<Name> {
    match ty {
        Type::List(elem) => dispatch_type_name(elem),
        Type::Variant { args, .. } => args.first().and_then(dispatch_type_name),
        _ => None,
    }
}
