//! Top-level items: value bindings, ADT/trait/impl definitions. A `Program`
//! is just an ordered list of these; there is no module system in scope.

use crate::{expr::Body, type_ref::TypeRef, ConstraintRef, Name};

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone)]
pub enum Definition {
    Value(ValueDef),
    Type(TypeDef),
    Trait(TraitDef),
    Impl(ImplDef),
}

/// A top-level `name = expr` or `name = expr : T given ...` binding.
#[derive(Debug, Clone)]
pub struct ValueDef {
    pub name: Name,
    pub body: Body,
    pub annotation: Option<TypeRef>,
}

/// `type T a b = C1 x y | C2 | ...`
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: Name,
    pub type_params: Vec<Name>,
    pub variants: Vec<VariantDef>,
}

#[derive(Debug, Clone)]
pub struct VariantDef {
    pub name: Name,
    pub fields: Vec<TypeRef>,
}

/// `constraint Name a ( fn : signature; ... )`
#[derive(Debug, Clone)]
pub struct TraitDef {
    pub name: Name,
    pub type_param: Name,
    pub functions: Vec<(Name, TypeRef)>,
}

/// `implement Name T given ... ( fn = expr; ... )`
#[derive(Debug, Clone)]
pub struct ImplDef {
    pub trait_name: Name,
    pub type_name: Name,
    pub given: Option<ConstraintRef>,
    pub functions: Vec<(Name, Body)>,
}
