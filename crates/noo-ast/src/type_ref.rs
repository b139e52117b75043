//! Surface-syntax type references: what a parser hands the inferencer for
//! an annotation like `e : a -> String given a has {@name String}`. These
//! are *not* the inferencer's internal `Type` (that lives in `noo-ty`) --
//! they are the unelaborated tree the inferencer lowers from.

use crate::Name;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A lowercase name: either a primitive (`Float`, `String`, `Bool`) or a
    /// bound type variable, disambiguated during lowering by case/scope.
    Named(Name),
    Unit,
    Function { params: Vec<TypeRef>, ret: Box<TypeRef>, effects: Vec<Name> },
    List(Box<TypeRef>),
    Tuple(Vec<TypeRef>),
    Record(BTreeMap<Name, TypeRef>),
    /// A nominal variant applied to arguments, e.g. `Option Float`.
    Variant { name: Name, args: Vec<TypeRef> },
    /// `T given <constraints>` -- an annotation bundled with its constraints.
    Constrained { base: Box<TypeRef>, constraints: Vec<ConstraintRef> },
}

/// The surface form of a constraint clause following `given`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintRef {
    /// `a implements Trait`
    Implements { var: Name, trait_name: Name },
    /// `a has {@f T, @g {@h U}}`
    Has { var: Name, fields: BTreeMap<Name, RowFieldRef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFieldRef {
    Type(TypeRef),
    Nested(BTreeMap<Name, RowFieldRef>),
}
