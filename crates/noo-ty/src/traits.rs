//! The trait registry (spec §3.3, §4.2): trait definitions, per-type
//! implementations (possibly conditional), and dispatch-type resolution.

use crate::ty::{dispatch_type_name, type_param_slot, Constraint, Type};
use indexmap::IndexMap;
use noo_ast::expr::{Body, Expr};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

pub type Name = SmolStr;

#[derive(Debug, Clone)]
pub struct TraitDefinition {
    pub name: Name,
    pub type_param: Name,
    pub functions: IndexMap<Name, Type>,
}

#[derive(Debug, Clone)]
pub struct TraitImplementation {
    pub type_name: Name,
    pub functions: IndexMap<Name, Body>,
    /// `given a implements U` -- stored verbatim; discharged by the
    /// resolver at dispatch time, not here.
    pub given: Option<Constraint>,
}

#[derive(Debug, Clone, Default)]
pub struct TraitRegistry {
    definitions: FxHashMap<Name, TraitDefinition>,
    implementations: FxHashMap<Name, IndexMap<Name, TraitImplementation>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    UnknownTrait,
    UnknownFunction { function: Name },
    ArityMismatch { function: Name, expected: usize, got: usize },
    /// Decision D1: a second `implement Trait T` for an already-implemented
    /// `(trait, type)` pair is rejected at registration time rather than
    /// left to be caught (or silently overwritten) at dispatch time.
    DuplicateImplementation { type_name: Name },
}

/// `resolveTraitFunction`'s return shape (spec §4.2).
pub struct Resolution<'a> {
    pub trait_name: Name,
    pub type_name: Name,
    pub impl_: &'a TraitImplementation,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addTraitDefinition`: inserts or replaces; idempotent if equal.
    pub fn add_trait_definition(&mut self, def: TraitDefinition) {
        match self.definitions.get(&def.name) {
            Some(existing) if functions_eq(&existing.functions, &def.functions) => {}
            _ => {
                debug!(trait = %def.name, "registering trait definition");
                self.definitions.insert(def.name.clone(), def);
            }
        }
    }

    pub fn get_trait(&self, name: &str) -> Option<&TraitDefinition> {
        self.definitions.get(name)
    }

    /// `isTraitFunction`.
    pub fn is_trait_function(&self, name: &str) -> bool {
        self.definitions.values().any(|d| d.functions.contains_key(name))
    }

    /// Every trait that declares a function named `name`.
    pub fn traits_defining(&self, name: &str) -> Vec<&TraitDefinition> {
        self.definitions.values().filter(|d| d.functions.contains_key(name)).collect()
    }

    /// `addTraitImplementation`.
    pub fn add_trait_implementation(
        &mut self,
        trait_name: Name,
        impl_: TraitImplementation,
    ) -> Result<(), RegisterError> {
        let def = match self.definitions.get(&trait_name) {
            Some(d) => d,
            None => {
                debug!(trait = %trait_name, "rejected impl: unknown trait");
                return Err(RegisterError::UnknownTrait);
            }
        };

        if self
            .implementations
            .get(&trait_name)
            .map(|impls| impls.contains_key(&impl_.type_name))
            .unwrap_or(false)
        {
            debug!(trait = %trait_name, type_name = %impl_.type_name, "rejected impl: already implemented");
            return Err(RegisterError::DuplicateImplementation { type_name: impl_.type_name.clone() });
        }

        for (fname, body) in &impl_.functions {
            let sig = match def.functions.get(fname) {
                Some(sig) => sig,
                None => {
                    debug!(trait = %trait_name, function = %fname, "rejected impl: function not declared by trait");
                    return Err(RegisterError::UnknownFunction { function: fname.clone() });
                }
            };
            if let Some(expected_arity) = signature_arity(sig) {
                if let Some(root) = body.root {
                    if let Expr::Lambda { params, .. } = body.expr(root) {
                        if params.len() != expected_arity {
                            debug!(
                                trait = %trait_name, function = %fname,
                                expected = expected_arity, got = params.len(),
                                "rejected impl: arity mismatch"
                            );
                            return Err(RegisterError::ArityMismatch {
                                function: fname.clone(),
                                expected: expected_arity,
                                got: params.len(),
                            });
                        }
                    }
                    // A bare variable reference (`f = someOtherFn`) is
                    // accepted without an arity check, per spec §4.2.
                }
            }
        }

        self.implementations.entry(trait_name).or_default().insert(impl_.type_name.clone(), impl_);
        Ok(())
    }

    /// `resolveTraitFunction(name, argTypes)`.
    ///
    /// Dispatch-type derivation prefers the *last* argument (higher-kinded
    /// traits like `Functor.map : (a -> b) -> f a -> f b` dispatch on the
    /// container, which comes last), falling back to the first.
    pub fn resolve_trait_function(&self, name: &str, arg_types: &[Type]) -> Option<Resolution<'_>> {
        self.resolve_by_candidates(name, &dispatch_candidates(arg_types), |candidate| {
            arg_types
                .iter()
                .find(|t| dispatch_type_name(t).as_deref() == Some(candidate.as_str()))
                .and_then(type_param_slot)
        })
    }

    /// Same lookup as `resolve_trait_function`, but against already-derived
    /// dispatch-type names rather than `Type`s -- the runtime evaluator
    /// (spec §4.7) derives these from `Value` tags via `getValueTypeName`
    /// rather than from the static type system, so it has no `Type`s to
    /// hand `resolve_trait_function` at all. `param_slot` plays the same
    /// role `type_param_slot` plays for the static side: given a candidate
    /// dispatch-type name that matched an impl, it returns the dispatch-type
    /// name of *that* instance's type-parameter slot (a `List`'s element, an
    /// `Option`'s payload, ...), used to discharge a conditional impl's
    /// `given` clause (spec §3.3/§4.2: "the solver is responsible for
    /// discharging it when the impl is selected").
    pub fn resolve_by_candidates(
        &self,
        name: &str,
        candidates: &[Name],
        param_slot: impl Fn(&Name) -> Option<Name>,
    ) -> Option<Resolution<'_>> {
        for trait_def in self.traits_defining(name) {
            let impls = match self.implementations.get(&trait_def.name) {
                Some(impls) => impls,
                None => continue,
            };
            for candidate in candidates {
                if let Some(impl_) = impls.get(candidate) {
                    if impl_.functions.contains_key(name) && self.given_holds(impl_, param_slot(candidate).as_ref()) {
                        return Some(Resolution {
                            trait_name: trait_def.name.clone(),
                            type_name: candidate.clone(),
                            impl_,
                        });
                    }
                }
            }
        }
        None
    }

    /// Checks a candidate impl's optional `given a implements U` clause
    /// against the dispatch-type name of the concrete type that filled its
    /// type parameter, e.g. `Eq` against `Int` for `List Int`'s element.
    /// `None` (no `given`) always holds. When `slot` itself is `None` --
    /// the element type couldn't be determined, e.g. dispatching on an
    /// empty runtime list -- the clause cannot be discharged, so the impl
    /// does not match rather than matching unconditionally.
    fn given_holds(&self, impl_: &TraitImplementation, slot: Option<&Name>) -> bool {
        match &impl_.given {
            None => true,
            Some(Constraint::Implements { interface_name, .. }) => {
                slot.is_some_and(|type_name| self.implementation(interface_name, type_name).is_some())
            }
            // `given a has {...}` on an impl isn't part of the surface
            // grammar (spec §6.1 only documents `given a implements D` on
            // `implement`); nothing currently constructs one.
            Some(_) => true,
        }
    }

    pub fn implementation(&self, trait_name: &str, type_name: &str) -> Option<&TraitImplementation> {
        self.implementations.get(trait_name).and_then(|impls| impls.get(type_name))
    }

    pub fn available_types(&self, trait_name: &str) -> Vec<Name> {
        self.implementations.get(trait_name).map(|impls| impls.keys().cloned().collect()).unwrap_or_default()
    }
}

fn functions_eq(a: &IndexMap<Name, Type>, b: &IndexMap<Name, Type>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

fn signature_arity(sig: &Type) -> Option<usize> {
    match sig {
        Type::Function { params, .. } => Some(params.len()),
        _ => None,
    }
}

/// Candidate dispatch-type names, last-argument-first then first-argument,
/// deduplicated, dropping arguments with no concrete dispatch type.
fn dispatch_candidates(arg_types: &[Type]) -> Vec<Name> {
    let names: Vec<Option<Name>> = arg_types.iter().map(dispatch_type_name).collect();
    dispatch_candidates_from_names(&names)
}

/// Same preference order as `dispatch_candidates`, but over already-derived
/// names (`None` for an argument with no concrete dispatch type) -- shared
/// by the static resolver above and the runtime evaluator (spec §4.7), which
/// derives its names from `Value` tags instead of `Type`s.
pub fn dispatch_candidates_from_names(names: &[Option<Name>]) -> Vec<Name> {
    let mut out = Vec::new();
    if let Some(Some(last)) = names.last() {
        out.push(last.clone());
    }
    if let Some(Some(first)) = names.first() {
        if !out.contains(first) {
            out.push(first.clone());
        }
    }
    out
}
