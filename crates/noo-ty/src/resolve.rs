//! The constraint resolver (spec §4.5): structural (`has`) composition and
//! compatibility, and nominal (`implements`) resolution at application
//! sites.

use crate::subst::InferenceTable;
use crate::traits::TraitRegistry;
use crate::ty::{Constraint, RowField, RowStructure, Type};
use noo_ast::Span;
use smol_str::SmolStr;

/// Checks a concrete `Record` against a required `RowStructure`: every named
/// field must be present with a compatible type; extra fields are fine
/// (width subtyping, spec §4.5 point 1).
pub fn check_structural(
    table: &mut InferenceTable,
    record: &Type,
    required: &RowStructure,
    location: Span,
) -> Result<(), RowError> {
    let fields = match table.apply(record) {
        Type::Record(fields) => fields,
        other => {
            return Err(RowError::NotARecord { got: crate::display::debug_string(&other) });
        }
    };

    for (name, req_field) in &required.fields {
        let actual = fields.get(name).ok_or_else(|| RowError::MissingField {
            field: name.clone(),
            location,
        })?;
        match req_field {
            RowField::Type(expected) => {
                table
                    .unify(&expected.clone(), actual)
                    .map_err(|_| RowError::MissingField { field: name.clone(), location })?;
            }
            RowField::Nested(nested) => {
                check_structural(table, actual, nested, location)?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum RowError {
    NotARecord { got: String },
    MissingField { field: SmolStr, location: Span },
}

/// Composes an inner row requirement into a named slot of an outer one:
/// given `α has {@h: β}` and `β has {@f: γ}`, produces `α has {@h: {@f:
/// γ}}`. Associative regardless of which pair is composed first, since it's
/// just nesting one `RowStructure` inside another's named slot.
pub fn compose_row(slot: SmolStr, inner: RowStructure) -> RowStructure {
    let mut fields = indexmap::IndexMap::new();
    fields.insert(slot, RowField::Nested(inner));
    RowStructure { fields }
}

/// `tryResolveConstraints(returnType, constraints, argTypes, state)` (spec
/// §4.5 point 2). Returns the (possibly unchanged) return type with
/// discharged constraints stripped, plus any constraints that are still
/// outstanding.
pub fn try_resolve_constraints(
    table: &mut InferenceTable,
    registry: &TraitRegistry,
    return_type: Type,
    constraints: Vec<Constraint>,
    arg_types: &[Type],
) -> (Type, Vec<Constraint>) {
    let mut remaining = Vec::new();
    for c in constraints {
        if let Constraint::Implements { interface_name, .. } = &c {
            if let Some(function) = first_function_of(registry, interface_name) {
                if let Some(resolution) = registry.resolve_trait_function(&function, arg_types) {
                    tracing::trace!(
                        trait_name = %resolution.trait_name,
                        type_name = %resolution.type_name,
                        "discharged constraint via static resolution"
                    );
                    continue;
                }
            }
        }
        remaining.push(c);
    }
    let resolved_return = table.apply(&return_type);
    (resolved_return, remaining)
}

fn first_function_of(registry: &TraitRegistry, trait_name: &str) -> Option<SmolStr> {
    registry.get_trait(trait_name).and_then(|d| d.functions.keys().next().cloned())
}
