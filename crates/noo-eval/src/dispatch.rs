//! Runtime trait dispatch (spec §4.7). Pure lookup helpers over an already
//! built `noo_ty::TraitRegistry`; `eval::Evaluator` is what actually
//! evaluates a resolved implementation's body, since that needs the
//! evaluator's own state (call depth, environment) that this module has no
//! business holding.
//!
//! Every function here takes its caller's own `dispatch_name` instead of
//! calling `value_type_name` directly: a bare `Value::Constructor` tag alone
//! can't tell a multi-constructor ADT's owning type (`Option`) apart from one
//! of its constructors (`Some`/`None`), so the correct mapping can only come
//! from `eval::Evaluator::dispatch_type_name`, which has the constructor
//! registry `value_type_name` doesn't.

use noo_ast::Name;
use noo_ty::{dispatch_candidates_from_names, Resolution, TraitRegistry};

use crate::value::Value;

/// Step 1-2 of spec §4.7: derive each argument's runtime dispatch-type name,
/// then order the candidates last-argument-first (favoring the container
/// type for higher-kinded traits like `Functor.map`), falling back to the
/// first argument.
pub fn candidates_for(args: &[Value], dispatch_name: impl Fn(&Value) -> Option<Name>) -> Vec<Name> {
    let names: Vec<Option<Name>> = args.iter().map(&dispatch_name).collect();
    dispatch_candidates_from_names(&names)
}

/// Step 2-3: look up an implementation of `name` for the accumulated `args`.
/// `None` means either no impl matches yet, or one of `args` has no
/// concrete dispatch type -- the caller (see `eval::Evaluator::apply_trait_function`)
/// decides between deferring and raising `NoImplementation` from that.
pub fn resolve<'a>(
    traits: &'a TraitRegistry,
    name: &str,
    args: &[Value],
    dispatch_name: impl Fn(&Value) -> Option<Name>,
) -> Option<Resolution<'a>> {
    traits.resolve_by_candidates(name, &candidates_for(args, &dispatch_name), |candidate| {
        args.iter()
            .find(|v| dispatch_name(v).as_deref() == Some(candidate.as_str()))
            .and_then(|v| value_param_slot(v, &dispatch_name))
    })
}

/// Runtime counterpart to `noo_ty::type_param_slot`, used to discharge a
/// conditional impl's `given a implements U` clause against the dispatch-type
/// name of the value that filled its type parameter: a `List`'s first
/// element, or a `Constructor`'s first argument.
fn value_param_slot(v: &Value, dispatch_name: impl Fn(&Value) -> Option<Name>) -> Option<Name> {
    match v {
        Value::List(items) => items.first().and_then(dispatch_name),
        Value::Constructor { args, .. } => args.first().and_then(dispatch_name),
        _ => None,
    }
}

/// `true` if every argument's runtime type could be derived -- per spec
/// §4.7 step 5, once this holds and `resolve` still found nothing, dispatch
/// fails outright rather than deferring.
pub fn all_concrete(args: &[Value], dispatch_name: impl Fn(&Value) -> Option<Name>) -> bool {
    args.iter().all(|a| dispatch_name(a).is_some())
}
