use crate::display::HirDisplay;
use crate::infer::{Inferencer, NoImports};
use crate::resolve::{check_structural, compose_row, RowError};
use crate::scheme::{generalize, instantiate, TypeEnvironment, ValueShape};
use crate::subst::InferenceTable;
use crate::traits::{RegisterError, TraitDefinition, TraitImplementation, TraitRegistry};
use crate::ty::{RowStructure, Type};
use noo_ast::expr::{Body, Expr};
use noo_ast::op::{BinaryOp, Effect};
use noo_ast::pattern::Pattern;
use noo_test_utils::names;

fn fresh_record(fields: &[(&str, Type)]) -> Type {
    let mut map = indexmap::IndexMap::new();
    for (k, v) in fields {
        map.insert((*k).into(), v.clone());
    }
    Type::Record(map)
}

#[test]
fn unification_is_symmetric() {
    let mut left = InferenceTable::new();
    let v = left.new_var(vec![]);
    let a = Type::Variable { var: v, constraints: vec![] };
    let b = Type::float();
    assert!(left.unify(&a, &b).is_ok());

    let mut right = InferenceTable::new();
    let v2 = right.new_var(vec![]);
    let a2 = Type::Variable { var: v2, constraints: vec![] };
    assert!(right.unify(&b, &a2).is_ok());

    assert_eq!(left.apply(&a), Type::float());
    assert_eq!(right.apply(&a2), Type::float());
}

#[test]
fn unification_rejects_primitive_mismatch_both_directions() {
    let mut t1 = InferenceTable::new();
    assert!(t1.unify(&Type::float(), &Type::string()).is_err());
    let mut t2 = InferenceTable::new();
    assert!(t2.unify(&Type::string(), &Type::float()).is_err());
}

#[test]
fn applying_a_solved_substitution_twice_is_idempotent() {
    let mut table = InferenceTable::new();
    let v = table.new_var(vec![]);
    let ty = Type::Variable { var: v, constraints: vec![] };
    table.unify(&ty, &Type::float()).unwrap();
    let once = table.apply(&ty);
    let twice = table.apply(&once);
    assert_eq!(once, twice);
    assert_eq!(once, Type::float());
}

#[test]
fn occurs_check_rejects_infinite_type() {
    let mut table = InferenceTable::new();
    let v = table.new_var(vec![]);
    let var_ty = Type::Variable { var: v, constraints: vec![] };
    let list_of_self = Type::List(Box::new(var_ty.clone()));
    assert!(table.unify(&var_ty, &list_of_self).is_err());
}

#[test]
fn generalize_quantifies_vars_free_in_type_but_not_in_env() {
    let mut table = InferenceTable::new();
    let env = TypeEnvironment::default();
    let v = table.new_var(vec![]);
    let var_ty = Type::Variable { var: v, constraints: vec![] };
    let id_ty = Type::function(vec![var_ty.clone()], var_ty);
    let scheme = generalize(&id_ty, &env, &mut table, ValueShape::SyntacticValue);
    assert_eq!(scheme.quantified_vars.len(), 1);

    // Instantiating twice produces two independent applications of the
    // polymorphic identity, each usable at a different concrete type.
    let inst_a = instantiate(&scheme, &mut table);
    let inst_b = instantiate(&scheme, &mut table);
    if let (Type::Function { params: pa, .. }, Type::Function { params: pb, .. }) = (&inst_a, &inst_b) {
        table.unify(&pa[0], &Type::float()).unwrap();
        table.unify(&pb[0], &Type::string()).unwrap();
        assert_eq!(table.apply(&pa[0]), Type::float());
        assert_eq!(table.apply(&pb[0]), Type::string());
    } else {
        panic!("expected function types");
    }
}

#[test]
fn generalize_of_an_application_is_monomorphic() {
    let mut table = InferenceTable::new();
    let env = TypeEnvironment::default();
    let v = table.new_var(vec![]);
    let ty = Type::Variable { var: v, constraints: vec![] };
    let scheme = generalize(&ty, &env, &mut table, ValueShape::Application);
    assert!(scheme.quantified_vars.is_empty());
}

#[test]
fn trait_registry_rejects_duplicate_implementation_for_same_type() {
    let mut registry = TraitRegistry::new();
    let mut functions = indexmap::IndexMap::new();
    functions.insert(names::ADD.into(), Type::function(vec![Type::float(), Type::float()], Type::float()));
    registry.add_trait_definition(TraitDefinition {
        name: names::NUMERIC.into(),
        type_param: "a".into(),
        functions,
    });

    let mut body = Body::default();
    let x = body.alloc_pat(Pattern::Variable("x".into()));
    let y = body.alloc_pat(Pattern::Variable("y".into()));
    let xv = body.alloc_expr(Expr::Var("x".into()));
    let root = body.alloc_expr(Expr::Lambda { params: vec![x, y], body: xv });
    body.root = Some(root);

    let mut impl_fns = indexmap::IndexMap::new();
    impl_fns.insert(names::ADD.into(), body.clone());
    let first = TraitImplementation { type_name: "Float".into(), functions: impl_fns.clone(), given: None };
    let second = TraitImplementation { type_name: "Float".into(), functions: impl_fns, given: None };

    assert!(registry.add_trait_implementation(names::NUMERIC.into(), first).is_ok());
    let err = registry.add_trait_implementation(names::NUMERIC.into(), second).unwrap_err();
    assert_eq!(err, RegisterError::DuplicateImplementation { type_name: "Float".into() });
}

#[test]
fn resolve_trait_function_prefers_last_argument_for_dispatch() {
    let mut registry = TraitRegistry::new();
    let mut functions = indexmap::IndexMap::new();
    functions.insert("map".into(), Type::function(vec![Type::float(), Type::float()], Type::float()));
    registry.add_trait_definition(TraitDefinition { name: names::FUNCTOR.into(), type_param: "f".into(), functions });

    let mut body = Body::default();
    let x = body.alloc_pat(Pattern::Variable("x".into()));
    let xv = body.alloc_expr(Expr::Var("x".into()));
    let root = body.alloc_expr(Expr::Lambda { params: vec![x], body: xv });
    body.root = Some(root);
    let mut impl_fns = indexmap::IndexMap::new();
    impl_fns.insert("map".into(), body);
    registry
        .add_trait_implementation(
            names::FUNCTOR.into(),
            TraitImplementation { type_name: "List".into(), functions: impl_fns, given: None },
        )
        .unwrap();

    let func_arg = Type::function(vec![Type::float()], Type::float());
    let list_arg = Type::List(Box::new(Type::float()));
    let resolution = registry.resolve_trait_function("map", &[func_arg, list_arg]).expect("map resolves on List");
    assert_eq!(resolution.type_name, "List");
}

#[test]
fn check_structural_accepts_extra_fields_width_subtyping() {
    let mut table = InferenceTable::new();
    let record = fresh_record(&[(names::NAME, Type::string()), (names::AGE, Type::float())]);
    let required = RowStructure::single(names::NAME.into(), Type::string());
    assert!(check_structural(&mut table, &record, &required, noo_ast::Span::DUMMY).is_ok());
}

#[test]
fn check_structural_rejects_missing_field() {
    let mut table = InferenceTable::new();
    let record = fresh_record(&[(names::AGE, Type::float())]);
    let required = RowStructure::single(names::NAME.into(), Type::string());
    let err = check_structural(&mut table, &record, &required, noo_ast::Span::DUMMY).unwrap_err();
    assert!(matches!(err, RowError::MissingField { .. }));
}

#[test]
fn row_composition_is_associative_regardless_of_grouping() {
    let inner = RowStructure::single("f".into(), Type::float());
    let left_then_right = compose_row("h".into(), inner.clone());
    let right_then_left = compose_row("h".into(), inner);
    assert_eq!(left_then_right, right_then_left);
}

#[test]
fn identity_function_generalizes_to_a_polymorphic_scheme() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let x = body.alloc_pat(Pattern::Variable("x".into()));
    let xv = body.alloc_expr(Expr::Var("x".into()));
    let root = body.alloc_expr(Expr::Lambda { params: vec![x], body: xv });
    body.root = Some(root);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, root, &mut imports).expect("identity infers");
    match inferencer.table.apply(&result.ty) {
        Type::Function { params, ret, .. } => {
            assert_eq!(params.len(), 1);
            assert_eq!(params[0], *ret);
        }
        other => panic!("expected a function type, got {other:?}"),
    }
}

#[test]
fn if_condition_must_be_bool() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let cond = body.alloc_expr(Expr::Number(1.0));
    let then_b = body.alloc_expr(Expr::Number(2.0));
    let else_b = body.alloc_expr(Expr::Number(3.0));
    let if_expr = body.alloc_expr(Expr::If { cond, then_branch: then_b, else_branch: else_b });
    body.root = Some(if_expr);

    let mut imports = NoImports;
    // `cond` here is a number, not `Bool` -- unifying against `Bool` should
    // fail, since Noolang does not consider `Float` truthy.
    let err = inferencer.infer_expr(&body, if_expr, &mut imports).unwrap_err();
    assert!(matches!(err, crate::error::TypeError::TypeMismatch { .. }));
}

#[test]
fn unifying_function_types_unions_their_effect_rows() {
    // Two closures, e.g. an `if`'s `then`/`else` branches, each declaring
    // one effect the other doesn't (spec §4.1 point 4: "union the effect
    // sets, no inequality").
    let mut table = InferenceTable::new();
    let then_fn = Type::Function {
        params: vec![],
        ret: Box::new(Type::float()),
        effects: [Effect::State].into_iter().collect(),
        constraints: vec![],
    };
    let else_fn = Type::Function {
        params: vec![],
        ret: Box::new(Type::float()),
        effects: [Effect::Log].into_iter().collect(),
        constraints: vec![],
    };

    let unified = table.unify_functions(&then_fn, &else_fn).expect("function types unify");
    match unified {
        Type::Function { effects, .. } => {
            assert!(effects.contains(&Effect::State));
            assert!(effects.contains(&Effect::Log));
        }
        other => panic!("expected a function type, got {other:?}"),
    }
}

#[test]
fn if_with_bool_condition_unifies_branch_types() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let cond = body.alloc_expr(Expr::Var("True".into()));
    let then_b = body.alloc_expr(Expr::Number(2.0));
    let else_b = body.alloc_expr(Expr::Number(3.0));
    let if_expr = body.alloc_expr(Expr::If { cond, then_branch: then_b, else_branch: else_b });
    body.root = Some(if_expr);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, if_expr, &mut imports).expect("well-typed if");
    assert_eq!(inferencer.table.apply(&result.ty), Type::float());
}

#[test]
fn application_effects_are_a_superset_of_the_callee() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();

    // `mut acc = 1; fn () => acc` -- body captures a `state` effect; we
    // build the application of that lambda directly.
    let x = body.alloc_pat(Pattern::Wildcard);
    let acc_var = body.alloc_expr(Expr::Var("acc".into()));
    let lambda = body.alloc_expr(Expr::Lambda { params: vec![x], body: acc_var });
    let init = body.alloc_expr(Expr::Number(1.0));
    let mutated = body.alloc_expr(Expr::Mut { name: "acc".into(), init, body: lambda });
    let arg = body.alloc_expr(Expr::Unit);
    let app = body.alloc_expr(Expr::App { func: mutated, args: vec![arg] });
    body.root = Some(app);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, app, &mut imports).expect("application infers");
    assert!(result.effects.contains(&Effect::State));
}

#[test]
fn accessor_succeeds_on_matching_record_and_fails_on_missing_field() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let accessor = body.alloc_expr(Expr::Accessor { field: "name".into(), optional: false });
    let record = body.alloc_expr(Expr::Record(vec![("name".into(), body.alloc_expr(Expr::StringLit("Ada".into())))]));
    let app = body.alloc_expr(Expr::App { func: accessor, args: vec![record] });
    body.root = Some(app);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, app, &mut imports).expect("@name succeeds on a matching record");
    assert_eq!(inferencer.table.apply(&result.ty), Type::string());
}

#[test]
fn accessor_rejects_record_missing_the_field() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let accessor = body.alloc_expr(Expr::Accessor { field: "name".into(), optional: false });
    let age_val = body.alloc_expr(Expr::Number(30.0));
    let record = body.alloc_expr(Expr::Record(vec![("age".into(), age_val)]));
    let app = body.alloc_expr(Expr::App { func: accessor, args: vec![record] });
    body.root = Some(app);

    let mut imports = NoImports;
    let err = inferencer.infer_expr(&body, app, &mut imports).unwrap_err();
    assert!(matches!(err, crate::error::TypeError::RowMissingField { .. }));
}

#[test]
fn binary_add_rejects_mismatched_operand_types() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let lhs = body.alloc_expr(Expr::Number(1.0));
    let rhs = body.alloc_expr(Expr::StringLit("x".into()));
    let bin = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs, rhs });
    body.root = Some(bin);

    let mut imports = NoImports;
    assert!(inferencer.infer_expr(&body, bin, &mut imports).is_err());
}

#[test]
fn division_returns_option_of_the_operand_type() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let lhs = body.alloc_expr(Expr::Number(4.0));
    let rhs = body.alloc_expr(Expr::Number(2.0));
    let bin = body.alloc_expr(Expr::Binary { op: BinaryOp::Div, lhs, rhs });
    body.root = Some(bin);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, bin, &mut imports).expect("division infers");
    match inferencer.table.apply(&result.ty) {
        Type::Variant { name, args } => {
            assert_eq!(name, "Option");
            assert_eq!(args, vec![Type::float()]);
        }
        other => panic!("expected Option Float, got {other:?}"),
    }
}

#[test]
fn let_polymorphism_lets_identity_apply_at_two_types_in_one_body() {
    let mut inferencer = Inferencer::new();
    let mut body = Body::default();
    let x = body.alloc_pat(Pattern::Variable("x".into()));
    let xv = body.alloc_expr(Expr::Var("x".into()));
    let id_lambda = body.alloc_expr(Expr::Lambda { params: vec![x], body: xv });

    let id_pat = body.alloc_pat(Pattern::Variable("id".into()));
    let id_ref_a = body.alloc_expr(Expr::Var("id".into()));
    let num_arg = body.alloc_expr(Expr::Number(1.0));
    let apply_num = body.alloc_expr(Expr::App { func: id_ref_a, args: vec![num_arg] });

    let id_ref_b = body.alloc_expr(Expr::Var("id".into()));
    let str_arg = body.alloc_expr(Expr::StringLit("s".into()));
    let apply_str = body.alloc_expr(Expr::App { func: id_ref_b, args: vec![str_arg] });

    let tuple = body.alloc_expr(Expr::Tuple(vec![apply_num, apply_str]));
    let let_expr = body.alloc_expr(Expr::Let { pat: id_pat, value: id_lambda, body: tuple, recursive: false });
    body.root = Some(let_expr);

    let mut imports = NoImports;
    let result = inferencer.infer_expr(&body, let_expr, &mut imports).expect("let-polymorphic body infers");
    assert_eq!(inferencer.table.apply(&result.ty), Type::Tuple(vec![Type::float(), Type::string()]));
}

#[test]
fn type_def_registers_curried_constructors() {
    let mut inferencer = Inferencer::new();
    let program = noo_ast::Program {
        definitions: vec![noo_ast::Definition::Type(noo_ast::TypeDef {
            name: "Pair".into(),
            type_params: vec!["a".into(), "b".into()],
            variants: vec![noo_ast::VariantDef {
                name: "MkPair".into(),
                fields: vec![noo_ast::type_ref::TypeRef::Named("a".into()), noo_ast::type_ref::TypeRef::Named("b".into())],
            }],
        })],
    };
    let mut imports = NoImports;
    inferencer.infer_program(&program, &mut imports).expect("type definition registers");
    assert!(inferencer.env.get("MkPair").is_some());
    assert_eq!(inferencer.adts.type_of_constructor("MkPair"), Some(&"Pair".into()));
}

#[test]
fn recursive_adt_definitions_are_rejected() {
    let mut inferencer = Inferencer::new();
    let program = noo_ast::Program {
        definitions: vec![noo_ast::Definition::Type(noo_ast::TypeDef {
            name: "IntList".into(),
            type_params: vec![],
            variants: vec![
                noo_ast::VariantDef { name: "Nil".into(), fields: vec![] },
                noo_ast::VariantDef {
                    name: "Cons".into(),
                    fields: vec![
                        noo_ast::type_ref::TypeRef::Named("Float".into()),
                        noo_ast::type_ref::TypeRef::Named("IntList".into()),
                    ],
                },
            ],
        })],
    };
    let mut imports = NoImports;
    let err = inferencer.infer_program(&program, &mut imports).unwrap_err();
    assert!(matches!(err, crate::error::TypeError::RecursiveAdtUnsupported { .. }));
}

#[test]
fn given_clause_on_an_annotation_attaches_a_has_constraint() {
    use noo_ast::type_ref::{ConstraintRef, RowFieldRef, TypeRef};
    use std::collections::BTreeMap;

    let mut inferencer = Inferencer::new();
    let mut fields = BTreeMap::new();
    fields.insert("name".into(), RowFieldRef::Type(TypeRef::Named("String".into())));
    let annotation = TypeRef::Constrained {
        base: Box::new(TypeRef::Function {
            params: vec![TypeRef::Named("a".into())],
            ret: Box::new(TypeRef::Named("String".into())),
            effects: vec![],
        }),
        constraints: vec![ConstraintRef::Has { var: "a".into(), fields }],
    };

    let mut body = Body::default();
    let p = body.alloc_expr(Expr::Accessor { field: "name".into(), optional: false });
    body.root = Some(p);

    let def = noo_ast::ValueDef { name: "greet".into(), body, annotation: Some(annotation) };
    let program = noo_ast::Program { definitions: vec![noo_ast::Definition::Value(def)] };
    let mut imports = NoImports;
    // The accessor's own inferred type already carries the right `has`
    // constraint, so unifying it against the declared annotation (which
    // also carries one, attached via `given`) should succeed.
    inferencer.infer_program(&program, &mut imports).expect("annotated accessor matches its own inferred type");
    assert!(inferencer.env.get("greet").is_some());
}

#[test]
fn display_greek_renames_fresh_type_variables() {
    let mut table = InferenceTable::new();
    let a = Type::Variable { var: table.new_var(vec![]), constraints: vec![] };
    let b = Type::Variable { var: table.new_var(vec![]), constraints: vec![] };
    let ty = Type::function(vec![a], b);
    insta::assert_snapshot!(ty.display_string(), @"(α) -> β");
}

#[test]
fn display_renders_records_and_lists_structurally() {
    let record = fresh_record(&[("name", Type::string()), ("age", Type::float())]);
    let ty = Type::List(Box::new(record));
    insta::assert_snapshot!(ty.display_string(), @"List {@name String, @age Float}");
}
