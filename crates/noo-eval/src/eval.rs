//! The tree-walking evaluator (spec §4.6). One `Evaluator` owns the trait
//! registry handed over from the inferencer and a call-depth counter; all
//! mutable per-evaluation state beyond that lives in the `Env` chain that's
//! threaded through every call, the same way `Inferencer` threads a single
//! `InferenceTable` through `infer_expr`.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use noo_ast::expr::{Body, Expr, ExprId};
use noo_ast::item::{Definition, Program, TypeDef, ValueDef, VariantDef};
use noo_ast::op::BinaryOp;
use noo_ast::pattern::{PatId, Pattern};
use noo_ast::type_ref::TypeRef;
use noo_ast::Name;
use noo_ty::{TraitRegistry, Type};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::dispatch;
use crate::env::Env;
use crate::error::RuntimeError;
use crate::value::{value_type_name, Closure, NativeFn, Value};

/// Guards runaway recursion in a tree-walker running on a bounded host
/// stack (spec §4.6 **[ADDED]**, SPEC_FULL.md §4.6-4.7). Does not change any
/// documented semantics; it only turns unbounded recursion into a catchable
/// error instead of a process abort.
#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    pub max_call_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { max_call_depth: 4096 }
    }
}

pub struct Evaluator {
    traits: TraitRegistry,
    config: EvalConfig,
    depth: usize,
    /// The environment `eval_program` last populated with top-level
    /// bindings and ADT constructors. Trait implementation bodies close
    /// over this (see `closure_from_impl_function`) rather than an empty
    /// frame, since they can reference any other global name -- a sibling
    /// helper function, a constructor -- the same way a top-level
    /// definition's body can.
    global_env: Option<Env>,
    /// Every registered constructor's owning ADT name (`"Some"` / `"None"`
    /// -> `"Option"`, and likewise for user-defined multi-constructor
    /// types), populated alongside the constructors themselves in
    /// `register_adt_constructors`. `value_type_name` alone can't derive
    /// this -- it only sees a bare `Value::Constructor` tag, with no
    /// notion of which type declared it -- so runtime trait dispatch on a
    /// multi-constructor ADT (`implement Eq Option(...)`, or a user `type
    /// Shape = Circle Float | Square Float`) goes through
    /// `dispatch_type_name` below instead, which does.
    constructor_adt: FxHashMap<Name, Name>,
}

impl Evaluator {
    /// Takes ownership of the registry the inferencer built. Per spec §5,
    /// the registry is read-only from here on -- `Evaluator` never calls
    /// `add_trait_implementation` again.
    pub fn new(traits: TraitRegistry, config: EvalConfig) -> Self {
        Evaluator { traits, config, depth: 0, global_env: None, constructor_adt: FxHashMap::default() }
    }

    /// Runtime dispatch-type name for `v` (spec §4.7's `getValueTypeName`),
    /// correcting `value_type_name`'s `Value::Constructor` case to the name
    /// of the ADT that declared the constructor rather than the
    /// constructor's own name -- `Option`, not `Some`/`None` -- so trait
    /// impls registered against a multi-constructor ADT are reachable by
    /// runtime-deferred dispatch the same way they are statically (mirrors
    /// `noo_ty::dispatch_type_name`, which maps `Type::Variant{name,..}` to
    /// the ADT name already).
    pub fn dispatch_type_name(&self, v: &Value) -> Option<Name> {
        match v.force() {
            Value::Constructor { name, .. } if name != "True" && name != "False" => {
                Some(self.constructor_adt.get(&name).cloned().unwrap_or(name))
            }
            other => value_type_name(&other),
        }
    }

    pub fn traits(&self) -> &TraitRegistry {
        &self.traits
    }

    /// Evaluates every top-level definition into `env` in order. `Value`
    /// definitions run for their binding side effect; `Type` definitions
    /// register their constructors as runtime values (the inferencer only
    /// recorded their *types*, so this crate has to weave the actual
    /// `Value::Constructor`/curried `Native` constructors in separately).
    /// `Trait`/`Impl` definitions contribute nothing here -- their bodies
    /// already live inside the `TraitRegistry` this evaluator was built
    /// with.
    pub fn eval_program(&mut self, program: &Program, env: &Env) -> Result<(), RuntimeError> {
        self.global_env = Some(env.clone());
        self.register_builtin_adts(env);
        for def in &program.definitions {
            match def {
                Definition::Type(t) => self.register_adt_constructors(t, env),
                Definition::Value(v) => self.eval_value_def(v, env)?,
                Definition::Trait(_) | Definition::Impl(_) => {}
            }
        }
        Ok(())
    }

    /// Mirrors `noo_ty::infer::Inferencer::register_builtin_adts`: `Bool`,
    /// `Option`, `Result` are language-level, not stdlib-level, so their
    /// constructors must exist in every evaluator regardless of whether
    /// `stdlib.noo` got a chance to run.
    fn register_builtin_adts(&mut self, env: &Env) {
        let bool_def = TypeDef {
            name: "Bool".into(),
            type_params: vec![],
            variants: vec![
                VariantDef { name: "True".into(), fields: vec![] },
                VariantDef { name: "False".into(), fields: vec![] },
            ],
        };
        let option_def = TypeDef {
            name: "Option".into(),
            type_params: vec!["a".into()],
            variants: vec![
                VariantDef { name: "Some".into(), fields: vec![TypeRef::Named("a".into())] },
                VariantDef { name: "None".into(), fields: vec![] },
            ],
        };
        let result_def = TypeDef {
            name: "Result".into(),
            type_params: vec!["a".into(), "e".into()],
            variants: vec![
                VariantDef { name: "Ok".into(), fields: vec![TypeRef::Named("a".into())] },
                VariantDef { name: "Err".into(), fields: vec![TypeRef::Named("e".into())] },
            ],
        };
        for def in [bool_def, option_def, result_def] {
            self.register_adt_constructors(&def, env);
        }
    }

    fn register_adt_constructors(&mut self, def: &TypeDef, env: &Env) {
        for variant in &def.variants {
            self.constructor_adt.insert(variant.name.clone(), def.name.clone());
            let value = if variant.fields.is_empty() {
                Value::Constructor { name: variant.name.clone(), args: Rc::new(Vec::new()) }
            } else {
                let ctor_name = variant.name.clone();
                Value::Native(Rc::new(NativeFn {
                    name: variant.name.clone(),
                    arity: variant.fields.len(),
                    collected: Vec::new(),
                    func: Rc::new(move |_evalr, args: &[Value]| {
                        Ok(Value::Constructor { name: ctor_name.clone(), args: Rc::new(args.to_vec()) })
                    }),
                }))
            };
            env.define(variant.name.clone(), value);
        }
    }

    fn eval_value_def(&mut self, def: &ValueDef, env: &Env) -> Result<(), RuntimeError> {
        let body = Rc::new(def.body.clone());
        let root = body.root.expect("value def has a body");
        let recursive = body_mentions(&body, def.name.as_str());
        if recursive {
            let cell = Rc::new(RefCell::new(Value::Unit));
            let def_env = env.child();
            def_env.define(def.name.clone(), Value::Cell(cell.clone()));
            let v = self.eval_expr(&body, root, &def_env)?;
            *cell.borrow_mut() = v;
            env.define(def.name.clone(), Value::Cell(cell));
        } else {
            let v = self.eval_expr(&body, root, env)?;
            env.define(def.name.clone(), v);
        }
        Ok(())
    }

    pub fn eval_expr(&mut self, body: &Rc<Body>, id: ExprId, env: &Env) -> Result<Value, RuntimeError> {
        match body.expr(id) {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::StringLit(s) => Ok(Value::String(s.as_str().into())),
            Expr::Unit => Ok(Value::Unit),

            Expr::Var(name) => match env.get(name) {
                Some(v) => Ok(v),
                None if self.traits.is_trait_function(name) => {
                    Ok(Value::TraitFunction { name: name.clone(), partial_args: Rc::new(Vec::new()) })
                }
                None => Err(RuntimeError::UndefinedVariable { name: name.clone() }),
            },

            Expr::Lambda { params, body: body_id } => Ok(Value::Function(Rc::new(Closure {
                params: params.clone(),
                body_id: *body_id,
                arena: body.clone(),
                env: env.clone(),
            }))),

            Expr::App { func, args } => {
                let mut f = self.eval_expr(body, *func, env)?;
                for &a in args {
                    let arg = self.eval_expr(body, a, env)?;
                    f = self.apply(f, arg)?;
                }
                Ok(f)
            }

            Expr::If { cond, then_branch, else_branch } => {
                let c = self.eval_expr(body, *cond, env)?;
                match c.force().as_bool() {
                    Some(true) => self.eval_expr(body, *then_branch, env),
                    Some(false) => self.eval_expr(body, *else_branch, env),
                    None => Err(RuntimeError::TypeError { message: "`if` condition is not a Bool".into() }),
                }
            }

            Expr::Match { scrutinee, arms } => {
                let s = self.eval_expr(body, *scrutinee, env)?;
                for (pat, arm_body) in arms {
                    let arm_env = env.child();
                    if self.try_match(body, *pat, &s, &arm_env) {
                        return self.eval_expr(body, *arm_body, &arm_env);
                    }
                }
                Err(RuntimeError::NonExhaustiveMatch)
            }

            Expr::Record(fields) => {
                let mut map = IndexMap::new();
                for (name, expr_id) in fields {
                    map.insert(name.clone(), self.eval_expr(body, *expr_id, env)?);
                }
                Ok(Value::Record(Rc::new(map)))
            }

            Expr::Tuple(elems) => {
                let vals = elems.iter().map(|e| self.eval_expr(body, *e, env)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(Rc::new(vals)))
            }

            Expr::List(elems) => {
                let vals = elems.iter().map(|e| self.eval_expr(body, *e, env)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(Rc::new(vals)))
            }

            Expr::Accessor { field, optional } => Ok(self.accessor_function(field.clone(), *optional)),

            Expr::Binary { op, lhs, rhs } => self.eval_binary(body, *op, *lhs, *rhs, env),

            Expr::Seq { first, rest } => {
                self.eval_expr(body, *first, env)?;
                self.eval_expr(body, *rest, env)
            }

            Expr::Let { pat, value, body: rest, recursive } => {
                let let_env = env.child();
                if *recursive {
                    if let Pattern::Variable(name) = body.pattern(*pat).clone() {
                        let cell = Rc::new(RefCell::new(Value::Unit));
                        let_env.define(name.clone(), Value::Cell(cell.clone()));
                        let v = self.eval_expr(body, *value, &let_env)?;
                        *cell.borrow_mut() = v;
                        return self.eval_expr(body, *rest, &let_env);
                    }
                }
                let v = self.eval_expr(body, *value, env)?;
                self.bind_pattern(body, *pat, &v, &let_env)?;
                self.eval_expr(body, *rest, &let_env)
            }

            Expr::Where { body: inner, bindings } => {
                let where_env = env.child();
                for (pat, value) in bindings {
                    let v = self.eval_expr(body, *value, &where_env)?;
                    self.bind_pattern(body, *pat, &v, &where_env)?;
                }
                self.eval_expr(body, *inner, &where_env)
            }

            Expr::Import { path } => Err(RuntimeError::ImportFailure { path: path.clone() }),

            Expr::Annotate { expr, .. } => self.eval_expr(body, *expr, env),

            Expr::Mut { name, init, body: rest } => {
                let v = self.eval_expr(body, *init, env)?;
                let mut_env = env.child();
                mut_env.define(name.clone(), Value::Cell(Rc::new(RefCell::new(v))));
                self.eval_expr(body, *rest, &mut_env)
            }

            Expr::MutSet { name, value, body: rest } => {
                let cell = match env.get(name) {
                    Some(Value::Cell(c)) => c,
                    Some(_) => {
                        return Err(RuntimeError::CellMisuse { message: format!("`{name}` is not a mutable binding") })
                    }
                    None => return Err(RuntimeError::UndefinedVariable { name: name.clone() }),
                };
                let v = self.eval_expr(body, *value, env)?;
                *cell.borrow_mut() = v;
                self.eval_expr(body, *rest, env)
            }
        }
    }

    /// Applies `f` to one argument, handling currying (spec §4.6): an n-ary
    /// closure consumes one argument at a time, returning either the next
    /// partial closure or the body's value once every parameter is bound.
    pub fn apply(&mut self, f: Value, arg: Value) -> Result<Value, RuntimeError> {
        self.depth += 1;
        if self.depth > self.config.max_call_depth {
            self.depth -= 1;
            return Err(RuntimeError::StackOverflow { max: self.config.max_call_depth });
        }
        let result = self.apply_inner(f, arg);
        self.depth -= 1;
        result
    }

    fn apply_inner(&mut self, f: Value, arg: Value) -> Result<Value, RuntimeError> {
        match f.force() {
            Value::Function(closure) => {
                let call_env = closure.env.child();
                self.bind_pattern(&closure.arena, closure.params[0], &arg, &call_env)?;
                if closure.params.len() == 1 {
                    self.eval_expr(&closure.arena, closure.body_id, &call_env)
                } else {
                    Ok(Value::Function(Rc::new(Closure {
                        params: closure.params[1..].to_vec(),
                        body_id: closure.body_id,
                        arena: closure.arena.clone(),
                        env: call_env,
                    })))
                }
            }
            Value::Native(native) => {
                let mut collected = native.collected.clone();
                collected.push(arg);
                if collected.len() == native.arity {
                    (native.func)(self, &collected)
                } else {
                    Ok(Value::Native(Rc::new(NativeFn {
                        name: native.name.clone(),
                        arity: native.arity,
                        collected,
                        func: native.func.clone(),
                    })))
                }
            }
            Value::TraitFunction { name, partial_args } => {
                let mut args = partial_args.as_ref().clone();
                args.push(arg);
                self.apply_trait_function(name, args)
            }
            _ => Err(RuntimeError::NotCallable),
        }
    }

    /// Spec §4.7's five-step dispatch, run every time a deferred trait call
    /// gains another argument: attempt resolution on whatever args have
    /// accumulated so far, not just once the call's full declared arity is
    /// known -- the resolved impl's own arity (handled by ordinary currying
    /// in `apply`) takes care of collecting any arguments still missing.
    /// Failing outright (step 5) is gated on `declared_arity`, though: a
    /// trait function dispatching on its *last* argument (`Functor.map`,
    /// say) would otherwise see a concrete-but-unmatched first argument and
    /// raise `NoImplementation` before the one argument that actually
    /// selects an implementation has even arrived.
    fn apply_trait_function(&mut self, name: Name, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match dispatch::resolve(&self.traits, &name, &args, |v| self.dispatch_type_name(v)) {
            Some(res) => {
                trace!(trait_name = %res.trait_name, type_name = %res.type_name, function = %name, "runtime trait dispatch resolved");
                let mut result =
                    self.closure_from_impl_function(res.impl_.functions.get(name.as_str()).expect("resolved function"))?;
                for a in args {
                    result = self.apply(result, a)?;
                }
                Ok(result)
            }
            None => {
                let exhausted = match self.declared_arity(&name) {
                    Some(arity) => args.len() >= arity,
                    None => true,
                };
                if exhausted && dispatch::all_concrete(&args, |v| self.dispatch_type_name(v)) {
                    let trait_name =
                        self.traits.traits_defining(&name).first().map(|d| d.name.clone()).unwrap_or_else(|| "<unknown>".into());
                    let type_name = dispatch::candidates_for(&args, |v| self.dispatch_type_name(v))
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| "<unknown>".into());
                    Err(RuntimeError::NoImplementation { trait_name, function: name, type_name })
                } else {
                    Ok(Value::TraitFunction { name, partial_args: Rc::new(args) })
                }
            }
        }
    }

    /// The widest parameter count any trait declaring `name` gives it, so
    /// `apply_trait_function` knows how many arguments to collect before it
    /// is entitled to give up. `None` if no trait declares `name` at all
    /// (shouldn't happen -- `Expr::Var` only produces a `TraitFunction` value
    /// for names `is_trait_function` already confirmed).
    fn declared_arity(&self, name: &str) -> Option<usize> {
        self.traits
            .traits_defining(name)
            .into_iter()
            .filter_map(|def| match def.functions.get(name) {
                Some(Type::Function { params, .. }) => Some(params.len()),
                _ => None,
            })
            .max()
    }

    /// Builds a callable `Value` from one trait implementation's function
    /// body. Trait impl bodies only ever reference their own parameters
    /// plus names visible at the global scope (constructors, stdlib
    /// functions) -- never a caller's local frame -- so capturing the
    /// environment `eval_program` populated (falling back to an empty root
    /// if dispatch is somehow reached before any program ran) is correct
    /// regardless of where dispatch happened to occur.
    fn closure_from_impl_function(&self, fn_body: &Body) -> Result<Value, RuntimeError> {
        let arena = Rc::new(fn_body.clone());
        let root = arena.root.expect("trait impl function has a body");
        let captured = self.global_env.clone().unwrap_or_else(Env::root);
        match arena.expr(root) {
            Expr::Lambda { params, body: body_id } => Ok(Value::Function(Rc::new(Closure {
                params: params.clone(),
                body_id: *body_id,
                arena: arena.clone(),
                env: captured,
            }))),
            _ => {
                // A bare reference (`f = someOtherFn`), per spec §4.2: the
                // whole body *is* the value, not a lambda to curry into.
                Err(RuntimeError::TypeError { message: "trait implementation function body is not callable".into() })
            }
        }
    }

    fn accessor_function(&self, field: Name, optional: bool) -> Value {
        Value::Native(Rc::new(NativeFn {
            name: if optional { format!("@{field}?").into() } else { format!("@{field}").into() },
            arity: 1,
            collected: Vec::new(),
            func: Rc::new(move |_evalr, args: &[Value]| {
                let record = match args[0].force() {
                    Value::Record(map) => map,
                    _ => return Err(RuntimeError::TypeError { message: "accessor applied to a non-record value".into() }),
                };
                match record.get(field.as_str()) {
                    Some(v) => Ok(if optional { Value::some(v.clone()) } else { v.clone() }),
                    None if optional => Ok(Value::none()),
                    None => Err(RuntimeError::TypeError { message: format!("record has no field `{field}`") }),
                }
            }),
        }))
    }

    fn eval_binary(&mut self, body: &Rc<Body>, op: BinaryOp, lhs: ExprId, rhs: ExprId, env: &Env) -> Result<Value, RuntimeError> {
        match op {
            BinaryOp::PipeRight | BinaryOp::Thrush => {
                let a = self.eval_expr(body, lhs, env)?;
                let f = self.eval_expr(body, rhs, env)?;
                self.apply(f, a)
            }
            BinaryOp::PipeLeft | BinaryOp::Dollar => {
                let f = self.eval_expr(body, lhs, env)?;
                let a = self.eval_expr(body, rhs, env)?;
                self.apply(f, a)
            }
            BinaryOp::SafeBind => {
                let container = self.eval_expr(body, lhs, env)?;
                let func = self.eval_expr(body, rhs, env)?;
                self.eval_safe_bind(container, func)
            }
            BinaryOp::Eq => {
                let l = self.eval_expr(body, lhs, env)?;
                let r = self.eval_expr(body, rhs, env)?;
                Ok(Value::bool(l.force().structurally_eq(&r.force())))
            }
            BinaryOp::NotEq => {
                let l = self.eval_expr(body, lhs, env)?;
                let r = self.eval_expr(body, rhs, env)?;
                Ok(Value::bool(!l.force().structurally_eq(&r.force())))
            }
            _ if op.is_comparison() => {
                let l = self.eval_expr(body, lhs, env)?.force();
                let r = self.eval_expr(body, rhs, env)?.force();
                self.eval_order_comparison(op, &l, &r)
            }
            _ => {
                let l = self.eval_expr(body, lhs, env)?;
                let r = self.eval_expr(body, rhs, env)?;
                self.eval_arith(op, l, r)
            }
        }
    }

    fn eval_order_comparison(&self, op: BinaryOp, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
        let ordering = match (l, r) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => {
                return Err(RuntimeError::TypeError {
                    message: "ordering comparisons require two numbers or two strings".into(),
                })
            }
        };
        let ordering = ordering.ok_or_else(|| RuntimeError::TypeError { message: "NaN is not ordered".into() })?;
        let result = match op {
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Ge => ordering.is_ge(),
            _ => unreachable!("only the order-comparison operators reach here"),
        };
        Ok(Value::bool(result))
    }

    /// `+ - * / %` (spec §4.6): primitive operands short-circuit the trait
    /// registry, everything else dispatches through it. `/` always wraps in
    /// `Some`/`None` rather than erroring on division by zero (spec §4.4, §9).
    fn eval_arith(&mut self, op: BinaryOp, l: Value, r: Value) -> Result<Value, RuntimeError> {
        let lf = l.force();
        let rf = r.force();
        if let (Value::Number(a), Value::Number(b)) = (&lf, &rf) {
            return Ok(match op {
                BinaryOp::Add => Value::Number(a + b),
                BinaryOp::Sub => Value::Number(a - b),
                BinaryOp::Mul => Value::Number(a * b),
                BinaryOp::Rem => Value::Number(a % b),
                BinaryOp::Div => {
                    if *b == 0.0 {
                        Value::none()
                    } else {
                        Value::some(Value::Number(a / b))
                    }
                }
                _ => unreachable!("only the arithmetic operators reach here"),
            });
        }
        if op == BinaryOp::Add {
            if let (Value::String(a), Value::String(b)) = (&lf, &rf) {
                return Ok(Value::String(format!("{a}{b}").into()));
            }
        }
        self.apply_trait_function(op_function_name(op).into(), vec![lf, rf])
    }

    /// `|?` (spec §4.7): dispatches `bind` via the trait registry; `None`
    /// short-circuits without a dispatch attempt at all. `Option` itself is
    /// language-level rather than a stdlib `Monad` instance (same footing
    /// as its constructors, registered directly in `register_builtin_adts`
    /// rather than waiting on an `implement Monad Option` a host never
    /// writes), so `Some`'s case is handled directly too instead of going
    /// through the registry.
    fn eval_safe_bind(&mut self, container: Value, func: Value) -> Result<Value, RuntimeError> {
        let forced = container.force();
        match &forced {
            Value::Constructor { name, args } if name == "None" && args.is_empty() => return Ok(forced),
            Value::Constructor { name, args } if name == "Some" && args.len() == 1 => {
                let result = self.apply(func, args[0].clone())?;
                return Ok(self.wrap_monad_if_bare(&forced, result));
            }
            _ => {}
        }
        let type_name = self.dispatch_type_name(&forced);
        match dispatch::resolve(&self.traits, "bind", std::slice::from_ref(&forced), |v| self.dispatch_type_name(v)) {
            Some(res) => {
                let bind_fn = self.closure_from_impl_function(res.impl_.functions.get("bind").expect("resolved function"))?;
                let partial = self.apply(bind_fn, forced.clone())?;
                let result = self.apply(partial, func)?;
                Ok(self.wrap_monad_if_bare(&forced, result))
            }
            None => Err(RuntimeError::SafeBindUnavailable { type_name: type_name.unwrap_or_else(|| "Unknown".into()) }),
        }
    }

    /// Monad-preservation heuristic (spec §4.7): if `bind`'s result isn't
    /// itself wrapped in the container's own constructor family, wrap it.
    /// Only `Option`'s `Some`/`None` convention is recognized -- it's the
    /// only built-in monad this evaluator has native knowledge of; a
    /// user-defined `Monad` instance is expected to always return a
    /// correctly-wrapped value itself.
    fn wrap_monad_if_bare(&self, container: &Value, result: Value) -> Value {
        let is_option = matches!(container, Value::Constructor { name, .. } if name == "Some" || name == "None");
        if !is_option {
            return result;
        }
        match &result {
            Value::Constructor { name, .. } if name == "Some" || name == "None" => result,
            _ => Value::some(result),
        }
    }

    /// Attempts to match `pat` against `value`, defining any bound
    /// variables directly into `env` as it walks. Returns `false` (with
    /// `env` left partially populated, which is fine -- callers discard it
    /// on failure) on the first incompatibility.
    fn try_match(&self, body: &Body, pat: PatId, value: &Value, env: &Env) -> bool {
        match body.pattern(pat) {
            Pattern::Wildcard => true,
            Pattern::Variable(name) => {
                env.define(name.clone(), value.clone());
                true
            }
            Pattern::Number(n) => matches!(value.force(), Value::Number(v) if v == *n),
            Pattern::String(s) => matches!(value.force(), Value::String(v) if v.as_str() == s.as_str()),
            Pattern::Tuple(pats) => match value.force() {
                Value::Tuple(xs) if xs.len() == pats.len() => {
                    pats.iter().zip(xs.iter()).all(|(p, v)| self.try_match(body, *p, v, env))
                }
                _ => false,
            },
            Pattern::Record(fields) => match value.force() {
                Value::Record(map) => fields
                    .iter()
                    .all(|(name, pid)| map.get(name).map(|v| self.try_match(body, *pid, v, env)).unwrap_or(false)),
                _ => false,
            },
            Pattern::Constructor { name, args } => match value.force() {
                Value::Constructor { name: vn, args: vargs } if &vn == name && vargs.len() == args.len() => {
                    args.iter().zip(vargs.iter()).all(|(p, v)| self.try_match(body, *p, v, env))
                }
                _ => false,
            },
        }
    }

    /// Binds a pattern that's guaranteed (by the preceding type check) to
    /// match -- `let`, `where`, and lambda-parameter positions. A match
    /// failure here is a genuine bug rather than a control-flow outcome, so
    /// it surfaces as an error instead of a boolean.
    fn bind_pattern(&self, body: &Body, pat: PatId, value: &Value, env: &Env) -> Result<(), RuntimeError> {
        if self.try_match(body, pat, value, env) {
            Ok(())
        } else {
            Err(RuntimeError::TypeError { message: "pattern failed to match a statically-typechecked binding".into() })
        }
    }
}

fn op_function_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Rem => "rem",
        _ => "op",
    }
}

/// Whether `name` occurs free in `body` -- used to decide if a top-level or
/// `let` binding is self-referential and needs the `Cell` fix-point dance
/// (spec §9's "recursive binding via mutable cells" note). Mirrors
/// `noo_ty::infer::body_mentions`'s walk exactly; kept independent since the
/// two crates have no shared "AST walker" module to call into.
fn body_mentions(body: &Body, name: &str) -> bool {
    match body.root {
        Some(root) => expr_mentions(body, root, name),
        None => false,
    }
}

fn expr_mentions(body: &Body, id: ExprId, name: &str) -> bool {
    match body.expr(id) {
        Expr::Var(n) => n == name,
        Expr::Number(_) | Expr::StringLit(_) | Expr::Unit | Expr::Import { .. } => false,
        Expr::Lambda { body: b, .. } => expr_mentions(body, *b, name),
        Expr::App { func, args } => expr_mentions(body, *func, name) || args.iter().any(|a| expr_mentions(body, *a, name)),
        Expr::If { cond, then_branch, else_branch } => {
            expr_mentions(body, *cond, name) || expr_mentions(body, *then_branch, name) || expr_mentions(body, *else_branch, name)
        }
        Expr::Match { scrutinee, arms } => {
            expr_mentions(body, *scrutinee, name) || arms.iter().any(|(_, e)| expr_mentions(body, *e, name))
        }
        Expr::Record(fields) => fields.iter().any(|(_, e)| expr_mentions(body, *e, name)),
        Expr::Tuple(elems) | Expr::List(elems) => elems.iter().any(|e| expr_mentions(body, *e, name)),
        Expr::Accessor { .. } => false,
        Expr::Binary { lhs, rhs, .. } => expr_mentions(body, *lhs, name) || expr_mentions(body, *rhs, name),
        Expr::Seq { first, rest } => expr_mentions(body, *first, name) || expr_mentions(body, *rest, name),
        Expr::Let { value, body: rest, .. } => expr_mentions(body, *value, name) || expr_mentions(body, *rest, name),
        Expr::Where { body: inner, bindings } => {
            expr_mentions(body, *inner, name) || bindings.iter().any(|(_, e)| expr_mentions(body, *e, name))
        }
        Expr::Annotate { expr, .. } => expr_mentions(body, *expr, name),
        Expr::Mut { init, body: rest, .. } => expr_mentions(body, *init, name) || expr_mentions(body, *rest, name),
        Expr::MutSet { value, body: rest, .. } => expr_mentions(body, *value, name) || expr_mentions(body, *rest, name),
    }
}
