//! The inferencer (spec §4.4): walks the AST, producing `(type, effects,
//! state)` triples, threading a single `InferenceTable` and environment.

use crate::error::TypeError;
use crate::resolve::{check_structural, try_resolve_constraints};
use crate::scheme::{generalize, instantiate, TypeEnvironment, TypeScheme, ValueShape};
use crate::subst::InferenceTable;
use crate::traits::TraitRegistry;
use crate::ty::{Constraint, Name, RowField, RowStructure, Type};
use noo_ast::expr::{Body, Expr, ExprId};
use noo_ast::op::{BinaryOp, Effect};
use noo_ast::pattern::{PatId, Pattern};
use noo_ast::type_ref::{ConstraintRef, RowFieldRef, TypeRef};
use noo_ast::{Definition, ImplDef, Program, Span, TraitDef, TypeDef, ValueDef, VariantDef};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// A registered ADT: its type parameters and its constructors.
#[derive(Debug, Clone)]
pub struct AdtInfo {
    pub type_params: Vec<Name>,
    pub variants: Vec<VariantDef>,
}

#[derive(Debug, Clone, Default)]
pub struct AdtRegistry {
    types: FxHashMap<Name, AdtInfo>,
    /// constructor name -> owning type name
    constructors: FxHashMap<Name, Name>,
}

impl AdtRegistry {
    pub fn type_of_constructor(&self, ctor: &str) -> Option<&Name> {
        self.constructors.get(ctor)
    }

    pub fn info(&self, type_name: &str) -> Option<&AdtInfo> {
        self.types.get(type_name)
    }
}

/// The result of inferring one expression: its type and the effects its
/// evaluation may perform. Effects are unioned across composition (spec
/// §3.1, tested by the "effect monotonicity" property in spec §8).
#[derive(Debug, Clone)]
pub struct TypeResult {
    pub ty: Type,
    pub effects: BTreeSet<Effect>,
}

impl TypeResult {
    fn pure(ty: Type) -> Self {
        TypeResult { ty, effects: BTreeSet::new() }
    }
}

/// Contract for resolving `import "path"` to an already-inferred program.
/// Circular imports are not supported (spec §4.4); implementations are
/// expected to detect cycles themselves and fail rather than hang.
pub trait ImportResolver {
    fn resolve(&mut self, path: &str) -> Result<Type, TypeError>;
}

pub struct NoImports;
impl ImportResolver for NoImports {
    fn resolve(&mut self, path: &str) -> Result<Type, TypeError> {
        Err(TypeError::UndefinedVariable {
            name: format!("import \"{path}\"").into(),
            location: Span::DUMMY,
            hint: Some("no import resolver configured".into()),
        })
    }
}

pub struct Inferencer {
    pub env: TypeEnvironment,
    pub table: InferenceTable,
    pub traits: TraitRegistry,
    pub adts: AdtRegistry,
    accessor_cache: FxHashMap<Name, TypeScheme>,
}

impl Inferencer {
    pub fn new() -> Self {
        let mut inferencer = Inferencer {
            env: TypeEnvironment::default(),
            table: InferenceTable::new(),
            traits: TraitRegistry::new(),
            adts: AdtRegistry::default(),
            accessor_cache: FxHashMap::default(),
        };
        inferencer.register_builtin_adts();
        inferencer
    }

    /// `Bool`/`Option`/`Result` are language-level ADTs: their constructors
    /// are woven into every evaluator regardless of whether `stdlib.noo`
    /// happened to redeclare them, the same way a host language's `true`
    /// and `false` aren't user code. Everything else an ADT offers comes
    /// from `type` definitions walked in `infer_program`. Routed through
    /// `register_type_def` itself so these constructors land in `self.env`
    /// exactly like a user-written `type` definition's do.
    fn register_builtin_adts(&mut self) {
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
            self.register_type_def(&def).expect("built-in ADTs are well-formed");
        }
    }

    /// Infers every top-level definition in order, registering value
    /// bindings, ADTs, traits, and impls into `self` as it goes.
    pub fn infer_program(
        &mut self,
        program: &Program,
        imports: &mut dyn ImportResolver,
    ) -> Result<(), TypeError> {
        for def in &program.definitions {
            self.infer_definition(def, imports)?;
        }
        Ok(())
    }

    fn infer_definition(&mut self, def: &Definition, imports: &mut dyn ImportResolver) -> Result<(), TypeError> {
        match def {
            Definition::Value(v) => self.infer_value_def(v, imports).map(|_| ()),
            Definition::Type(t) => self.register_type_def(t),
            Definition::Trait(t) => self.register_trait_def(t),
            Definition::Impl(i) => self.register_impl_def(i),
        }
    }

    fn infer_value_def(&mut self, def: &ValueDef, imports: &mut dyn ImportResolver) -> Result<TypeResult, TypeError> {
        let recursive = body_mentions(&def.body, def.name.as_str());
        let result = if recursive {
            let placeholder = self.table.new_var(vec![]);
            self.env.insert(def.name.clone(), TypeScheme::monomorphic(Type::Variable { var: placeholder, constraints: vec![] }));
            let r = self.infer_expr(&def.body, def.body.root.expect("value def has a body"), imports)?;
            self.table.unify(&Type::Variable { var: placeholder, constraints: vec![] }, &r.ty).map_err(unify_to_type_error)?;
            r
        } else {
            self.infer_expr(&def.body, def.body.root.expect("value def has a body"), imports)?
        };

        let ty = if let Some(annotation) = &def.annotation {
            let declared = self.lower_type_ref(annotation);
            self.table.unify(&declared, &result.ty).map_err(unify_to_type_error)?;
            declared
        } else {
            result.ty
        };

        let shape = if recursive { ValueShape::Application } else { expr_shape(&def.body) };
        let scheme = generalize(&ty, &self.env, &mut self.table, shape);
        self.env.insert(def.name.clone(), scheme);
        Ok(TypeResult { ty, effects: result.effects })
    }

    fn register_type_def(&mut self, def: &TypeDef) -> Result<(), TypeError> {
        if variant_is_recursive(def) {
            return Err(TypeError::RecursiveAdtUnsupported { name: def.name.clone(), location: Span::DUMMY });
        }
        self.adts.types.insert(def.name.clone(), AdtInfo { type_params: def.type_params.clone(), variants: def.variants.clone() });
        for variant in &def.variants {
            self.adts.constructors.insert(variant.name.clone(), def.name.clone());
            let ctor_type = self.curried_constructor_type(def, variant);
            let scheme = generalize(&ctor_type, &self.env, &mut self.table, ValueShape::SyntacticValue);
            self.env.insert(variant.name.clone(), scheme);
        }
        Ok(())
    }

    fn curried_constructor_type(&mut self, def: &TypeDef, variant: &VariantDef) -> Type {
        // `Bool` is kept as `Type::Primitive(Primitive::Bool)` throughout
        // rather than as a `Variant` -- it's the one built-in ADT whose
        // values also need to unify against the primitive the comparison
        // operators and `if` conditions already expect.
        if def.name == "Bool" {
            return Type::bool();
        }
        let result = Type::Variant {
            name: def.name.clone(),
            args: def.type_params.iter().map(|_| Type::Variable { var: self.table.new_var(vec![]), constraints: vec![] }).collect(),
        };
        // Re-lower field types against the *same* result so repeated type
        // parameters (`Cons a (List a)`) share a variable; this is a
        // simplification (see DESIGN.md) that treats each field
        // independently rather than threading a substitution built from
        // `def.type_params`.
        let param_types: Vec<Type> = variant.fields.iter().map(|f| self.lower_type_ref(f)).collect();
        if param_types.is_empty() {
            result
        } else {
            Type::function(param_types, result)
        }
    }

    fn register_trait_def(&mut self, def: &TraitDef) -> Result<(), TypeError> {
        let mut functions = indexmap::IndexMap::new();
        for (name, sig) in &def.functions {
            functions.insert(name.clone(), self.lower_type_ref(sig));
        }
        self.traits.add_trait_definition(crate::traits::TraitDefinition {
            name: def.name.clone(),
            type_param: def.type_param.clone(),
            functions,
        });
        Ok(())
    }

    fn register_impl_def(&mut self, def: &ImplDef) -> Result<(), TypeError> {
        let given = def.given.as_ref().map(|c| self.lower_constraint_ref(c));
        let mut functions = indexmap::IndexMap::new();
        for (name, body) in &def.functions {
            functions.insert(name.clone(), body.clone());
        }
        let impl_ = crate::traits::TraitImplementation { type_name: def.type_name.clone(), functions, given };
        self.traits
            .add_trait_implementation(def.trait_name.clone(), impl_)
            .map_err(|e| register_error_to_type_error(&def.trait_name, e))
    }

    pub fn infer_expr(&mut self, body: &Body, id: ExprId, imports: &mut dyn ImportResolver) -> Result<TypeResult, TypeError> {
        match body.expr(id) {
            Expr::Number(_) => Ok(TypeResult::pure(Type::float())),
            Expr::StringLit(_) => Ok(TypeResult::pure(Type::string())),
            Expr::Unit => Ok(TypeResult::pure(Type::Unit)),

            Expr::Var(name) => self.infer_var(name),

            Expr::Lambda { params, body: body_id } => self.infer_lambda(body, params, *body_id, imports),

            Expr::App { func, args } => self.infer_app(body, *func, args, imports),

            Expr::If { cond, then_branch, else_branch } => {
                let c = self.infer_expr(body, *cond, imports)?;
                self.table.unify(&c.ty, &Type::bool()).map_err(unify_to_type_error)?;
                let t = self.infer_expr(body, *then_branch, imports)?;
                let e = self.infer_expr(body, *else_branch, imports)?;
                let ty = self.table.unify_functions(&t.ty, &e.ty).map_err(unify_to_type_error)?;
                let mut effects = c.effects;
                effects.extend(t.effects);
                effects.extend(e.effects);
                Ok(TypeResult { ty, effects })
            }

            Expr::Match { scrutinee, arms } => self.infer_match(body, *scrutinee, arms, imports),

            Expr::Record(fields) => {
                let mut map = indexmap::IndexMap::new();
                let mut effects = BTreeSet::new();
                for (name, expr_id) in fields {
                    let r = self.infer_expr(body, *expr_id, imports)?;
                    effects.extend(r.effects);
                    map.insert(name.clone(), r.ty);
                }
                Ok(TypeResult { ty: Type::Record(map), effects })
            }

            Expr::Tuple(elems) => {
                let mut tys = Vec::new();
                let mut effects = BTreeSet::new();
                for e in elems {
                    let r = self.infer_expr(body, *e, imports)?;
                    effects.extend(r.effects);
                    tys.push(r.ty);
                }
                Ok(TypeResult { ty: Type::Tuple(tys), effects })
            }

            Expr::List(elems) => {
                let elem_var = self.table.new_var(vec![]);
                let mut elem_ty = Type::Variable { var: elem_var, constraints: vec![] };
                let mut effects = BTreeSet::new();
                for e in elems {
                    let r = self.infer_expr(body, *e, imports)?;
                    effects.extend(r.effects);
                    self.table.unify(&elem_ty, &r.ty).map_err(unify_to_type_error)?;
                    elem_ty = self.table.apply(&elem_ty);
                }
                Ok(TypeResult { ty: Type::List(Box::new(elem_ty)), effects })
            }

            Expr::Accessor { field, optional } => Ok(TypeResult::pure(self.accessor_type(field, *optional))),

            Expr::Binary { op, lhs, rhs } => self.infer_binary(body, *op, *lhs, *rhs, imports),

            Expr::Seq { first, rest } => {
                let f = self.infer_expr(body, *first, imports)?;
                let r = self.infer_expr(body, *rest, imports)?;
                let mut effects = f.effects;
                effects.extend(r.effects);
                Ok(TypeResult { ty: r.ty, effects })
            }

            Expr::Let { pat, value, body: rest, recursive } => {
                self.infer_let(body, *pat, *value, *rest, *recursive, imports)
            }

            Expr::Where { body: inner, bindings } => {
                let saved_env = self.env.clone();
                let mut effects = BTreeSet::new();
                for (pat, value) in bindings {
                    let v = self.infer_expr(body, *value, imports)?;
                    effects.extend(v.effects);
                    self.bind_pattern(body, *pat, &v.ty, expr_shape_of(body, *value))?;
                }
                let result = self.infer_expr(body, *inner, imports)?;
                self.env = saved_env;
                effects.extend(result.effects);
                Ok(TypeResult { ty: result.ty, effects })
            }

            Expr::Import { path } => {
                let ty = imports.resolve(path)?;
                Ok(TypeResult::pure(ty))
            }

            Expr::Annotate { expr, ty } => {
                let r = self.infer_expr(body, *expr, imports)?;
                let declared = self.lower_type_ref(ty);
                self.table.unify(&declared, &r.ty).map_err(unify_to_type_error)?;
                Ok(TypeResult { ty: declared, effects: r.effects })
            }

            Expr::Mut { name, init, body: rest } => {
                let init_result = self.infer_expr(body, *init, imports)?;
                let saved = self.env.clone();
                self.env.insert(name.clone(), TypeScheme::monomorphic(init_result.ty.clone()));
                let rest_result = self.infer_expr(body, *rest, imports)?;
                self.env = saved;
                let mut effects = init_result.effects;
                effects.insert(Effect::State);
                effects.extend(rest_result.effects);
                Ok(TypeResult { ty: rest_result.ty, effects })
            }

            Expr::MutSet { name, value, body: rest } => {
                let current = self
                    .env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TypeError::UndefinedVariable { name: name.clone(), location: Span::DUMMY, hint: None })?;
                let current_ty = instantiate(&current, &mut self.table);
                let value_result = self.infer_expr(body, *value, imports)?;
                self.table.unify(&current_ty, &value_result.ty).map_err(unify_to_type_error)?;
                let rest_result = self.infer_expr(body, *rest, imports)?;
                let mut effects = value_result.effects;
                effects.insert(Effect::State);
                effects.extend(rest_result.effects);
                Ok(TypeResult { ty: rest_result.ty, effects })
            }
        }
    }

    fn infer_var(&mut self, name: &Name) -> Result<TypeResult, TypeError> {
        if let Some(scheme) = self.env.get(name).cloned() {
            return Ok(TypeResult::pure(instantiate(&scheme, &mut self.table)));
        }
        if self.traits.is_trait_function(name) {
            // Synthesize the function's type from (one of) the trait
            // signature(s), freshening the trait's type parameter to a new
            // variable constrained by `implements`.
            let candidates = self.traits.traits_defining(name);
            if let Some(def) = candidates.first() {
                let sig = def.functions.get(name.as_str()).expect("declared function");
                let var = self.table.new_var(vec![Constraint::Implements {
                    type_var: def.type_param.clone(),
                    interface_name: def.name.clone(),
                }]);
                let fresh = rename_param(sig, &def.type_param, var);
                return Ok(TypeResult::pure(fresh));
            }
        }
        Err(TypeError::UndefinedVariable {
            name: name.clone(),
            location: Span::DUMMY,
            hint: Some(format!("no binding named `{name}` is in scope")),
        })
    }

    fn infer_lambda(
        &mut self,
        body: &Body,
        params: &[PatId],
        body_id: ExprId,
        imports: &mut dyn ImportResolver,
    ) -> Result<TypeResult, TypeError> {
        let saved_env = self.env.clone();
        let mut param_tys = Vec::new();
        for &p in params {
            let var = self.table.new_var(vec![]);
            let ty = Type::Variable { var, constraints: vec![] };
            // Lambda parameters are always monomorphic within the body,
            // regardless of the pattern shape -- only `let`/`where` RHS
            // bindings get let-polymorphism (spec §4.3).
            self.bind_pattern(body, p, &ty, ValueShape::Application)?;
            param_tys.push(ty);
        }
        let result = self.infer_expr(body, body_id, imports)?;
        self.env = saved_env;
        let ty = Type::Function {
            params: param_tys,
            ret: Box::new(result.ty),
            effects: result.effects.clone(),
            constraints: vec![],
        };
        Ok(TypeResult { ty, effects: result.effects })
    }

    fn infer_app(
        &mut self,
        body: &Body,
        func: ExprId,
        args: &[ExprId],
        imports: &mut dyn ImportResolver,
    ) -> Result<TypeResult, TypeError> {
        let func_result = self.infer_expr(body, func, imports)?;
        let mut effects = func_result.effects;
        let mut arg_types = Vec::new();
        for &a in args {
            let r = self.infer_expr(body, a, imports)?;
            effects.extend(r.effects);
            arg_types.push(r.ty);
        }

        let func_ty = self.table.apply(&func_result.ty);
        let (params, ret, fn_effects, constraints) = match func_ty {
            Type::Function { params, ret, effects: fx, constraints } => (params, *ret, fx, constraints),
            Type::Variable { var, .. } => {
                let ret_ty = Type::Variable { var: self.table.new_var(vec![]), constraints: vec![] };
                let fresh_fn = Type::Function {
                    params: arg_types.clone(),
                    ret: Box::new(ret_ty.clone()),
                    effects: BTreeSet::new(),
                    constraints: vec![],
                };
                self.table.unify(&Type::Variable { var, constraints: vec![] }, &fresh_fn).map_err(unify_to_type_error)?;
                (arg_types.clone(), ret_ty, BTreeSet::new(), vec![])
            }
            other => {
                return Err(TypeError::mismatch(
                    &Type::function(arg_types, Type::Unknown),
                    &other,
                    Span::DUMMY,
                    Some("attempted to apply a non-function".into()),
                ));
            }
        };

        if args.len() > params.len() {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                got: args.len(),
                context: "function application".into(),
                location: Span::DUMMY,
            });
        }

        for (p, a) in params.iter().zip(arg_types.iter()) {
            self.unify_param(p, a)?;
        }
        effects.extend(fn_effects.iter().copied());

        if args.len() == params.len() {
            let (resolved_ret, remaining) =
                try_resolve_constraints(&mut self.table, &self.traits, ret, constraints, &arg_types);
            let final_ty = if remaining.is_empty() {
                resolved_ret
            } else {
                let mut map = indexmap::IndexMap::new();
                for c in remaining {
                    map.entry(c.type_var().clone()).or_insert_with(Vec::new).push(c);
                }
                Type::Constrained { base: Box::new(resolved_ret), constraints: map }
            };
            Ok(TypeResult { ty: final_ty, effects })
        } else {
            // Partial application: remaining parameters, propagated constraints.
            let remaining_params = params[arg_types.len()..].to_vec();
            let ty = Type::Function {
                params: remaining_params,
                ret: Box::new(ret),
                effects: fn_effects,
                constraints,
            };
            Ok(TypeResult { ty, effects })
        }
    }

    fn infer_binary(
        &mut self,
        body: &Body,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        imports: &mut dyn ImportResolver,
    ) -> Result<TypeResult, TypeError> {
        match op {
            BinaryOp::PipeRight => {
                // `a |> f` == `f a`
                let a = self.infer_expr(body, lhs, imports)?;
                let f = self.infer_expr(body, rhs, imports)?;
                self.apply_value_to_fn(a, f)
            }
            BinaryOp::PipeLeft => {
                let f = self.infer_expr(body, lhs, imports)?;
                let a = self.infer_expr(body, rhs, imports)?;
                self.apply_value_to_fn(a, f)
            }
            BinaryOp::Thrush => {
                let a = self.infer_expr(body, lhs, imports)?;
                let f = self.infer_expr(body, rhs, imports)?;
                self.apply_value_to_fn(a, f)
            }
            BinaryOp::Dollar => {
                let f = self.infer_expr(body, lhs, imports)?;
                let a = self.infer_expr(body, rhs, imports)?;
                self.apply_value_to_fn(a, f)
            }
            BinaryOp::SafeBind => {
                // Desugars to `Monad.bind`; resolution may fall through to
                // runtime (spec §4.4, §4.7). Statically we give it the type
                // of `bind : m a -> (a -> m b) -> m b` with an `implements
                // Monad` constraint on the container.
                let container = self.infer_expr(body, lhs, imports)?;
                let func = self.infer_expr(body, rhs, imports)?;
                let result_var = self.table.new_var(vec![Constraint::Implements {
                    type_var: "m".into(),
                    interface_name: "Monad".into(),
                }]);
                let mut effects = container.effects;
                effects.extend(func.effects);
                Ok(TypeResult { ty: Type::Variable { var: result_var, constraints: vec![] }, effects })
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                // Open question per spec §9: kept universal, no `Eq`
                // constraint attached (do not guess further than spec asks).
                let l = self.infer_expr(body, lhs, imports)?;
                let r = self.infer_expr(body, rhs, imports)?;
                self.table.unify(&l.ty, &r.ty).map_err(unify_to_type_error)?;
                let mut effects = l.effects;
                effects.extend(r.effects);
                Ok(TypeResult { ty: Type::bool(), effects })
            }
            _ if op.is_comparison() => {
                let l = self.infer_expr(body, lhs, imports)?;
                let r = self.infer_expr(body, rhs, imports)?;
                self.table.unify(&l.ty, &r.ty).map_err(unify_to_type_error)?;
                let mut effects = l.effects;
                effects.extend(r.effects);
                Ok(TypeResult { ty: Type::bool(), effects })
            }
            _ => {
                let l = self.infer_expr(body, lhs, imports)?;
                let r = self.infer_expr(body, rhs, imports)?;
                self.table.unify(&l.ty, &r.ty).map_err(unify_to_type_error)?;
                let mut effects = l.effects;
                effects.extend(r.effects);
                // Typed optimistically as `a -> a -> a` (`/` returns
                // `Option a`, spec §4.4's division-by-zero note). `Float`
                // (every arithmetic op) and `String` (`+` only) short-circuit
                // the registry here the same way `eval_arith` short-circuits
                // it at runtime, so neither ever needs a registered impl.
                // Any other already-concrete type does -- spec §4.5's error
                // generation rule ("when resolution fails *and* the dispatch
                // position is concrete, produce `NoImplementation`") fires
                // right here rather than deferring, since runtime dispatch
                // would only ever see the same already-concrete type.
                let a = self.table.apply(&l.ty);
                if let Some(trait_name) = op.trait_name() {
                    if let Some(type_name) = crate::ty::dispatch_type_name(&a) {
                        if !a.is_bool()
                            && !op_has_primitive_fast_path(op, &a)
                            && self.traits.resolve_trait_function(op_function_name(op), &[a.clone(), a.clone()]).is_none()
                        {
                            return Err(TypeError::NoImplementation {
                                trait_name: trait_name.into(),
                                function: op_function_name(op).into(),
                                type_name,
                                available_types: self.traits.available_types(trait_name),
                                location: Span::DUMMY,
                            });
                        }
                    }
                }
                let result_ty = if op == BinaryOp::Div {
                    Type::Variant { name: "Option".into(), args: vec![a] }
                } else {
                    a
                };
                Ok(TypeResult { ty: result_ty, effects })
            }
        }
    }

    /// Unifies a parameter's (possibly `has`-constrained) type against an
    /// argument's type. Generic `unify` only checks *structure* (spec
    /// §4.1); a bare unbound variable binds to any concrete type without
    /// consulting its own `HasStructure` constraints. Those are checked
    /// explicitly here, mirroring how `@field` and record-pattern matching
    /// already go through `check_structural` (spec §4.5 point 1).
    fn unify_param(&mut self, param: &Type, arg: &Type) -> Result<(), TypeError> {
        let resolved_param = self.table.apply(param);
        let resolved_arg = self.table.apply(arg);
        if let Type::Variable { constraints, .. } = &resolved_param {
            if let Type::Record(_) = &resolved_arg {
                for c in constraints {
                    if let Constraint::HasStructure { structure, .. } = c {
                        check_structural(&mut self.table, &resolved_arg, structure, Span::DUMMY)
                            .map_err(row_error_to_type_error)?;
                    }
                }
            }
        }
        self.table.unify(&resolved_param, &resolved_arg).map_err(unify_to_type_error)
    }

    fn apply_value_to_fn(&mut self, value: TypeResult, func: TypeResult) -> Result<TypeResult, TypeError> {
        let func_ty = self.table.apply(&func.ty);
        match func_ty {
            Type::Function { params, ret, effects: fx, constraints } if params.len() == 1 => {
                self.unify_param(&params[0], &value.ty)?;
                let (resolved, remaining) =
                    try_resolve_constraints(&mut self.table, &self.traits, *ret, constraints, &[value.ty.clone()]);
                let ty = if remaining.is_empty() {
                    resolved
                } else {
                    let mut map = indexmap::IndexMap::new();
                    for c in remaining {
                        map.entry(c.type_var().clone()).or_insert_with(Vec::new).push(c);
                    }
                    Type::Constrained { base: Box::new(resolved), constraints: map }
                };
                let mut effects = value.effects;
                effects.extend(func.effects);
                effects.extend(fx);
                Ok(TypeResult { ty, effects })
            }
            other => Err(TypeError::mismatch(
                &Type::function(vec![value.ty], Type::Unknown),
                &other,
                Span::DUMMY,
                Some("pipeline/thrush target must be a unary function".into()),
            )),
        }
    }

    fn infer_match(
        &mut self,
        body: &Body,
        scrutinee: ExprId,
        arms: &[(PatId, ExprId)],
        imports: &mut dyn ImportResolver,
    ) -> Result<TypeResult, TypeError> {
        let scrutinee_result = self.infer_expr(body, scrutinee, imports)?;
        let mut effects = scrutinee_result.effects;
        let mut result_ty: Option<Type> = None;
        for (pat, arm_body) in arms {
            let saved_env = self.env.clone();
            self.bind_pattern_against(body, *pat, &scrutinee_result.ty)?;
            let r = self.infer_expr(body, *arm_body, imports)?;
            self.env = saved_env;
            effects.extend(r.effects);
            match &result_ty {
                None => result_ty = Some(r.ty),
                Some(existing) => {
                    let unified = self.table.unify_functions(existing, &r.ty).map_err(unify_to_type_error)?;
                    result_ty = Some(unified);
                }
            }
        }
        Ok(TypeResult {
            ty: result_ty.unwrap_or(Type::Unit),
            effects,
        })
    }

    fn infer_let(
        &mut self,
        body: &Body,
        pat: PatId,
        value: ExprId,
        rest: ExprId,
        recursive: bool,
        imports: &mut dyn ImportResolver,
    ) -> Result<TypeResult, TypeError> {
        let saved_env = self.env.clone();
        if recursive {
            if let Pattern::Variable(name) = body.pattern(pat).clone() {
                let placeholder = self.table.new_var(vec![]);
                self.env.insert(name.clone(), TypeScheme::monomorphic(Type::Variable { var: placeholder, constraints: vec![] }));
                let v = self.infer_expr(body, value, imports)?;
                self.table.unify(&Type::Variable { var: placeholder, constraints: vec![] }, &v.ty).map_err(unify_to_type_error)?;
                let scheme = generalize(&v.ty, &self.env, &mut self.table, ValueShape::Application);
                self.env.insert(name, scheme);
                let r = self.infer_expr(body, rest, imports)?;
                self.env = saved_env;
                let mut effects = v.effects;
                effects.extend(r.effects);
                return Ok(TypeResult { ty: r.ty, effects });
            }
        }
        let v = self.infer_expr(body, value, imports)?;
        self.bind_pattern(body, pat, &v.ty, expr_shape_of(body, value))?;
        let r = self.infer_expr(body, rest, imports)?;
        self.env = saved_env;
        let mut effects = v.effects;
        effects.extend(r.effects);
        Ok(TypeResult { ty: r.ty, effects })
    }

    /// Binds a pattern's variables against a freshly-known type, applying
    /// the value restriction per-binding (spec §4.3). `shape` is the shape of
    /// the expression this pattern is bound to -- a bare variable pattern
    /// bound to a syntactic value generalizes; everything else (lambda
    /// parameters, match arms, non-variable destructuring) binds
    /// monomorphically, so callers that aren't a direct `let`/`where` RHS
    /// should pass `ValueShape::Application` regardless of what produced it.
    fn bind_pattern(&mut self, body: &Body, pat: PatId, ty: &Type, shape: ValueShape) -> Result<(), TypeError> {
        match body.pattern(pat) {
            Pattern::Wildcard => Ok(()),
            Pattern::Variable(name) => {
                let scheme = generalize(ty, &self.env, &mut self.table, shape);
                self.env.insert(name.clone(), scheme);
                Ok(())
            }
            Pattern::Number(_) | Pattern::String(_) => Ok(()),
            Pattern::Tuple(pats) => {
                let elem_vars: Vec<Type> = pats.iter().map(|_| {
                    Type::Variable { var: self.table.new_var(vec![]), constraints: vec![] }
                }).collect();
                self.table.unify(ty, &Type::Tuple(elem_vars.clone())).map_err(unify_to_type_error)?;
                for (p, t) in pats.iter().zip(elem_vars.iter()) {
                    self.bind_pattern(body, *p, t, shape)?;
                }
                Ok(())
            }
            Pattern::Record(fields) => {
                let mut structure = indexmap::IndexMap::new();
                let mut field_vars = Vec::new();
                for (name, pat_id) in fields {
                    let var = self.table.new_var(vec![]);
                    let field_ty = Type::Variable { var, constraints: vec![] };
                    structure.insert(name.clone(), RowField::Type(Box::new(field_ty.clone())));
                    field_vars.push((*pat_id, field_ty));
                }
                check_structural(&mut self.table, ty, &RowStructure { fields: structure }, Span::DUMMY)
                    .map_err(row_error_to_type_error)?;
                for (pat_id, field_ty) in field_vars {
                    self.bind_pattern(body, pat_id, &field_ty, shape)?;
                }
                Ok(())
            }
            Pattern::Constructor { name, args } => {
                let args = args.clone();
                self.bind_constructor_pattern(body, name.clone(), &args, ty, shape)
            }
        }
    }

    /// Like `bind_pattern`, but used for `match` arms where `ty` is the
    /// scrutinee's (already-known) type rather than a brand new variable --
    /// literal/constructor patterns additionally *check* compatibility.
    /// Match-bound variables never generalize: they're aliases into an
    /// already-evaluated scrutinee, not a `let`-bound value.
    fn bind_pattern_against(&mut self, body: &Body, pat: PatId, ty: &Type) -> Result<(), TypeError> {
        match body.pattern(pat) {
            Pattern::Number(_) => self.table.unify(ty, &Type::float()).map_err(unify_to_type_error),
            Pattern::String(_) => self.table.unify(ty, &Type::string()).map_err(unify_to_type_error),
            _ => self.bind_pattern(body, pat, ty, ValueShape::Application),
        }
    }

    fn bind_constructor_pattern(
        &mut self,
        body: &Body,
        name: Name,
        args: &[PatId],
        ty: &Type,
        shape: ValueShape,
    ) -> Result<(), TypeError> {
        let owner = self
            .adts
            .type_of_constructor(&name)
            .cloned()
            .ok_or_else(|| TypeError::UndefinedVariable { name: name.clone(), location: Span::DUMMY, hint: None })?;
        let info = self.adts.info(&owner).cloned().expect("registered constructor has a registered type");
        let variant = info
            .variants
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .expect("constructor belongs to its owning type's variant list");

        let type_args: Vec<Type> = info
            .type_params
            .iter()
            .map(|_| Type::Variable { var: self.table.new_var(vec![]), constraints: vec![] })
            .collect();
        let scrutinee_ty =
            if owner == "Bool" { Type::bool() } else { Type::Variant { name: owner.clone(), args: type_args.clone() } };
        self.table.unify(ty, &scrutinee_ty).map_err(unify_to_type_error)?;

        if args.len() != variant.fields.len() {
            return Err(TypeError::ArityMismatch {
                expected: variant.fields.len(),
                got: args.len(),
                context: format!("pattern `{name}`"),
                location: Span::DUMMY,
            });
        }
        let mut vars = FxHashMap::default();
        for (pat_id, field_ref) in args.iter().zip(variant.fields.iter()) {
            let field_ty = self.lower_type_ref_with_params(field_ref, &info.type_params, &type_args, &mut vars);
            self.bind_pattern(body, *pat_id, &field_ty, shape)?;
        }
        Ok(())
    }

    /// `@field` / `@field?` (spec §4.4): `∀α β. α has {@field: β} ⇒ α → β`,
    /// or `α → Option β` for the optional form. Cached per field name since
    /// the scheme is identical on every use up to fresh variables.
    fn accessor_type(&mut self, field: &Name, optional: bool) -> Type {
        let key: Name = if optional { format!("{field}?").into() } else { field.clone() };
        if let Some(scheme) = self.accessor_cache.get(&key).cloned() {
            return instantiate(&scheme, &mut self.table);
        }
        let field_var = self.table.new_var(vec![]);
        let has_field = Constraint::HasStructure {
            type_var: "t".into(),
            structure: RowStructure::single(field.clone(), Type::Variable { var: field_var, constraints: vec![] }),
        };
        // Registered directly on the table at creation (not just attached to
        // the `Type::Variable` literal below) so `instantiate` picks it up
        // via `constraints_of` on every fresh use of this accessor.
        let record_var = self.table.new_var(vec![has_field.clone()]);
        let record_ty = Type::Variable { var: record_var, constraints: vec![has_field] };
        let ret = if optional {
            Type::Variant { name: "Option".into(), args: vec![Type::Variable { var: field_var, constraints: vec![] }] }
        } else {
            Type::Variable { var: field_var, constraints: vec![] }
        };
        let ty = Type::function(vec![record_ty], ret);
        let scheme = generalize(&ty, &self.env, &mut self.table, ValueShape::SyntacticValue);
        self.accessor_cache.insert(key, scheme.clone());
        instantiate(&scheme, &mut self.table)
    }

    /// Lowers a surface annotation (spec §4.4's "type annotation" rule):
    /// every lowercase name occurring more than once within the same
    /// annotation (e.g. `a` in both a param position and a `given` clause)
    /// refers to the same fresh variable, tracked in `vars` for the
    /// duration of this one lowering.
    fn lower_type_ref(&mut self, ty: &TypeRef) -> Type {
        let mut vars = FxHashMap::default();
        self.lower_type_ref_with_params(ty, &[], &[], &mut vars)
    }

    fn lower_type_ref_with_params(
        &mut self,
        ty: &TypeRef,
        params: &[Name],
        args: &[Type],
        vars: &mut FxHashMap<Name, crate::subst::TypeVar>,
    ) -> Type {
        match ty {
            TypeRef::Named(name) => {
                if let Some(pos) = params.iter().position(|p| p == name) {
                    return args[pos].clone();
                }
                match name.as_str() {
                    "Float" => Type::float(),
                    "String" => Type::string(),
                    "Bool" => Type::bool(),
                    lower if lower.chars().next().map(|c| c.is_lowercase()).unwrap_or(false) => {
                        let var = *vars.entry(name.clone()).or_insert_with(|| self.table.new_var(vec![]));
                        Type::Variable { var, constraints: vec![] }
                    }
                    upper => Type::Variant { name: upper.into(), args: vec![] },
                }
            }
            TypeRef::Unit => Type::Unit,
            TypeRef::Function { params: p, ret, effects } => Type::Function {
                params: p.iter().map(|t| self.lower_type_ref_with_params(t, params, args, vars)).collect(),
                ret: Box::new(self.lower_type_ref_with_params(ret, params, args, vars)),
                effects: effects.iter().filter_map(|e| parse_effect(e)).collect(),
                constraints: vec![],
            },
            TypeRef::List(elem) => Type::List(Box::new(self.lower_type_ref_with_params(elem, params, args, vars))),
            TypeRef::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|t| self.lower_type_ref_with_params(t, params, args, vars)).collect())
            }
            TypeRef::Record(fields) => Type::Record(
                fields.iter().map(|(k, v)| (k.clone(), self.lower_type_ref_with_params(v, params, args, vars))).collect(),
            ),
            TypeRef::Variant { name, args: targs } => Type::Variant {
                name: name.clone(),
                args: targs.iter().map(|t| self.lower_type_ref_with_params(t, params, args, vars)).collect(),
            },
            TypeRef::Constrained { base, constraints } => {
                let base_ty = self.lower_type_ref_with_params(base, params, args, vars);
                for c in constraints {
                    self.attach_constraint_ref(c, vars);
                }
                base_ty
            }
        }
    }

    /// Attaches a `given` clause's constraint directly onto the
    /// `InferenceTable` root for the variable it names. The variable must
    /// already have been introduced by lowering the base type -- an
    /// annotation that constrains a name it never otherwise mentions is a
    /// malformed annotation the lowerer doesn't try to repair.
    fn attach_constraint_ref(&mut self, c: &ConstraintRef, vars: &FxHashMap<Name, crate::subst::TypeVar>) {
        let (name, constraint) = match c {
            ConstraintRef::Implements { var, trait_name } => {
                (var, Constraint::Implements { type_var: var.clone(), interface_name: trait_name.clone() })
            }
            ConstraintRef::Has { var, fields } => {
                let structure = self.lower_row_fields(fields);
                (var, Constraint::HasStructure { type_var: var.clone(), structure })
            }
        };
        if let Some(&var) = vars.get(name) {
            self.table.add_constraint(var, constraint);
        }
    }

    /// Lowers an `implement Trait T given a implements U (...)`-style clause
    /// standing on its own (not nested inside an annotation, so there is no
    /// shared `vars` map to consult).
    fn lower_constraint_ref(&mut self, c: &ConstraintRef) -> Constraint {
        match c {
            ConstraintRef::Implements { var, trait_name } => {
                Constraint::Implements { type_var: var.clone(), interface_name: trait_name.clone() }
            }
            ConstraintRef::Has { var, fields } => {
                Constraint::HasStructure { type_var: var.clone(), structure: self.lower_row_fields(fields) }
            }
        }
    }

    fn lower_row_fields(&mut self, fields: &std::collections::BTreeMap<Name, RowFieldRef>) -> RowStructure {
        let mut out = indexmap::IndexMap::new();
        for (name, field) in fields {
            let value = match field {
                RowFieldRef::Type(t) => RowField::Type(Box::new(self.lower_type_ref(t))),
                RowFieldRef::Nested(nested) => RowField::Nested(self.lower_row_fields(nested)),
            };
            out.insert(name.clone(), value);
        }
        RowStructure { fields: out }
    }
}

impl Default for Inferencer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_effect(name: &str) -> Option<Effect> {
    match name {
        "read" => Some(Effect::Read),
        "write" => Some(Effect::Write),
        "state" => Some(Effect::State),
        "rand" => Some(Effect::Rand),
        "log" => Some(Effect::Log),
        "err" => Some(Effect::Err),
        _ => None,
    }
}

/// `true` when `op` on `ty` is one of the primitive fast paths `eval_arith`
/// takes at runtime without ever consulting the trait registry: any
/// arithmetic op on `Float`, or `+` on `String` (concatenation).
fn op_has_primitive_fast_path(op: BinaryOp, ty: &Type) -> bool {
    ty == &Type::float() || (op == BinaryOp::Add && ty == &Type::string())
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

fn rename_param(ty: &Type, _param: &Name, var: crate::subst::TypeVar) -> Type {
    // The trait's declared signature already uses the single quantified
    // type parameter uniformly; since this port represents that parameter
    // as a structural placeholder rather than a named AST variable, we
    // freshen by replacing every bare `Type::Variable` with no prior
    // binding (the signature's own placeholder) with `var`. Signatures are
    // authored with exactly one free variable by construction (`lower
    // fn sig` always lowercases the trait's type parameter into a fresh
    // variable at registration time and records it); to keep this simple
    // we just substitute the *first* variable encountered.
    substitute_first_var(ty, var, &mut false)
}

fn substitute_first_var(ty: &Type, var: crate::subst::TypeVar, done: &mut bool) -> Type {
    if *done {
        return ty.clone();
    }
    match ty {
        Type::Variable { .. } => {
            *done = true;
            Type::Variable { var, constraints: vec![] }
        }
        Type::Function { params, ret, effects, constraints } => Type::Function {
            params: params.iter().map(|p| substitute_first_var(p, var, done)).collect(),
            ret: Box::new(substitute_first_var(ret, var, done)),
            effects: effects.clone(),
            constraints: constraints.clone(),
        },
        Type::List(elem) => Type::List(Box::new(substitute_first_var(elem, var, done))),
        Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| substitute_first_var(e, var, done)).collect()),
        Type::Record(fields) => {
            Type::Record(fields.iter().map(|(k, v)| (k.clone(), substitute_first_var(v, var, done))).collect())
        }
        Type::Variant { name, args } => {
            Type::Variant { name: name.clone(), args: args.iter().map(|a| substitute_first_var(a, var, done)).collect() }
        }
        other => other.clone(),
    }
}

fn unify_to_type_error(e: crate::subst::UnifyError) -> TypeError {
    match e {
        crate::subst::UnifyError::OccursCheck { var, in_ty } => {
            TypeError::OccursCheck { var: var.into(), in_ty, location: Span::DUMMY }
        }
        crate::subst::UnifyError::Mismatch { expected, got } => {
            TypeError::TypeMismatch { expected, got, location: Span::DUMMY, hint: None }
        }
    }
}

fn row_error_to_type_error(e: crate::resolve::RowError) -> TypeError {
    match e {
        crate::resolve::RowError::NotARecord { got } => {
            TypeError::TypeMismatch { expected: "{record}".into(), got, location: Span::DUMMY, hint: None }
        }
        crate::resolve::RowError::MissingField { field, location } => {
            TypeError::RowMissingField { record: "{record}".into(), field, location }
        }
    }
}

fn register_error_to_type_error(trait_name: &str, e: crate::traits::RegisterError) -> TypeError {
    match e {
        crate::traits::RegisterError::UnknownTrait => TypeError::UndefinedVariable {
            name: trait_name.into(),
            location: Span::DUMMY,
            hint: Some("trait is not defined".into()),
        },
        crate::traits::RegisterError::UnknownFunction { function } => TypeError::ArityMismatch {
            expected: 0,
            got: 0,
            context: format!("`{function}` is not declared by trait `{trait_name}`"),
            location: Span::DUMMY,
        },
        crate::traits::RegisterError::ArityMismatch { function, expected, got } => TypeError::ArityMismatch {
            expected,
            got,
            context: format!("implementation of `{trait_name}.{function}`"),
            location: Span::DUMMY,
        },
        crate::traits::RegisterError::DuplicateImplementation { type_name } => TypeError::AmbiguousImplementation {
            function: "<all>".into(),
            type_name,
            traits: vec![trait_name.into()],
        },
    }
}

fn body_mentions(body: &Body, name: &str) -> bool {
    match body.root {
        Some(root) => expr_mentions(body, root, name),
        None => false,
    }
}

fn expr_mentions(body: &Body, id: ExprId, name: &str) -> bool {
    match body.expr(id) {
        Expr::Var(n) => n == name,
        Expr::Lambda { body: b, .. } => expr_mentions(body, *b, name),
        Expr::App { func, args } => {
            expr_mentions(body, *func, name) || args.iter().any(|a| expr_mentions(body, *a, name))
        }
        Expr::If { cond, then_branch, else_branch } => {
            expr_mentions(body, *cond, name) || expr_mentions(body, *then_branch, name) || expr_mentions(body, *else_branch, name)
        }
        Expr::Match { scrutinee, arms } => {
            expr_mentions(body, *scrutinee, name) || arms.iter().any(|(_, e)| expr_mentions(body, *e, name))
        }
        Expr::Record(fields) => fields.iter().any(|(_, e)| expr_mentions(body, *e, name)),
        Expr::Tuple(elems) | Expr::List(elems) => elems.iter().any(|e| expr_mentions(body, *e, name)),
        Expr::Binary { lhs, rhs, .. } => expr_mentions(body, *lhs, name) || expr_mentions(body, *rhs, name),
        Expr::Seq { first, rest } => expr_mentions(body, *first, name) || expr_mentions(body, *rest, name),
        Expr::Let { value, body: rest, .. } => expr_mentions(body, *value, name) || expr_mentions(body, *rest, name),
        Expr::Where { body: inner, bindings } => {
            expr_mentions(body, *inner, name) || bindings.iter().any(|(_, e)| expr_mentions(body, *e, name))
        }
        Expr::Annotate { expr, .. } => expr_mentions(body, *expr, name),
        Expr::Mut { init, body: rest, .. } => expr_mentions(body, *init, name) || expr_mentions(body, *rest, name),
        Expr::MutSet { value, body: rest, .. } => expr_mentions(body, *value, name) || expr_mentions(body, *rest, name),
        Expr::Number(_) | Expr::StringLit(_) | Expr::Unit | Expr::Accessor { .. } | Expr::Import { .. } => false,
    }
}

fn expr_shape(body: &Body) -> ValueShape {
    match body.root {
        Some(root) => expr_shape_of(body, root),
        None => ValueShape::SyntacticValue,
    }
}

/// Per spec §4.3's value restriction: only a syntactic value generalizes.
/// `let`/`where` bindings and top-level definitions need this computed per
/// bound expression, not just at a body's root.
fn expr_shape_of(body: &Body, id: ExprId) -> ValueShape {
    match body.expr(id) {
        Expr::App { .. } => ValueShape::Application,
        _ => ValueShape::SyntacticValue,
    }
}

fn variant_is_recursive(def: &TypeDef) -> bool {
    def.variants.iter().any(|v| v.fields.iter().any(|f| type_ref_mentions(f, &def.name)))
}

fn type_ref_mentions(ty: &TypeRef, name: &str) -> bool {
    match ty {
        TypeRef::Named(n) => n == name,
        TypeRef::Variant { name: n, args } => n == name || args.iter().any(|a| type_ref_mentions(a, name)),
        TypeRef::List(elem) => type_ref_mentions(elem, name),
        TypeRef::Tuple(elems) => elems.iter().any(|e| type_ref_mentions(e, name)),
        TypeRef::Function { params, ret, .. } => {
            params.iter().any(|p| type_ref_mentions(p, name)) || type_ref_mentions(ret, name)
        }
        TypeRef::Record(fields) => fields.values().any(|v| type_ref_mentions(v, name)),
        TypeRef::Constrained { base, .. } => type_ref_mentions(base, name),
        TypeRef::Unit => false,
    }
}
