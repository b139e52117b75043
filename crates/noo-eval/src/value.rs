//! Runtime values (spec §3.5). Compound fields are `Rc`-wrapped the way
//! `noo-ty::Type` is kept cheap to clone, since the same closure/record/list
//! value gets shared across environment frames constantly during a
//! tree-walk -- cloning a `Value` should never deep-copy the data it closes
//! over.

use indexmap::IndexMap;
use noo_ast::expr::{Body, ExprId};
use noo_ast::pattern::PatId;
use noo_ast::Name;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::env::Env;
use crate::error::RuntimeError;

#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(SmolStr),
    Unit,
    List(Rc<Vec<Value>>),
    Tuple(Rc<Vec<Value>>),
    Record(Rc<IndexMap<Name, Value>>),
    /// A user-defined closure. `arena` is the `Body` the closure's
    /// `params`/`body` indices live in -- shared (not cloned) across every
    /// value produced while evaluating that one top-level definition.
    Function(Rc<Closure>),
    Native(Rc<NativeFn>),
    /// ADT data, including `True`/`False`, `Some x`/`None`, `Ok x`/`Err y`.
    Constructor { name: Name, args: Rc<Vec<Value>> },
    /// A deferred trait call accumulating arguments until runtime dispatch
    /// can resolve it (spec §4.7).
    TraitFunction { name: Name, partial_args: Rc<Vec<Value>> },
    /// Mutation slot for `mut`/`mut!` and fix-point binding of recursive
    /// definitions (spec §3.5, §9).
    Cell(Rc<RefCell<Value>>),
}

pub struct Closure {
    pub params: Vec<PatId>,
    pub body_id: ExprId,
    pub arena: Rc<Body>,
    pub env: Env,
}

/// A host-provided (or constructor-synthesized, see `crate::eval`) function.
/// Currying is handled the same way as user closures: applying one short of
/// `arity` clones the accumulated args into a new `NativeFn` rather than
/// calling `func` early. `func` is threaded an `&mut Evaluator` so a
/// higher-order native (a list `map`, say) can call back into `apply` on a
/// function value it was handed, the same way a user-level `fn` would.
pub struct NativeFn {
    pub name: Name,
    pub arity: usize,
    pub collected: Vec<Value>,
    pub func: Rc<dyn Fn(&mut crate::eval::Evaluator, &[Value]) -> Result<Value, RuntimeError>>,
}

impl Value {
    pub fn bool(b: bool) -> Value {
        Value::Constructor { name: if b { "True".into() } else { "False".into() }, args: Rc::new(Vec::new()) }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Constructor { name, args } if args.is_empty() && name == "True" => Some(true),
            Value::Constructor { name, args } if args.is_empty() && name == "False" => Some(false),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&SmolStr> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn some(v: Value) -> Value {
        Value::Constructor { name: "Some".into(), args: Rc::new(vec![v]) }
    }

    pub fn none() -> Value {
        Value::Constructor { name: "None".into(), args: Rc::new(Vec::new()) }
    }

    /// Collapses a (possibly nested) `Cell` down to the value it currently
    /// holds. Every consumption site -- application, pattern matching,
    /// binary operators -- forces its operands first, so a name bound
    /// through `mut`/recursive `let` is transparent everywhere except the
    /// `mut!` site that reassigns it.
    pub fn force(&self) -> Value {
        match self {
            Value::Cell(c) => c.borrow().force(),
            other => other.clone(),
        }
    }

    /// Structural equality, used by `==`/`!=` (spec §9's open question:
    /// universal, not trait-dispatched).
    pub fn structurally_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.structurally_eq(w)))
            }
            (Value::Constructor { name: n1, args: a1 }, Value::Constructor { name: n2, args: a2 }) => {
                n1 == n2 && a1.len() == a2.len() && a1.iter().zip(a2.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (Value::Cell(a), Value::Cell(b)) => a.borrow().structurally_eq(&b.borrow()),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Unit => write!(f, "Unit"),
            Value::List(xs) => write!(f, "{:?}", xs),
            Value::Tuple(xs) => write!(f, "({:?})", xs),
            Value::Record(fields) => write!(f, "{:?}", fields),
            Value::Function(_) => write!(f, "<function>"),
            Value::Native(n) => write!(f, "<native {}>", n.name),
            Value::Constructor { name, args } if args.is_empty() => write!(f, "{name}"),
            Value::Constructor { name, args } => write!(f, "{name} {:?}", args),
            Value::TraitFunction { name, partial_args } => write!(f, "<trait-function {name} /{}>", partial_args.len()),
            Value::Cell(c) => write!(f, "Cell({:?})", c.borrow()),
        }
    }
}

/// `getValueTypeName` (spec §4.2/§4.7): concrete mapping of runtime tags to
/// the names the trait registry indexes implementations by, mirroring
/// `noo_ty::dispatch_type_name`'s mapping from the static side.
pub fn value_type_name(v: &Value) -> Option<Name> {
    match v {
        Value::Number(_) => Some("Float".into()),
        Value::String(_) => Some("String".into()),
        Value::Unit => None,
        Value::List(_) => Some("List".into()),
        Value::Tuple(_) => Some("Tuple".into()),
        Value::Record(_) => Some("Record".into()),
        Value::Function(_) | Value::Native(_) => Some("Function".into()),
        // `True`/`False` dispatch as `Bool`, matching `noo_ty::dispatch_type_name`
        // treating `Type::Primitive(Bool)` (not a `Variant`) as the static type
        // of these two constructors.
        Value::Constructor { name, args } if args.is_empty() && (name == "True" || name == "False") => {
            Some("Bool".into())
        }
        Value::Constructor { name, .. } => Some(name.clone()),
        Value::TraitFunction { .. } => None,
        Value::Cell(c) => value_type_name(&c.borrow()),
    }
}
