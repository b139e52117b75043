//! The evaluator's environment (spec §4.6): "a mapping from names to
//! `Value | Cell`. A per-call frame is pushed/popped around function
//! application, `match`, and `where` clauses." Each frame is a cheaply
//! shared, singly-linked node (`Rc`-chained) rather than a cloned map --
//! pushing a frame is `O(1)`, and a closure can capture its defining frame by
//! cloning the `Rc` instead of snapshotting the whole environment.
//!
//! Bindings live behind a `RefCell` rather than requiring unique ownership of
//! the frame: a closure created from one binding in a `where`/recursive-`let`
//! frame keeps its own `Rc` clone of that frame alive, and a sibling binding
//! still needs to be added to the *same* frame afterwards.

use noo_ast::Name;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

struct Frame {
    bindings: RefCell<FxHashMap<Name, Value>>,
    parent: Option<Env>,
}

#[derive(Clone)]
pub struct Env(Rc<Frame>);

impl Env {
    pub fn root() -> Env {
        Env(Rc::new(Frame { bindings: RefCell::new(FxHashMap::default()), parent: None }))
    }

    /// Pushes a new, empty frame on top of `self`.
    pub fn child(&self) -> Env {
        Env(Rc::new(Frame { bindings: RefCell::new(FxHashMap::default()), parent: Some(self.clone()) }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(v) = frame.0.bindings.borrow().get(name) {
                return Some(v.clone());
            }
            frame = frame.0.parent.as_ref()?;
        }
    }

    /// Binds `name` in *this* frame, shadowing any outer binding.
    pub fn define(&self, name: Name, value: Value) {
        self.0.bindings.borrow_mut().insert(name, value);
    }
}
