//! Pretty-printing, including the "Greek-letter renaming for readability"
//! spec §7 asks for in error messages. Renaming only ever happens here, at
//! render time -- never while solving, so it can't perturb unification.

use crate::ty::{Primitive, Type};
use std::collections::HashMap;
use std::fmt::Write;

const GREEK: [&str; 12] =
    ["α", "β", "γ", "δ", "ε", "ζ", "η", "θ", "ι", "κ", "λ", "μ"];

pub trait HirDisplay {
    fn display_string(&self) -> String;
}

impl HirDisplay for Type {
    fn display_string(&self) -> String {
        let mut renamer = HashMap::new();
        let mut out = String::new();
        write_ty(self, &mut out, &mut renamer);
        out
    }
}

/// A non-normalized, structural `Debug`-ish rendering, used internally for
/// error payloads where a stable (not renamed) form is more useful, e.g.
/// matching in tests.
pub fn debug_string(ty: &Type) -> String {
    format!("{ty:?}")
}

fn greek_for(id: u32, renamer: &mut HashMap<u32, String>) -> String {
    renamer
        .entry(id)
        .or_insert_with(|| {
            let base = GREEK[(id as usize) % GREEK.len()];
            let round = id as usize / GREEK.len();
            if round == 0 {
                base.to_string()
            } else {
                format!("{base}{round}")
            }
        })
        .clone()
}

fn write_ty(ty: &Type, out: &mut String, renamer: &mut HashMap<u32, String>) {
    match ty {
        Type::Primitive(Primitive::Float) => out.push_str("Float"),
        Type::Primitive(Primitive::String) => out.push_str("String"),
        Type::Primitive(Primitive::Bool) => out.push_str("Bool"),
        Type::Unit => out.push_str("Unit"),
        Type::Unknown => out.push_str("Unknown"),
        Type::Variable { var, .. } => {
            let _ = write!(out, "{}", greek_for(var.0, renamer));
        }
        Type::Function { params, ret, effects, .. } => {
            out.push('(');
            for (i, p) in params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ty(p, out, renamer);
            }
            out.push_str(") -> ");
            write_ty(ret, out, renamer);
            if !effects.is_empty() {
                out.push_str(" <");
                let names: Vec<_> = effects.iter().map(|e| e.as_str()).collect();
                out.push_str(&names.join(","));
                out.push('>');
            }
        }
        Type::List(elem) => {
            out.push_str("List ");
            write_ty(elem, out, renamer);
        }
        Type::Tuple(elems) => {
            out.push('{');
            for (i, e) in elems.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ty(e, out, renamer);
            }
            out.push('}');
        }
        Type::Record(fields) => {
            out.push('{');
            for (i, (k, v)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "@{k} ");
                write_ty(v, out, renamer);
            }
            out.push('}');
        }
        Type::Variant { name, args } => {
            out.push_str(name);
            for a in args {
                out.push(' ');
                write_ty(a, out, renamer);
            }
        }
        Type::Union(types) => {
            for (i, t) in types.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                write_ty(t, out, renamer);
            }
        }
        Type::Constrained { base, .. } => write_ty(base, out, renamer),
    }
}
