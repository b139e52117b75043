//! Type representation, substitution, trait registry, and the inferencer
//! for Noolang: a Hindley-Milner core extended with row-polymorphic records
//! and nominal traits (see each submodule's header for the relevant spec
//! section).
//!
//! This mirrors `ra_hir_ty`'s own shape: one crate per HIR-adjacent concern
//! rather than a crate per algorithm, since the type representation,
//! substitution, and inferencer are too tightly coupled to benefit from a
//! crate boundary between them.

pub mod display;
pub mod error;
pub mod infer;
pub mod resolve;
pub mod scheme;
pub mod subst;
pub mod traits;
pub mod ty;

pub use display::HirDisplay;
pub use error::TypeError;
pub use infer::{ImportResolver, Inferencer, NoImports, TypeResult};
pub use scheme::{generalize, instantiate, TypeEnvironment, TypeScheme};
pub use subst::{InferenceTable, TypeVar, UnifyError};
pub use traits::{dispatch_candidates_from_names, Resolution, TraitDefinition, TraitImplementation, TraitRegistry};
pub use ty::{Constraint, Primitive, RowField, RowStructure, Type};

#[cfg(test)]
mod tests;
