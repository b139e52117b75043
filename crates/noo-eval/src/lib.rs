//! Runtime values and the tree-walking evaluator for Noolang (spec §4.6,
//! §4.7). Sits downstream of `noo-ty`: a program is expected to have already
//! passed `Inferencer::infer_program` before `Evaluator::eval_program` runs,
//! and the evaluator reuses the same `noo_ty::TraitRegistry` the inferencer
//! built rather than re-deriving one from the AST (spec §5: the registry is
//! read-only once inference completes).

pub mod dispatch;
pub mod env;
pub mod error;
pub mod eval;
pub mod value;

pub use env::Env;
pub use error::RuntimeError;
pub use eval::{EvalConfig, Evaluator};
pub use value::{value_type_name, Closure, NativeFn, Value};
