//! Facade tying the pipeline together (SPEC_FULL.md §2): type-check a
//! program with `noo-ty`, hand its now-complete trait registry to a fresh
//! `noo-eval::Evaluator`, and run it. Downstream consumers (CLI, REPL, LSP,
//! formatter) are expected to sit on top of this crate; none of that lives
//! here.

use std::path::PathBuf;

use noo_ast::Program;
use noo_eval::{Env, EvalConfig, Evaluator, RuntimeError};
use noo_stdlib::{StdlibError, StdlibSource};
use noo_ty::{ImportResolver, Inferencer, NoImports, TypeError};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Stdlib(#[from] StdlibError),
}

/// One inference session, possibly spanning several `Program`s (stdlib
/// followed by user code) that share the same type environment and trait
/// registry. Call `into_evaluator` once type-checking is done for every
/// program that will run in the resulting `Evaluator` -- the registry it
/// holds is read-only from that point on (spec §5).
pub struct Pipeline {
    inferencer: Inferencer,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { inferencer: Inferencer::new() }
    }

    /// Type-checks `program` against whatever has already been inferred in
    /// this session, with no import resolution available.
    pub fn infer_program(&mut self, program: &Program) -> Result<(), PipelineError> {
        self.infer_program_with_imports(program, &mut NoImports)
    }

    pub fn infer_program_with_imports(
        &mut self,
        program: &Program,
        imports: &mut dyn ImportResolver,
    ) -> Result<(), PipelineError> {
        self.inferencer.infer_program(program, imports).map_err(PipelineError::Type)
    }

    /// Consumes the session, handing its now-complete trait registry to a
    /// fresh evaluator. No further calls to `infer_program` are possible
    /// after this -- the whole point is that the registry stops changing.
    pub fn into_evaluator(self, config: EvalConfig) -> Evaluator {
        Evaluator::new(self.inferencer.traits, config)
    }
}

/// One-shot convenience for the common case: type-check `program`, then
/// evaluate it into `env` with a fresh evaluator. For a session that loads a
/// stdlib first, build a `Pipeline` directly instead (see `load_stdlib`).
#[instrument(skip(program, env))]
pub fn infer_and_eval(program: &Program, env: &Env, config: EvalConfig) -> Result<Evaluator, PipelineError> {
    let mut pipeline = Pipeline::new();
    pipeline.infer_program(program)?;
    let mut evaluator = pipeline.into_evaluator(config);
    evaluator.eval_program(program, env)?;
    Ok(evaluator)
}

/// Locates and parses stdlib source via `source`/`parse`, type-checks it
/// through `pipeline`, and returns the parsed program. `noo_stdlib::loaded`
/// covers locate-parse-evaluate for a host that only needs the evaluator
/// side; this widens the same contract with the inference step a stdlib
/// definition needs before its functions can be called from type-checked
/// user code. The caller evaluates the returned program itself, once
/// `pipeline` has finished type-checking everything that will share its
/// evaluator (spec §5: stdlib loading runs exactly once per evaluator).
pub fn load_stdlib<S, P, E>(
    pipeline: &mut Pipeline,
    source: &S,
    search_paths: &[PathBuf],
    parse: P,
) -> Result<Program, PipelineError>
where
    S: StdlibSource,
    P: FnOnce(&str) -> Result<Program, E>,
    E: std::fmt::Display,
{
    let text = source.locate(search_paths)?;
    let program = parse(&text).map_err(|e| StdlibError::Parse(e.to_string()))?;
    pipeline.infer_program(&program)?;
    Ok(program)
}

#[cfg(test)]
mod tests;
