//! Standard-library loading contract (spec §6.2). Lexing, parsing, and file
//! I/O for `stdlib.noo` itself live outside the core (spec §1); this crate
//! defines the narrow seam a host embeds to supply stdlib source text
//! (`StdlibSource`) plus the `loaded()` helper that wires locate -> parse ->
//! evaluate together exactly once per evaluator (spec §5).

use std::fmt;
use std::path::PathBuf;

use noo_ast::Program;
use noo_eval::{Env, Evaluator, RuntimeError};
use thiserror::Error;
use tracing::{instrument, trace};

#[derive(Debug, Error)]
pub enum StdlibError {
    #[error("stdlib source was not found in any of the provided search paths")]
    NotFound,
    #[error("failed to read stdlib source from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse stdlib source: {0}")]
    Parse(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A host-supplied way to find `stdlib.noo`'s source text. Kept separate
/// from parsing and evaluation so an embedder with a different packaging
/// story -- source compiled into the binary, a virtual filesystem, a
/// network fetch -- only has to implement this one method.
pub trait StdlibSource {
    fn locate(&self, search_paths: &[PathBuf]) -> Result<String, StdlibError>;
}

/// Reads a fixed file name off the first directory in `search_paths` that
/// has it. This is the contract's obvious default; hosts with a different
/// stdlib packaging story implement `StdlibSource` directly instead.
pub struct FsStdlibSource {
    pub file_name: String,
}

impl Default for FsStdlibSource {
    fn default() -> Self {
        FsStdlibSource { file_name: "stdlib.noo".to_string() }
    }
}

impl StdlibSource for FsStdlibSource {
    fn locate(&self, search_paths: &[PathBuf]) -> Result<String, StdlibError> {
        for dir in search_paths {
            let candidate = dir.join(&self.file_name);
            match std::fs::read_to_string(&candidate) {
                Ok(src) => {
                    trace!(path = %candidate.display(), "located stdlib source");
                    return Ok(src);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StdlibError::Io { path: candidate, source: e }),
            }
        }
        Err(StdlibError::NotFound)
    }
}

/// Locates, parses, and evaluates the stdlib source into `env` exactly once
/// (spec §5: "stdlib loading happens exactly once per evaluator and must be
/// deterministic"). `parse` is injected because lexing/parsing has no home
/// in this core (spec §1) -- callers plug in whatever front end turns source
/// text into a `noo_ast::Program`.
#[instrument(skip(source, search_paths, parse, evaluator, env))]
pub fn loaded<S, P, E>(
    source: &S,
    search_paths: &[PathBuf],
    parse: P,
    evaluator: &mut Evaluator,
    env: &Env,
) -> Result<(), StdlibError>
where
    S: StdlibSource,
    P: FnOnce(&str) -> Result<Program, E>,
    E: fmt::Display,
{
    let text = source.locate(search_paths)?;
    let program = parse(&text).map_err(|e| StdlibError::Parse(e.to_string()))?;
    evaluator.eval_program(&program, env)?;
    trace!(definitions = program.definitions.len(), "stdlib evaluated");
    Ok(())
}

#[cfg(test)]
mod tests;
