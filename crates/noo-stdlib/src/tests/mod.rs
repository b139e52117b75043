use std::fmt;
use std::path::PathBuf;

use noo_ast::expr::{Body, Expr};
use noo_ast::item::{Definition, Program, ValueDef};
use noo_eval::{Env, EvalConfig, Evaluator};
use noo_ty::TraitRegistry;

use crate::{loaded, FsStdlibSource, StdlibError, StdlibSource};

#[derive(Debug)]
struct NoParseError;

impl fmt::Display for NoParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no parse error")
    }
}

/// A `StdlibSource` that never touches the filesystem -- handed a fixed
/// string, it behaves as if that string were the contents of a located file.
struct FixedSource(&'static str);

impl StdlibSource for FixedSource {
    fn locate(&self, _search_paths: &[PathBuf]) -> Result<String, StdlibError> {
        Ok(self.0.to_string())
    }
}

fn answer_program() -> Program {
    let mut body = Body::default();
    let lit = body.alloc_expr(Expr::Number(42.0));
    body.root = Some(lit);
    Program { definitions: vec![Definition::Value(ValueDef { name: "answer".into(), body, annotation: None })] }
}

fn evaluator() -> Evaluator {
    Evaluator::new(TraitRegistry::new(), EvalConfig::default())
}

#[test]
fn loaded_evaluates_parsed_stdlib_source_into_env() {
    let source = FixedSource("answer = 42");
    let env = Env::root();
    let mut evalr = evaluator();
    let result = loaded(&source, &[], |_text| Ok::<_, NoParseError>(answer_program()), &mut evalr, &env);
    assert!(result.is_ok());
    assert_eq!(env.get("answer").unwrap().as_number(), Some(42.0));
}

#[test]
fn loaded_surfaces_a_parse_failure() {
    let source = FixedSource("not valid noolang, supposedly");
    let env = Env::root();
    let mut evalr = evaluator();
    let result = loaded(&source, &[], |_text| Err::<Program, _>(NoParseError), &mut evalr, &env);
    assert!(matches!(result, Err(StdlibError::Parse(_))));
}

#[test]
fn loaded_propagates_locate_failure() {
    struct NeverFound;
    impl StdlibSource for NeverFound {
        fn locate(&self, _search_paths: &[PathBuf]) -> Result<String, StdlibError> {
            Err(StdlibError::NotFound)
        }
    }
    let env = Env::root();
    let mut evalr = evaluator();
    let result = loaded(&NeverFound, &[], |_text| Ok::<_, NoParseError>(Program::default()), &mut evalr, &env);
    assert!(matches!(result, Err(StdlibError::NotFound)));
}

#[test]
fn fs_stdlib_source_reads_the_first_matching_directory() {
    let dir = std::env::temp_dir().join(format!("noo-stdlib-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("stdlib.noo");
    std::fs::write(&file, "identity = fn x => x").unwrap();

    let source = FsStdlibSource::default();
    let found = source.locate(&[dir.clone()]).unwrap();
    assert_eq!(found, "identity = fn x => x");

    std::fs::remove_file(&file).unwrap();
    std::fs::remove_dir(&dir).unwrap();
}

#[test]
fn fs_stdlib_source_reports_not_found_across_every_search_path() {
    let source = FsStdlibSource::default();
    let missing = PathBuf::from("/this/path/does/not/exist/noo-stdlib-test");
    let result = source.locate(&[missing]);
    assert!(matches!(result, Err(StdlibError::NotFound)));
}
