//! Home compiler library.
//!
//! Owns the pipeline: lex, parse, typecheck (with ownership analysis and
//! the comptime evaluator), codegen, and artifact emission (ELF or GNU-as
//! kernel text), fronted by a content-addressed cache. The three external
//! operations (`compile`, `check`, `build`) mirror the command surface;
//! `main.rs` is a thin `clap` shell around them.

pub mod ast;
pub mod builtins;
pub mod cache;
pub mod codegen;
pub mod comptime;
pub mod config;
pub mod diagnostics;
pub mod elf;
pub mod kernel;
pub mod lexer;
pub mod ownership;
pub mod parser;
pub mod resolver;
pub mod source;
pub mod typechecker;
pub mod types;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

pub use cache::{Cache, CacheError, CacheKeyInputs};
pub use config::{CompilerConfig, OptimizationLevel};
pub use diagnostics::{Diagnostic, Severity};

use lexer::Lexer;
use parser::Parser;
use resolver::transitive_import_hashes;
use source::SourceBuffer;
use typechecker::TypeChecker;

/// Compiler version baked into the cache key, so a rebuild of a newer
/// compiler never reuses an artifact from an older one.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fatal errors that abort a compilation before diagnostics can be
/// produced — exit code `2` in the CLI, per the external interface's
/// contract.
#[derive(Debug)]
pub enum CompileError {
    Io { path: PathBuf, message: String },
    Resolve(resolver::ResolveError),
    Cache(CacheError),
    CodeGen(codegen::CodeGenError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Io { path, message } => {
                write!(f, "failed to access {}: {}", path.display(), message)
            }
            CompileError::Resolve(e) => write!(f, "{}", e),
            CompileError::Cache(e) => write!(f, "{}", e),
            CompileError::CodeGen(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<resolver::ResolveError> for CompileError {
    fn from(e: resolver::ResolveError) -> Self {
        CompileError::Resolve(e)
    }
}

impl From<CacheError> for CompileError {
    fn from(e: CacheError) -> Self {
        CompileError::Cache(e)
    }
}

impl From<codegen::CodeGenError> for CompileError {
    fn from(e: codegen::CodeGenError) -> Self {
        CompileError::CodeGen(e)
    }
}

/// Outcome of a checking pass: either the program is free of lexical,
/// syntactic, semantic, and ownership errors, or a list of diagnostics
/// explains why, in source order.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub top_level_len: usize,
}

impl CheckOutcome {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// `compile(source_path) -> {AST|errors}`: lexer + parser only. The AST
/// itself is arena-bound and not handed back across this boundary (see
/// DESIGN.md); callers get the statement count and the full diagnostic
/// list, which is what `check`/`build` build on top of.
#[instrument(skip_all, fields(path = %source_path.display()))]
pub fn compile(source_path: &Path) -> Result<CheckOutcome, CompileError> {
    let text = read_source(source_path)?;
    let buf = SourceBuffer::new(source_path, text);
    let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
    let mut diagnostics: Vec<Diagnostic> = lex_errors.iter().map(Diagnostic::from).collect();

    let arena = bumpalo::Bump::new();
    let parser = Parser::new(&arena, tokens);
    let (program, parse_errors) = parser.parse_program(source_path.to_path_buf());
    diagnostics.extend(parse_errors.iter().map(Diagnostic::from));

    Ok(CheckOutcome {
        top_level_len: program.top_level.len(),
        diagnostics,
    })
}

/// `check(source_path) -> {ok|errors[]}`: lex + parse + type + ownership.
/// Per the propagation policy, typechecking is skipped when lexing or
/// parsing already produced a Lexical/Syntactic error — its output would
/// be unreliable against a malformed AST.
#[instrument(skip_all, fields(path = %source_path.display()))]
pub fn check(source_path: &Path) -> Result<CheckOutcome, CompileError> {
    let text = read_source(source_path)?;
    let buf = SourceBuffer::new(source_path, text);
    let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
    let mut diagnostics: Vec<Diagnostic> = lex_errors.iter().map(Diagnostic::from).collect();

    let arena = bumpalo::Bump::new();
    let parser = Parser::new(&arena, tokens);
    let (program, parse_errors) = parser.parse_program(source_path.to_path_buf());
    diagnostics.extend(parse_errors.iter().map(Diagnostic::from));

    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!("skipping type/ownership check after lexical or syntactic errors");
        return Ok(CheckOutcome {
            top_level_len: program.top_level.len(),
            diagnostics,
        });
    }

    let type_diagnostics = TypeChecker::new().check_program(&program);
    diagnostics.extend(type_diagnostics);

    Ok(CheckOutcome {
        top_level_len: program.top_level.len(),
        diagnostics,
    })
}

/// `build(source_path, out_path?, kernel) -> {ok|errors[]}`: the full
/// pipeline. Probes the cache first; on a miss, runs codegen and writes
/// either an ELF64 executable or GNU-as kernel text, then populates the
/// cache for next time.
#[instrument(skip_all, fields(path = %source_path.display(), kernel))]
pub fn build(
    source_path: &Path,
    out_path: &Path,
    kernel: bool,
    config: &CompilerConfig,
) -> Result<CheckOutcome, CompileError> {
    let text = read_source(source_path)?;
    let source_hash = cache::hash_source(text.as_bytes());

    let buf = SourceBuffer::new(source_path, text);
    let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
    let mut diagnostics: Vec<Diagnostic> = lex_errors.iter().map(Diagnostic::from).collect();

    let arena = bumpalo::Bump::new();
    let parser = Parser::new(&arena, tokens);
    let (program, parse_errors) = parser.parse_program(source_path.to_path_buf());
    diagnostics.extend(parse_errors.iter().map(Diagnostic::from));

    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!("skipping typecheck and codegen after lexical or syntactic errors");
        return Ok(CheckOutcome {
            top_level_len: program.top_level.len(),
            diagnostics,
        });
    }

    let type_diagnostics = TypeChecker::new().check_program(&program);
    diagnostics.extend(type_diagnostics);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Ok(CheckOutcome {
            top_level_len: program.top_level.len(),
            diagnostics,
        });
    }

    let source_dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    let import_specs: Vec<ast::ImportSpec> = program
        .top_level
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            ast::StmtKind::ImportDecl(decl) => Some(decl.spec.clone()),
            _ => None,
        })
        .collect();
    let import_hashes = transitive_import_hashes(source_dir, &import_specs)?;

    let key_inputs = CacheKeyInputs {
        source_hash,
        import_hashes,
        compiler_version: COMPILER_VERSION.to_string(),
        target: config.target.clone(),
    };
    let cache = Cache::new(config.cache_dir.clone());

    if let Some(artifact) = cache.get(&key_inputs)? {
        info!("cache hit, reusing artifact unchanged");
        write_artifact(out_path, &artifact, !kernel)?;
        return Ok(CheckOutcome {
            top_level_len: program.top_level.len(),
            diagnostics,
        });
    }

    let artifact = if kernel {
        kernel::render_assembly(&program)
            .map_err(CompileError::from)?
            .into_bytes()
    } else {
        codegen::generate_program(&program)?
    };

    write_artifact(out_path, &artifact, !kernel)?;
    cache.put(&key_inputs, &artifact)?;

    Ok(CheckOutcome {
        top_level_len: program.top_level.len(),
        diagnostics,
    })
}

fn read_source(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path).map_err(|e| CompileError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_artifact(path: &Path, bytes: &[u8], executable: bool) -> Result<(), CompileError> {
    if executable {
        elf::write_executable(path, bytes).map_err(|e| CompileError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        std::fs::write(path, bytes).map_err(|e| CompileError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reports_top_level_statement_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.home");
        std::fs::write(&path, "fn main() { return } fn helper() { return }").unwrap();
        let outcome = compile(&path).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(outcome.top_level_len, 2);
    }

    #[test]
    fn check_passes_for_s1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.home");
        std::fs::write(&path, "fn main() { let x = 2 + 3 * 4; return }").unwrap();
        let outcome = check(&path).unwrap();
        assert!(outcome.is_ok(), "unexpected diagnostics: {:?}", outcome.diagnostics);
    }

    #[test]
    fn check_reports_mut_borrow_while_borrowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.home");
        std::fs::write(
            &path,
            "fn main() { let mut a = 1; let b = &a; let c = &mut a; return }",
        )
        .unwrap();
        let outcome = check(&path).unwrap();
        assert!(!outcome.is_ok());
    }

    #[test]
    fn build_produces_executable_and_second_build_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.home");
        std::fs::write(&src, "fn main() { let x = 2 + 3 * 4; return }").unwrap();
        let out = dir.path().join("main");
        let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));

        let first = build(&src, &out, false, &config).unwrap();
        assert!(first.is_ok());
        let first_bytes = std::fs::read(&out).unwrap();

        let second = build(&src, &out, false, &config).unwrap();
        assert!(second.is_ok());
        let second_bytes = std::fs::read(&out).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn build_with_kernel_mode_emits_assembly_text() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.home");
        std::fs::write(&src, "fn main() { return }").unwrap();
        let out = dir.path().join("main.s");
        let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));

        let outcome = build(&src, &out, true, &config).unwrap();
        assert!(outcome.is_ok());
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with(".text"));
    }

    #[test]
    fn build_stops_before_codegen_on_type_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.home");
        std::fs::write(&src, "fn g() -> int { return \"hi\" }").unwrap();
        let out = dir.path().join("main");
        let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));

        let outcome = build(&src, &out, false, &config).unwrap();
        assert!(!outcome.is_ok());
        assert!(!out.exists());
    }
}
