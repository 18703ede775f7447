//! End-to-end scenarios exercising the full `compile`/`check`/`build`
//! pipeline against whole `.home` programs, rather than one pass at a
//! time as the per-module unit tests do.

use homec::{build, check, compile, CompilerConfig};

fn write_source(dir: &std::path::Path, name: &str, src: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, src).unwrap();
    path
}

/// S1: ordinary arithmetic plus a bare `return` builds clean through every
/// stage and produces an executable file.
#[test]
fn s1_arithmetic_and_return_builds_an_executable() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.home", "fn main() { let x = 2 + 3 * 4; return }");

    let checked = check(&src).unwrap();
    assert!(checked.is_ok(), "unexpected diagnostics: {:?}", checked.diagnostics);

    let out = dir.path().join("main");
    let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));
    let built = build(&src, &out, false, &config).unwrap();
    assert!(built.is_ok(), "unexpected diagnostics: {:?}", built.diagnostics);

    assert!(out.exists());
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);
}

/// S2: taking a mutable borrow while an immutable borrow of the same
/// binding is still live is an ownership error, not a codegen-time crash.
#[test]
fn s2_mut_borrow_while_borrowed_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "main.home",
        "fn main() { let mut a = 1; let b = &a; let c = &mut a; return }",
    );

    let outcome = check(&src).unwrap();
    assert!(!outcome.is_ok());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("already borrowed")));
}

/// S3: calling a function with the wrong number of arguments is a
/// semantic error caught before codegen ever runs.
#[test]
fn s3_wrong_argument_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "main.home",
        "fn f(x: int) -> int { return x + 1 } fn main() { f(1, 2) return }",
    );

    let outcome = check(&src).unwrap();
    assert!(!outcome.is_ok());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.message.contains("expects 1 argument")));
}

/// S4: returning a string literal from a function declared to return
/// `int` is a type mismatch, reported with both sides of the mismatch.
#[test]
fn s4_return_type_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.home", "fn g() -> int { return \"hi\" }");

    let outcome = check(&src).unwrap();
    assert!(!outcome.is_ok());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.expected.as_deref() == Some("int") && d.actual.as_deref() == Some("string")));

    let out = dir.path().join("g");
    let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));
    let built = build(&src, &out, false, &config).unwrap();
    assert!(!built.is_ok());
    assert!(!out.exists(), "codegen must not run after a type error");
}

/// S5: rebuilding the same source with the same config hits the cache
/// and reproduces byte-identical output rather than recompiling.
#[test]
fn s5_second_build_is_a_byte_identical_cache_hit() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.home", "fn main() { let x = 7; return }");
    let out = dir.path().join("main");
    let cache_dir = dir.path().join(".home-cache");
    let config = CompilerConfig::new().with_cache_dir(cache_dir.clone());

    build(&src, &out, false, &config).unwrap();
    let first = std::fs::read(&out).unwrap();

    // A cache entry now exists for this source/target/compiler-version key.
    assert!(cache_dir.exists());

    std::fs::remove_file(&out).unwrap();
    build(&src, &out, false, &config).unwrap();
    let second = std::fs::read(&out).unwrap();

    assert_eq!(first, second);
}

/// S6: the postfix `?` operator on a `Result<int, string>`-typed call
/// type-checks as a bare `int` inside a function returning that same
/// `Result` type.
#[test]
fn s6_try_postfix_typechecks_inside_result_returning_function() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "main.home",
        "fn read() -> Result<int, string> { return 1 } \
         fn main() -> Result<int, string> { let x = read()?; return x }",
    );

    let outcome = check(&src).unwrap();
    assert!(outcome.is_ok(), "unexpected diagnostics: {:?}", outcome.diagnostics);
}

/// `compile` only runs the lexer and parser: a program with a semantic
/// error (but valid syntax) reports no diagnostics at this stage.
#[test]
fn compile_does_not_run_the_typechecker() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.home", "fn g() -> int { return \"hi\" }");

    let outcome = compile(&src).unwrap();
    assert!(outcome.is_ok(), "compile should not surface semantic errors: {:?}", outcome.diagnostics);
    assert_eq!(outcome.top_level_len, 1);
}

/// Kernel-mode builds emit GNU-as text instead of an ELF image, through
/// the same cache and pipeline plumbing as a normal build.
#[test]
fn kernel_mode_build_emits_gnu_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.home", "fn main() { return }");
    let out = dir.path().join("main.s");
    let config = CompilerConfig::new().with_cache_dir(dir.path().join(".home-cache"));

    let outcome = build(&src, &out, true, &config).unwrap();
    assert!(outcome.is_ok());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with(".text"));
    assert!(text.contains(".globl _start"));
}
