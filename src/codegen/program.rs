//! Top-level program assembly: the entry point's prologue, the top-level
//! statements, and the Linux `exit(0)` syscall in place of a `ret` — there
//! is no caller to return to. Function bodies are emitted after, each
//! under its own predeclared label so forward calls resolve.

use super::functions::count_locals_in_stmts;
use super::instructions::{mov_reg_imm64, mov_reg_reg, push_reg, sub_reg_reg, syscall, xor_reg_reg, Reg};
use super::state::CodeGen;
use super::CodeGenError;

use crate::ast::{Program, StmtKind};

/// Compiles `program` to a flat byte buffer of x86-64 machine code. The
/// first emitted byte is the intended entry point.
pub fn generate_program(program: &Program<'_>) -> Result<Vec<u8>, CodeGenError> {
    Ok(build(program)?.buf.bytes().to_vec())
}

/// Compiles `program` the same way, returning the GNU-as mnemonic trace
/// instead of bytes — recorded alongside the bytes during the same pass
/// (see `buffer::CodeBuffer::emit_asm`), so ELF and kernel output can
/// never drift apart from each other.
pub fn generate_program_asm(program: &Program<'_>) -> Result<Vec<String>, CodeGenError> {
    Ok(build(program)?.buf.asm_lines().to_vec())
}

fn build(program: &Program<'_>) -> Result<CodeGen, CodeGenError> {
    let mut cg = CodeGen::new();

    let fn_decls: Vec<_> = program
        .top_level
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::FnDecl(decl) => Some(*decl),
            _ => None,
        })
        .collect();
    for decl in &fn_decls {
        cg.predeclare_function(decl);
    }

    push_reg(&mut cg.buf, Reg::Rbp);
    mov_reg_reg(&mut cg.buf, Reg::Rbp, Reg::Rsp);

    let local_count = count_locals_in_stmts(program.top_level);
    if local_count > super::MAX_LOCALS {
        return Err(CodeGenError::TooManyVariables {
            function: "<top level>".to_string(),
            location: crate::source::SourceLocation::new(1, 1),
        });
    }
    if local_count > 0 {
        mov_reg_imm64(&mut cg.buf, Reg::Rcx, 8 * local_count as i64);
        sub_reg_reg(&mut cg.buf, Reg::Rsp, Reg::Rcx);
    }

    for stmt in program.top_level {
        if matches!(stmt.kind, StmtKind::FnDecl(_)) {
            continue;
        }
        cg.generate_stmt(stmt)?;
    }

    // exit(0): rax = 60 (__NR_exit), rdi = 0.
    mov_reg_imm64(&mut cg.buf, Reg::Rax, 60);
    xor_reg_reg(&mut cg.buf, Reg::Rdi, Reg::Rdi);
    syscall(&mut cg.buf);

    for decl in &fn_decls {
        cg.generate_function(decl)?;
    }

    cg.buf.resolve().map_err(|missing| CodeGenError::UndefinedVariable {
        name: missing.join(", "),
        location: crate::source::SourceLocation::new(1, 1),
    })?;

    Ok(cg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::source::SourceBuffer;
    use bumpalo::Bump;

    fn compile(src: &str) -> Result<Vec<u8>, CodeGenError> {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
        assert!(lex_errors.is_empty());
        let arena = Bump::new();
        let parser = Parser::new(&arena, tokens);
        let (program, parse_errors) = parser.parse_program("test.home");
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        generate_program(&program)
    }

    #[test]
    fn empty_main_emits_exit_syscall() {
        let bytes = compile("fn main() { return }").unwrap();
        assert!(!bytes.is_empty());
        // The syscall opcode (0f 05) must appear somewhere in the entry path.
        assert!(bytes.windows(2).any(|w| w == [0x0f, 0x05]));
    }

    #[test]
    fn arithmetic_and_call_compile_to_nonempty_code() {
        let bytes = compile(
            "fn add(a: int, b: int) -> int { return a + b } fn main() { let x = add(1, 2) return }",
        )
        .unwrap();
        assert!(bytes.len() > 16);
    }

    #[test]
    fn string_literal_is_unsupported_in_this_target() {
        let err = compile(r#"fn main() { let s = "hi" return }"#).unwrap_err();
        assert!(matches!(err, CodeGenError::UnsupportedFeature { .. }));
    }

    #[test]
    fn too_many_locals_is_reported() {
        let mut src = String::from("fn main() { ");
        for i in 0..300 {
            src.push_str(&format!("let v{} = {}; ", i, i));
        }
        src.push_str("return }");
        let err = compile(&src).unwrap_err();
        assert!(matches!(err, CodeGenError::TooManyVariables { .. }));
    }
}
