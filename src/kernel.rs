//! GNU-as assembly emitter ("kernel mode").
//!
//! Produces a `.s` text file for an external assembler/linker to process.
//! Uses the same register discipline and label scheme as the ELF path —
//! the mnemonic trace is recorded by the same codegen pass that produces
//! the ELF bytes (see `codegen::buffer::CodeBuffer::emit_asm`), so the two
//! backends cannot drift apart.

use std::fs;
use std::io;
use std::path::Path;

use crate::ast::Program;
use crate::codegen::{generate_program_asm, CodeGenError};

const ENTRY_SYMBOL: &str = "_start";

/// Renders `program` as GNU-as text, with directives `.text`/`.globl` and
/// AT&T-order mnemonics/operands.
pub fn render_assembly(program: &Program<'_>) -> Result<String, CodeGenError> {
    let lines = generate_program_asm(program)?;
    let mut out = String::new();
    out.push_str(".text\n");
    out.push_str(&format!(".globl {}\n", ENTRY_SYMBOL));
    out.push_str(&format!("{}:\n", ENTRY_SYMBOL));
    for line in lines {
        if line.ends_with(':') {
            out.push_str(&line);
        } else {
            out.push_str("    ");
            out.push_str(&line);
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn write_assembly(path: &Path, program: &Program<'_>) -> Result<(), KernelEmitError> {
    let text = render_assembly(program).map_err(KernelEmitError::CodeGen)?;
    fs::write(path, text).map_err(|e| KernelEmitError::Io { path: path.to_path_buf(), message: e.to_string() })
}

#[derive(Debug)]
pub enum KernelEmitError {
    CodeGen(CodeGenError),
    Io { path: std::path::PathBuf, message: String },
}

impl std::fmt::Display for KernelEmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelEmitError::CodeGen(e) => write!(f, "{}", e),
            KernelEmitError::Io { path, message } => {
                write!(f, "failed to write assembly to {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for KernelEmitError {}

impl From<io::Error> for KernelEmitError {
    fn from(e: io::Error) -> Self {
        KernelEmitError::Io { path: std::path::PathBuf::new(), message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::source::SourceBuffer;
    use bumpalo::Bump;

    #[test]
    fn emits_text_directive_and_entry_label() {
        let buf = SourceBuffer::new("test.home", "fn main() { return }".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let parser = Parser::new(&arena, tokens);
        let (program, errors) = parser.parse_program("test.home");
        assert!(errors.is_empty());

        let text = render_assembly(&program).unwrap();
        assert!(text.starts_with(".text\n"));
        assert!(text.contains(".globl _start"));
        assert!(text.contains("syscall"));
    }
}
