//! CodeGen state: the emit buffer, the per-function locals map, and the
//! table of function entry labels used to resolve calls.

use std::collections::HashMap;

use super::buffer::CodeBuffer;
use super::instructions::Reg;

/// Argument registers per the Linux System V ABI, in order. Only the
/// first four are used: a fifth argument is `UnsupportedFeature`, since
/// this codegen never spills call arguments to the stack.
pub(super) const ARG_REGS: [Reg; 4] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx];

pub const MAX_LOCALS: usize = 256;

/// A name-to-stack-offset map for one function's locals, per §4.6:
/// locals live at `[rbp - 8*(index+1)]`.
#[derive(Default)]
pub(super) struct LocalsFrame {
    offsets: HashMap<String, i32>,
}

impl LocalsFrame {
    /// Allocates a fresh stack slot for `name`. Re-declaration (shadowing
    /// within the same function) allocates another slot and the name now
    /// resolves to it — the checker has already validated scoping, so
    /// codegen only needs "most recent slot wins".
    pub fn declare(&mut self, name: &str) -> Result<i32, ()> {
        if self.offsets.len() >= MAX_LOCALS {
            return Err(());
        }
        let index = self.offsets.len();
        let disp = -8 * (index as i32 + 1);
        self.offsets.insert(name.to_string(), disp);
        Ok(disp)
    }

    pub fn offset(&self, name: &str) -> Option<i32> {
        self.offsets.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

pub struct CodeGen {
    pub(super) buf: CodeBuffer,
    pub(super) locals: LocalsFrame,
    /// Function name -> entry label, populated before any body is emitted
    /// so calls to functions declared later in the file still resolve.
    pub(super) functions: HashMap<String, String>,
    pub(super) current_function: Option<String>,
    /// Where a `return` in the current function should jump to, so the
    /// epilogue is emitted exactly once regardless of how many `return`
    /// statements the body contains.
    pub(super) current_return_label: Option<String>,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            buf: CodeBuffer::new(),
            locals: LocalsFrame::default(),
            functions: HashMap::new(),
            current_function: None,
            current_return_label: None,
        }
    }
}
