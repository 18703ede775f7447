//! `if`/`else` and `while`/`loop` lowering via the patch-list scheme.

use super::instructions::{cmp_reg_reg, jcc, jmp, xor_reg_reg, Cond, Reg};
use super::state::CodeGen;
use super::CodeGenError;

use crate::ast::Block;
use crate::source::SourceLocation;

impl CodeGen {
    pub(super) fn generate_if(
        &mut self,
        cond: &crate::ast::Expr<'_>,
        then_branch: &Block<'_>,
        else_branch: Option<&Block<'_>>,
        _location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        self.generate_expr(cond)?;
        xor_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rcx);
        cmp_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);

        let else_label = self.buf.fresh_label("else");
        let end_label = self.buf.fresh_label("endif");

        jcc(&mut self.buf, Cond::Eq, &else_label);
        self.generate_block_stmts(then_branch)?;
        jmp(&mut self.buf, &end_label);
        self.buf.place_label(&else_label);
        if let Some(block) = else_branch {
            self.generate_block_stmts(block)?;
        }
        self.buf.place_label(&end_label);
        Ok(())
    }

    pub(super) fn generate_while(
        &mut self,
        cond: &crate::ast::Expr<'_>,
        body: &Block<'_>,
        _location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        let top_label = self.buf.fresh_label("while_top");
        let end_label = self.buf.fresh_label("while_end");

        self.buf.place_label(&top_label);
        self.generate_expr(cond)?;
        xor_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rcx);
        cmp_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
        jcc(&mut self.buf, Cond::Eq, &end_label);
        self.generate_block_stmts(body)?;
        jmp(&mut self.buf, &top_label);
        self.buf.place_label(&end_label);
        Ok(())
    }

    pub(super) fn generate_loop(
        &mut self,
        body: &Block<'_>,
        _location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        let top_label = self.buf.fresh_label("loop_top");
        self.buf.place_label(&top_label);
        self.generate_block_stmts(body)?;
        jmp(&mut self.buf, &top_label);
        Ok(())
    }

    /// Emits a block's statements and tail expression purely for side
    /// effects/control flow; the tail value (if any) is left in `rax` but
    /// callers in statement position don't rely on it.
    fn generate_block_stmts(&mut self, block: &Block<'_>) -> Result<(), CodeGenError> {
        for stmt in block.stmts {
            self.generate_stmt(stmt)?;
        }
        if let Some(tail) = block.tail {
            self.generate_expr(tail)?;
        }
        Ok(())
    }
}
