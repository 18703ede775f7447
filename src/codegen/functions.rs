//! Function prologue/epilogue and call-site lowering.
//!
//! Prologue: `push rbp; mov rbp, rsp` followed by a fixed-size `sub rsp`
//! reservation for every local the body declares (locals aren't register
//! allocated, so the reservation is sized up front by a pre-pass).
//! Epilogue: `mov rsp, rbp; pop rbp; ret`. Calls spill each evaluated
//! argument to the stack before popping them into the System V argument
//! registers, so evaluating one argument can't clobber another still
//! held in a register.

use super::instructions::{
    call, mov_mem_rbp_reg, mov_reg_imm64, mov_reg_reg, pop_reg, push_reg, ret, sub_reg_reg, Reg,
};
use super::state::{CodeGen, ARG_REGS};
use super::CodeGenError;

use crate::ast::{Expr, FnDecl};
use crate::source::SourceLocation;

impl CodeGen {
    /// Registers every top-level function's entry label before any body is
    /// emitted, so forward calls resolve without a second pass over the AST.
    pub(super) fn predeclare_function(&mut self, decl: &FnDecl<'_>) {
        let label = self.buf.fresh_label(&format!("fn_{}", decl.name));
        self.functions.insert(decl.name.clone(), label);
    }

    pub(super) fn generate_function(&mut self, decl: &FnDecl<'_>) -> Result<(), CodeGenError> {
        if decl.params.len() > ARG_REGS.len() {
            return Err(CodeGenError::UnsupportedFeature {
                what: format!(
                    "function `{}` takes more arguments than fit in registers",
                    decl.name
                ),
                location: decl.location,
            });
        }

        let label = self
            .functions
            .get(&decl.name)
            .cloned()
            .unwrap_or_else(|| self.buf.fresh_label(&format!("fn_{}", decl.name)));
        self.buf.place_label(&label);

        self.locals = Default::default();
        self.current_function = Some(decl.name.clone());
        let return_label = self.buf.fresh_label(&format!("ret_{}", decl.name));
        self.current_return_label = Some(return_label.clone());

        push_reg(&mut self.buf, Reg::Rbp);
        mov_reg_reg(&mut self.buf, Reg::Rbp, Reg::Rsp);

        let local_count = count_locals(decl);
        if local_count > super::MAX_LOCALS {
            return Err(CodeGenError::TooManyVariables {
                function: decl.name.clone(),
                location: decl.location,
            });
        }
        // Reserve stack space via a mov+sub pair, since `sub r64, imm32`
        // isn't in the required instruction subset — only register forms are.
        if local_count > 0 {
            let bytes = 8 * local_count as i64;
            mov_reg_imm64(&mut self.buf, Reg::Rcx, bytes);
            sub_reg_reg(&mut self.buf, Reg::Rsp, Reg::Rcx);
        }

        for (i, param) in decl.params.iter().enumerate() {
            let disp = self.locals.declare(&param.name).map_err(|_| CodeGenError::TooManyVariables {
                function: decl.name.clone(),
                location: param.location,
            })?;
            mov_mem_rbp_reg(&mut self.buf, disp, ARG_REGS[i]);
        }

        for stmt in decl.body.stmts {
            self.generate_stmt(stmt)?;
        }
        if let Some(tail) = decl.body.tail {
            self.generate_expr(tail)?;
        }

        self.buf.place_label(&return_label);
        mov_reg_reg(&mut self.buf, Reg::Rsp, Reg::Rbp);
        pop_reg(&mut self.buf, Reg::Rbp);
        ret(&mut self.buf);

        self.current_function = None;
        self.current_return_label = None;
        Ok(())
    }

    pub(super) fn generate_call(
        &mut self,
        callee: &Expr<'_>,
        args: &[&Expr<'_>],
        location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        let crate::ast::ExprKind::Identifier(name) = &callee.kind else {
            return Err(CodeGenError::UnsupportedFeature {
                what: "indirect calls".to_string(),
                location,
            });
        };
        if crate::builtins::is_intrinsic(name) {
            return Err(CodeGenError::UnsupportedFeature {
                what: format!("intrinsic `{}` (no I/O syscall wiring in this target)", name),
                location,
            });
        }
        if args.len() > ARG_REGS.len() {
            return Err(CodeGenError::UnsupportedFeature {
                what: format!("call to `{}` with more arguments than fit in registers", name),
                location,
            });
        }
        let label = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| CodeGenError::UndefinedVariable { name: name.clone(), location })?;

        for arg in args {
            self.generate_expr(arg)?;
            push_reg(&mut self.buf, Reg::Rax);
        }
        for i in (0..args.len()).rev() {
            pop_reg(&mut self.buf, ARG_REGS[i]);
        }
        call(&mut self.buf, &label);
        Ok(())
    }
}

/// Counts `let` declarations reachable in a function body without
/// descending into nested function declarations (which have their own frame).
fn count_locals(decl: &FnDecl<'_>) -> usize {
    decl.params.len() + count_locals_in_block(decl.body)
}

fn count_locals_in_block(block: &crate::ast::Block<'_>) -> usize {
    count_locals_in_stmts(block.stmts)
}

/// Shared with `program::generate_program`, which reserves stack space for
/// the top-level entry point the same way a function body does.
pub(super) fn count_locals_in_stmts(stmts: &[&crate::ast::Stmt<'_>]) -> usize {
    use crate::ast::StmtKind::*;
    stmts
        .iter()
        .map(|stmt| match &stmt.kind {
            LetDecl { .. } => 1,
            If { then_branch, else_branch, .. } => {
                count_locals_in_block(then_branch) + else_branch.map(count_locals_in_block).unwrap_or(0)
            }
            While { body, .. } | Loop { body } => count_locals_in_block(body),
            Block(block) => count_locals_in_block(block),
            _ => 0,
        })
        .sum()
}
