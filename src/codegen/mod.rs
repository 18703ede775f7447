//! Native x86-64 code generator.
//!
//! Lowers a type-checked `Program` to machine code using a fixed register
//! discipline (no graph coloring): expression results always land in
//! `rax`; binary operators spill the right operand to the stack while the
//! left recomputes in `rax`, then pop the right into `rcx`. Locals live
//! on the stack at `[rbp - 8*(index+1)]`. See `buffer` for the
//! emit-buffer-plus-patch-list scheme that avoids a second assembly pass.

mod buffer;
mod control_flow;
mod error;
mod functions;
mod instructions;
mod platform;
mod program;
mod state;
mod statements;

pub use error::CodeGenError;
pub use platform::{host_target_triple, is_supported_target};
pub use program::{generate_program, generate_program_asm};
pub use state::{CodeGen, MAX_LOCALS};

use instructions::{
    add_reg_reg, cmp_reg_reg, cqo, idiv_reg, imul_reg_reg, mov_reg_imm64, mov_reg_mem_rbp,
    mov_reg_reg, pop_reg, push_reg, sub_reg_reg, xor_reg_reg, Cond, Reg,
};

use crate::ast::{BinOp, Expr, ExprKind, UnOp};
use crate::source::SourceLocation;

impl CodeGen {
    /// Compiles `expr`, leaving its value in `rax`.
    pub(super) fn generate_expr(&mut self, expr: &Expr<'_>) -> Result<(), CodeGenError> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => {
                mov_reg_imm64(&mut self.buf, Reg::Rax, *v);
                Ok(())
            }
            ExprKind::BoolLiteral(b) => {
                mov_reg_imm64(&mut self.buf, Reg::Rax, if *b { 1 } else { 0 });
                Ok(())
            }
            ExprKind::FloatLiteral(_) => Err(CodeGenError::UnsupportedFeature {
                what: "floating-point arithmetic".to_string(),
                location: expr.location,
            }),
            ExprKind::StringLiteral(_) => Err(CodeGenError::UnsupportedFeature {
                what: "string literals (no data segment in this target)".to_string(),
                location: expr.location,
            }),
            ExprKind::Identifier(name) => self.generate_load(name, expr.location),
            ExprKind::Unary { op, operand } => self.generate_unary(*op, operand, expr.location),
            ExprKind::Binary { op, left, right } => self.generate_binary(*op, left, right, expr.location),
            ExprKind::Call { callee, args } => self.generate_call(callee, args, expr.location),
            ExprKind::Try { operand } => self.generate_expr(operand),
            ExprKind::Block(block) => self.generate_block_expr(block),
            ExprKind::FieldAccess { .. } => Err(CodeGenError::UnsupportedFeature {
                what: "struct field access".to_string(),
                location: expr.location,
            }),
            ExprKind::Await { .. } => Err(CodeGenError::UnsupportedFeature {
                what: "await execution semantics".to_string(),
                location: expr.location,
            }),
        }
    }

    fn generate_load(&mut self, name: &str, location: SourceLocation) -> Result<(), CodeGenError> {
        let disp = self
            .locals
            .offset(name)
            .ok_or_else(|| CodeGenError::UndefinedVariable { name: name.to_string(), location })?;
        mov_reg_mem_rbp(&mut self.buf, Reg::Rax, disp);
        Ok(())
    }

    fn generate_unary(
        &mut self,
        op: UnOp,
        operand: &Expr<'_>,
        location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        match op {
            UnOp::Neg => {
                self.generate_expr(operand)?;
                xor_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rcx);
                sub_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rax);
                mov_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            UnOp::Not => {
                mov_reg_imm64(&mut self.buf, Reg::Rcx, 1);
                self.generate_expr(operand)?;
                sub_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rax);
                mov_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            UnOp::Ref | UnOp::RefMut => Err(CodeGenError::UnsupportedFeature {
                what: "reference-valued expressions".to_string(),
                location,
            }),
        }
    }

    fn generate_binary(
        &mut self,
        op: BinOp,
        left: &Expr<'_>,
        right: &Expr<'_>,
        location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        if op == BinOp::Assign {
            return self.generate_assign(left, right, location);
        }

        self.generate_expr(right)?;
        push_reg(&mut self.buf, Reg::Rax);
        self.generate_expr(left)?;
        pop_reg(&mut self.buf, Reg::Rcx);
        // rax = left, rcx = right, per the fixed register discipline.

        match op {
            BinOp::Add => {
                add_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            BinOp::Sub => {
                sub_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            BinOp::Mul => {
                imul_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            BinOp::Div => {
                cqo(&mut self.buf);
                idiv_reg(&mut self.buf, Reg::Rcx);
                Ok(())
            }
            BinOp::Rem => {
                cqo(&mut self.buf);
                idiv_reg(&mut self.buf, Reg::Rcx);
                mov_reg_reg(&mut self.buf, Reg::Rax, Reg::Rdx);
                Ok(())
            }
            BinOp::Eq => self.materialize_comparison(Cond::Eq),
            BinOp::NotEq => self.materialize_comparison(Cond::NotEq),
            BinOp::Lt => self.materialize_comparison(Cond::Lt),
            BinOp::LtEq => self.materialize_comparison(Cond::LtEq),
            BinOp::Gt => self.materialize_comparison(Cond::Gt),
            BinOp::GtEq => self.materialize_comparison(Cond::GtEq),
            BinOp::And => {
                // Both operands are already normalized to 0/1 by the
                // checker's bool typing; product is logical AND on that domain.
                imul_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                Ok(())
            }
            BinOp::Or => {
                add_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
                self.materialize_nonzero()
            }
            BinOp::Assign => unreachable!("handled above"),
        }
    }

    /// After `cmp rax, rcx`, normalizes the flag into a 0/1 value in `rax`
    /// using only instructions in the required subset (no `setcc`).
    pub(super) fn materialize_comparison(&mut self, cond: Cond) -> Result<(), CodeGenError> {
        cmp_reg_reg(&mut self.buf, Reg::Rax, Reg::Rcx);
        let true_label = self.buf.fresh_label("cmp_true");
        let end_label = self.buf.fresh_label("cmp_end");
        instructions::jcc(&mut self.buf, cond, &true_label);
        mov_reg_imm64(&mut self.buf, Reg::Rax, 0);
        instructions::jmp(&mut self.buf, &end_label);
        self.buf.place_label(&true_label);
        mov_reg_imm64(&mut self.buf, Reg::Rax, 1);
        self.buf.place_label(&end_label);
        Ok(())
    }

    /// Normalizes whatever integer is currently in `rax` to 0 (if zero) or 1.
    fn materialize_nonzero(&mut self) -> Result<(), CodeGenError> {
        xor_reg_reg(&mut self.buf, Reg::Rcx, Reg::Rcx);
        self.materialize_comparison(Cond::NotEq)
    }

    fn generate_assign(
        &mut self,
        left: &Expr<'_>,
        right: &Expr<'_>,
        location: SourceLocation,
    ) -> Result<(), CodeGenError> {
        let ExprKind::Identifier(name) = &left.kind else {
            return Err(CodeGenError::UnsupportedFeature {
                what: "assignment to a non-identifier target".to_string(),
                location,
            });
        };
        self.generate_expr(right)?;
        let disp = self
            .locals
            .offset(name)
            .ok_or_else(|| CodeGenError::UndefinedVariable { name: name.clone(), location })?;
        instructions::mov_mem_rbp_reg(&mut self.buf, disp, Reg::Rax);
        Ok(())
    }

    fn generate_block_expr(&mut self, block: &crate::ast::Block<'_>) -> Result<(), CodeGenError> {
        for stmt in block.stmts {
            self.generate_stmt(stmt)?;
        }
        match block.tail {
            Some(expr) => self.generate_expr(expr),
            None => {
                xor_reg_reg(&mut self.buf, Reg::Rax, Reg::Rax);
                Ok(())
            }
        }
    }
}
