//! Per-statement lowering: dispatches each `StmtKind` to the right
//! codegen routine, or treats it as a no-op when it has no runtime effect.

use super::instructions::{jmp, mov_mem_rbp_reg, xor_reg_reg, Reg};
use super::state::CodeGen;
use super::CodeGenError;

use crate::ast::{Stmt, StmtKind};

impl CodeGen {
    pub(super) fn generate_stmt(&mut self, stmt: &Stmt<'_>) -> Result<(), CodeGenError> {
        match &stmt.kind {
            StmtKind::LetDecl { name, init, .. } => self.generate_let(name, *init, stmt.location),
            StmtKind::Return(expr) => self.generate_return(*expr, stmt.location),
            StmtKind::If { cond, then_branch, else_branch } => {
                self.generate_if(cond, then_branch, *else_branch, stmt.location)
            }
            StmtKind::While { cond, body } => self.generate_while(cond, body, stmt.location),
            StmtKind::Loop { body } => self.generate_loop(body, stmt.location),
            StmtKind::Block(block) => {
                for inner in block.stmts {
                    self.generate_stmt(inner)?;
                }
                if let Some(tail) = block.tail {
                    self.generate_expr(tail)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.generate_expr(expr).map(|_| ()),
            StmtKind::FnDecl(decl) => {
                if self.current_function.is_some() {
                    return Err(CodeGenError::UnsupportedFeature {
                        what: "nested function declarations".to_string(),
                        location: decl.location,
                    });
                }
                // Top-level function bodies are emitted separately by
                // `program::generate_program`; seeing one here in statement
                // position means it was already handled.
                Ok(())
            }
            StmtKind::StructDecl(_) | StmtKind::EnumDecl(_) | StmtKind::ImportDecl(_) => Ok(()),
        }
    }

    fn generate_let(
        &mut self,
        name: &str,
        init: Option<&crate::ast::Expr<'_>>,
        location: crate::source::SourceLocation,
    ) -> Result<(), CodeGenError> {
        let disp = self
            .locals
            .declare(name)
            .map_err(|_| CodeGenError::TooManyVariables {
                function: self.current_function.clone().unwrap_or_default(),
                location,
            })?;
        match init {
            Some(expr) => self.generate_expr(expr)?,
            None => xor_reg_reg(&mut self.buf, Reg::Rax, Reg::Rax),
        }
        mov_mem_rbp_reg(&mut self.buf, disp, Reg::Rax);
        Ok(())
    }

    fn generate_return(
        &mut self,
        expr: Option<&crate::ast::Expr<'_>>,
        location: crate::source::SourceLocation,
    ) -> Result<(), CodeGenError> {
        match expr {
            Some(expr) => self.generate_expr(expr)?,
            None => xor_reg_reg(&mut self.buf, Reg::Rax, Reg::Rax),
        }
        let label = self.current_return_label.clone().ok_or_else(|| CodeGenError::UnsupportedFeature {
            what: "return outside a function body".to_string(),
            location,
        })?;
        jmp(&mut self.buf, &label);
        Ok(())
    }
}
