//! Two-pass type checker with an ownership tracker running alongside pass 2.
//!
//! Pass 1 collects every function/struct/enum signature into the top-level
//! environment so forward references resolve. Pass 2 walks each statement
//! in source order, assigning a type to every expression and feeding the
//! same traversal into the `OwnershipTracker`. Neither pass aborts on the
//! first problem: diagnostics accumulate so one invocation reports many
//! errors, per the error-continuation design running through this crate.

use std::collections::HashMap;

use crate::ast::{
    Block, EnumDecl, Expr, ExprKind, FnDecl, Program, Stmt, StmtKind, StructDecl, TypeAnn, BinOp,
    UnOp,
};
use crate::builtins;
use crate::diagnostics::Diagnostic;
use crate::ownership::{OwnershipError, OwnershipTracker};
use crate::source::SourceLocation;
use crate::types::{Type, TypeEnv};

/// The taxonomy named in the component design; each variant maps to a
/// fixed suggestion string rather than free-form text, so diagnostics stay
/// consistent across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeErrorKind {
    TypeMismatch,
    UndefinedVariable,
    UndefinedFunction,
    WrongNumberOfArguments,
    InvalidOperation,
    CannotInferType,
    UnknownField,
    DuplicateDeclaration,
}

impl TypeErrorKind {
    fn suggestion(self) -> &'static str {
        match self {
            TypeErrorKind::TypeMismatch => "ensure the value type matches the declared type",
            TypeErrorKind::UndefinedVariable => "check the name is declared before this use",
            TypeErrorKind::UndefinedFunction => "check the function name and its import",
            TypeErrorKind::WrongNumberOfArguments => "match the call's argument count to the declared parameters",
            TypeErrorKind::InvalidOperation => "check the operand types support this operator",
            TypeErrorKind::CannotInferType => "add an explicit type annotation",
            TypeErrorKind::UnknownField => "check the struct declaration for this field's name",
            TypeErrorKind::DuplicateDeclaration => "rename one of the conflicting declarations",
        }
    }
}

pub struct TypeChecker {
    /// Top-level function and struct/enum signatures, separate from the
    /// lexically scoped `TypeEnv` used for ordinary variable bindings.
    globals: HashMap<String, Type>,
    env: TypeEnv,
    ownership: OwnershipTracker,
    generics_in_scope: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            globals: HashMap::new(),
            env: TypeEnv::new(),
            ownership: OwnershipTracker::new(),
            generics_in_scope: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn check_program(mut self, program: &Program<'_>) -> Vec<Diagnostic> {
        self.collect_signatures(program.top_level);
        for stmt in program.top_level {
            self.check_stmt(stmt);
        }
        self.diagnostics
    }

    // ---- pass 1 ----

    fn collect_signatures(&mut self, stmts: &[&Stmt<'_>]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::FnDecl(decl) => self.collect_fn_signature(decl),
                StmtKind::StructDecl(decl) => self.collect_struct_signature(decl),
                StmtKind::EnumDecl(decl) => self.collect_enum_signature(decl),
                _ => {}
            }
        }
    }

    fn collect_fn_signature(&mut self, decl: &FnDecl<'_>) {
        if self.globals.contains_key(&decl.name) {
            self.error(
                TypeErrorKind::DuplicateDeclaration,
                format!("function `{}` is already declared", decl.name),
                decl.location,
            );
            return;
        }
        let params: Vec<Type> = decl
            .params
            .iter()
            .map(|p| self.resolve_type_ann(&p.ty, &decl.generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>()))
            .collect();
        let ret = decl
            .return_ty
            .as_ref()
            .map(|t| self.resolve_type_ann(t, &decl.generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>()))
            .unwrap_or(Type::Void);
        self.globals.insert(
            decl.name.clone(),
            Type::Function {
                params,
                ret: Box::new(ret),
            },
        );
    }

    fn collect_struct_signature(&mut self, decl: &StructDecl) {
        if self.globals.contains_key(&decl.name) {
            self.error(
                TypeErrorKind::DuplicateDeclaration,
                format!("type `{}` is already declared", decl.name),
                decl.location,
            );
            return;
        }
        let fields = decl
            .fields
            .iter()
            .map(|f| (f.name.clone(), self.resolve_type_ann(&f.ty, &[])))
            .collect();
        self.globals.insert(
            decl.name.clone(),
            Type::Struct {
                name: decl.name.clone(),
                fields,
            },
        );
    }

    fn collect_enum_signature(&mut self, decl: &EnumDecl) {
        if self.globals.contains_key(&decl.name) {
            self.error(
                TypeErrorKind::DuplicateDeclaration,
                format!("type `{}` is already declared", decl.name),
                decl.location,
            );
            return;
        }
        // Tagged-union representation reusing the Struct shape with a
        // synthetic discriminant field (see DESIGN.md).
        let fields = vec![("__tag".to_string(), Type::Int)];
        self.globals.insert(
            decl.name.clone(),
            Type::Struct {
                name: decl.name.clone(),
                fields,
            },
        );
    }

    fn resolve_type_ann(&self, ann: &TypeAnn, generics: &[String]) -> Type {
        match ann {
            TypeAnn::Named(name) => match name.as_str() {
                "int" => Type::Int,
                "float" => Type::Float,
                "bool" => Type::Bool,
                "string" => Type::String,
                "void" => Type::Void,
                _ if generics.contains(name) => Type::Generic {
                    name: name.clone(),
                    bounds: Vec::new(),
                },
                _ => match self.globals.get(name) {
                    Some(t) => t.clone(),
                    None => Type::Generic {
                        name: name.clone(),
                        bounds: Vec::new(),
                    },
                },
            },
            TypeAnn::Reference(inner) => {
                Type::Reference(Box::new(self.resolve_type_ann(inner, generics)))
            }
            TypeAnn::MutableReference(inner) => {
                Type::MutableReference(Box::new(self.resolve_type_ann(inner, generics)))
            }
            TypeAnn::Result(ok, err) => Type::Result {
                ok: Box::new(self.resolve_type_ann(ok, generics)),
                err: Box::new(self.resolve_type_ann(err, generics)),
            },
        }
    }

    // ---- pass 2 ----

    fn check_stmt(&mut self, stmt: &Stmt<'_>) {
        match &stmt.kind {
            StmtKind::LetDecl {
                name,
                ty,
                init,
                mutable,
                comptime: _,
            } => self.check_let_decl(name, ty.as_ref(), *init, *mutable, stmt.location),
            StmtKind::FnDecl(decl) => self.check_fn_decl(decl),
            StmtKind::StructDecl(_) | StmtKind::EnumDecl(_) | StmtKind::ImportDecl(_) => {}
            StmtKind::Return(expr) => self.check_return(*expr, stmt.location),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.check_if(cond, then_branch, *else_branch),
            StmtKind::While { cond, body } => self.check_while(cond, body),
            StmtKind::Loop { body } => self.check_loop(body),
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Expr(expr) => {
                self.type_of(expr);
            }
        }
    }

    fn check_let_decl(
        &mut self,
        name: &str,
        ty: Option<&TypeAnn>,
        init: Option<&Expr<'_>>,
        mutable: bool,
        location: SourceLocation,
    ) {
        if self.env.declared_in_current_scope(name) {
            self.error(
                TypeErrorKind::DuplicateDeclaration,
                format!("`{}` is already declared in this scope", name),
                location,
            );
        }
        let declared = ty.map(|t| self.resolve_type_ann(t, &self.generics_in_scope.clone()));
        let inferred = init.map(|e| self.type_of(e));
        let final_ty = match (declared, inferred) {
            (Some(d), Some(i)) => {
                if d != i {
                    self.error_with_types(
                        TypeErrorKind::TypeMismatch,
                        format!("initializer for `{}` does not match its declared type", name),
                        location,
                        &d,
                        &i,
                    );
                }
                d
            }
            (Some(d), None) => d,
            (None, Some(i)) => i,
            (None, None) => {
                self.error(
                    TypeErrorKind::CannotInferType,
                    format!("cannot infer a type for `{}`", name),
                    location,
                );
                Type::Void
            }
        };
        self.env.define(name, final_ty, mutable);
        self.ownership.declare(name);
    }

    fn check_fn_decl(&mut self, decl: &FnDecl<'_>) {
        let generics: Vec<String> = decl.generics.iter().map(|g| g.name.clone()).collect();
        let saved_generics = std::mem::replace(&mut self.generics_in_scope, generics.clone());
        let ret_ty = decl
            .return_ty
            .as_ref()
            .map(|t| self.resolve_type_ann(t, &generics))
            .unwrap_or(Type::Void);
        self.env.enter_function(ret_ty);
        self.ownership.push_scope();
        for param in &decl.params {
            let pty = self.resolve_type_ann(&param.ty, &generics);
            self.env.define(param.name.clone(), pty, false);
            self.ownership.declare(param.name.clone());
        }
        self.check_block_contents(decl.body);
        self.ownership.pop_scope();
        self.env.exit_function();
        self.generics_in_scope = saved_generics;
    }

    fn check_return(&mut self, expr: Option<&Expr<'_>>, location: SourceLocation) {
        let actual = expr.map(|e| self.type_of(e)).unwrap_or(Type::Void);
        if let Some(expected) = self.env.current_return_type().cloned() {
            // The grammar has no `Ok(...)`/`Err(...)` constructor, so the
            // only legal way to return from a `Result<ok, err>`-declared
            // function is a bare value of the `ok` type.
            let matches = match &expected {
                Type::Result { ok, .. } => **ok == actual,
                _ => expected == actual,
            };
            if !matches {
                self.error_with_types(
                    TypeErrorKind::TypeMismatch,
                    "return value does not match the function's declared return type",
                    location,
                    &expected,
                    &actual,
                );
            }
        }
    }

    fn check_if(&mut self, cond: &Expr<'_>, then_branch: &Block<'_>, else_branch: Option<&Block<'_>>) {
        let cond_ty = self.type_of(cond);
        if cond_ty != Type::Bool {
            self.error_with_types(
                TypeErrorKind::TypeMismatch,
                "if condition must be bool",
                cond.location,
                &Type::Bool,
                &cond_ty,
            );
        }
        self.check_block(then_branch);
        if let Some(else_block) = else_branch {
            self.check_block(else_block);
        }
    }

    fn check_while(&mut self, cond: &Expr<'_>, body: &Block<'_>) {
        let cond_ty = self.type_of(cond);
        if cond_ty != Type::Bool {
            self.error_with_types(
                TypeErrorKind::TypeMismatch,
                "while condition must be bool",
                cond.location,
                &Type::Bool,
                &cond_ty,
            );
        }
        self.check_block(body);
    }

    fn check_loop(&mut self, body: &Block<'_>) {
        self.check_block(body);
    }

    fn check_block(&mut self, block: &Block<'_>) {
        self.env.push_scope();
        self.ownership.push_scope();
        self.check_block_contents(block);
        self.ownership.pop_scope();
        self.env.pop_scope();
    }

    fn check_block_contents(&mut self, block: &Block<'_>) {
        self.collect_signatures(block.stmts);
        for stmt in block.stmts {
            self.check_stmt(stmt);
        }
        if let Some(tail) = block.tail {
            self.type_of(tail);
        }
    }

    // ---- expressions ----

    fn type_of(&mut self, expr: &Expr<'_>) -> Type {
        match &expr.kind {
            ExprKind::IntLiteral(_) => Type::Int,
            ExprKind::FloatLiteral(_) => Type::Float,
            ExprKind::BoolLiteral(_) => Type::Bool,
            ExprKind::StringLiteral(_) => Type::String,
            ExprKind::Identifier(name) => self.type_of_identifier(name, expr.location),
            ExprKind::Binary { op, left, right } => self.type_of_binary(*op, left, right, expr.location),
            ExprKind::Unary { op, operand } => self.type_of_unary(*op, operand, expr.location),
            ExprKind::Call { callee, args } => self.type_of_call(callee, args, expr.location),
            ExprKind::FieldAccess { base, field } => self.type_of_field_access(base, field, expr.location),
            ExprKind::Try { operand } => self.type_of_try(operand, expr.location),
            ExprKind::Await { operand } => self.type_of(operand),
            ExprKind::Block(block) => {
                self.env.push_scope();
                self.ownership.push_scope();
                self.collect_signatures(block.stmts);
                for stmt in block.stmts {
                    self.check_stmt(stmt);
                }
                let ty = block.tail.map(|t| self.type_of(t)).unwrap_or(Type::Void);
                self.ownership.pop_scope();
                self.env.pop_scope();
                ty
            }
        }
    }

    fn type_of_identifier(&mut self, name: &str, location: SourceLocation) -> Type {
        let Some(binding) = self.env.lookup(name) else {
            self.error(
                TypeErrorKind::UndefinedVariable,
                format!("undefined variable `{}`", name),
                location,
            );
            return Type::Void;
        };
        let ty = binding.ty.clone();
        if ty.is_copy() {
            if let Some(err) = self.ownership.record_copy_read(name, location) {
                self.ownership_error(err);
            }
        } else if let Some(err) = self.ownership.record_move(name, location) {
            self.ownership_error(err);
        }
        ty
    }

    fn type_of_binary(&mut self, op: BinOp, left: &Expr<'_>, right: &Expr<'_>, location: SourceLocation) -> Type {
        if op == BinOp::Assign {
            return self.type_of_assign(left, right, location);
        }
        let lt = self.type_of(left);
        let rt = self.type_of(right);
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.error(
                        TypeErrorKind::InvalidOperation,
                        "arithmetic operands must be numeric",
                        location,
                    );
                    return Type::Void;
                }
                if lt == Type::Int && rt == Type::Int {
                    Type::Int
                } else {
                    Type::Float
                }
            }
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
                if lt != rt {
                    self.error_with_types(
                        TypeErrorKind::TypeMismatch,
                        "comparison operands must have the same type",
                        location,
                        &lt,
                        &rt,
                    );
                }
                Type::Bool
            }
            BinOp::And | BinOp::Or => {
                if lt != Type::Bool || rt != Type::Bool {
                    self.error(
                        TypeErrorKind::InvalidOperation,
                        "logical operands must be bool",
                        location,
                    );
                }
                Type::Bool
            }
            BinOp::Assign => unreachable!("handled above"),
        }
    }

    fn type_of_assign(&mut self, left: &Expr<'_>, right: &Expr<'_>, location: SourceLocation) -> Type {
        let rt = self.type_of(right);
        if let ExprKind::Identifier(name) = &left.kind {
            match self.env.lookup(name) {
                Some(binding) => {
                    if !binding.mutable {
                        self.error(
                            TypeErrorKind::InvalidOperation,
                            format!("cannot assign to immutable binding `{}`", name),
                            location,
                        );
                    } else if binding.ty != rt {
                        let expected = binding.ty.clone();
                        self.error_with_types(
                            TypeErrorKind::TypeMismatch,
                            format!("cannot assign `{}` into `{}`", rt, name),
                            location,
                            &expected,
                            &rt,
                        );
                    }
                }
                None => {
                    self.error(
                        TypeErrorKind::UndefinedVariable,
                        format!("undefined variable `{}`", name),
                        location,
                    );
                }
            }
        }
        Type::Void
    }

    fn type_of_unary(&mut self, op: UnOp, operand: &Expr<'_>, location: SourceLocation) -> Type {
        match op {
            UnOp::Neg => {
                let t = self.type_of(operand);
                if !t.is_numeric() {
                    self.error(TypeErrorKind::InvalidOperation, "`-` requires a numeric operand", location);
                }
                t
            }
            UnOp::Not => {
                let t = self.type_of(operand);
                if t != Type::Bool {
                    self.error(TypeErrorKind::InvalidOperation, "`!` requires a bool operand", location);
                }
                Type::Bool
            }
            UnOp::Ref | UnOp::RefMut => self.type_of_borrow(op, operand, location),
        }
    }

    fn type_of_borrow(&mut self, op: UnOp, operand: &Expr<'_>, location: SourceLocation) -> Type {
        let inner = if let ExprKind::Identifier(name) = &operand.kind {
            let err = if op == UnOp::RefMut {
                self.ownership.record_mutable_borrow(name, location)
            } else {
                self.ownership.record_shared_borrow(name, location)
            };
            if let Some(e) = err {
                self.ownership_error(e);
            }
            match self.env.lookup(name) {
                Some(b) => b.ty.clone(),
                None => {
                    self.error(
                        TypeErrorKind::UndefinedVariable,
                        format!("undefined variable `{}`", name),
                        location,
                    );
                    Type::Void
                }
            }
        } else {
            self.type_of(operand)
        };
        if op == UnOp::RefMut {
            Type::MutableReference(Box::new(inner))
        } else {
            Type::Reference(Box::new(inner))
        }
    }

    fn type_of_call(&mut self, callee: &Expr<'_>, args: &[&Expr<'_>], location: SourceLocation) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.type_of(a)).collect();

        let ExprKind::Identifier(name) = &callee.kind else {
            self.error(TypeErrorKind::InvalidOperation, "callee must be a named function", location);
            return Type::Void;
        };

        if let Some(sig) = builtins::lookup(name) {
            let _ = sig.variadic;
            return sig.return_type.clone();
        }

        let Some(fn_ty) = self.globals.get(name).cloned() else {
            self.error(
                TypeErrorKind::UndefinedFunction,
                format!("undefined function `{}`", name),
                location,
            );
            return Type::Void;
        };

        let Type::Function { params, ret } = fn_ty else {
            self.error(
                TypeErrorKind::InvalidOperation,
                format!("`{}` is not callable", name),
                location,
            );
            return Type::Void;
        };

        if params.len() != arg_types.len() {
            self.error(
                TypeErrorKind::WrongNumberOfArguments,
                format!(
                    "`{}` expects {} argument(s), found {}",
                    name,
                    params.len(),
                    arg_types.len()
                ),
                location,
            );
            return *ret;
        }

        for (i, (expected, actual)) in params.iter().zip(arg_types.iter()).enumerate() {
            // Generic parameters unify structurally against any argument
            // type — instantiation itself is not performed (see DESIGN.md).
            if matches!(expected, Type::Generic { .. }) {
                continue;
            }
            if expected != actual {
                self.error_with_types(
                    TypeErrorKind::TypeMismatch,
                    format!("argument {} to `{}` has the wrong type", i + 1, name),
                    location,
                    expected,
                    actual,
                );
            }
        }

        *ret
    }

    fn type_of_field_access(&mut self, base: &Expr<'_>, field: &str, location: SourceLocation) -> Type {
        // Reading a field only borrows the base binding; it must not move
        // the whole struct the way an ordinary value-producing read of a
        // non-`Copy` identifier does; otherwise a second field read off the
        // same binding (`p.x` then `p.y`) would spuriously report a move.
        let base_ty = if let ExprKind::Identifier(name) = &base.kind {
            self.type_of_identifier_for_field_read(name, location)
        } else {
            self.type_of(base)
        };
        let fields = base_ty.struct_fields();
        match fields.and_then(|fs| fs.iter().find(|(n, _)| n == field)) {
            Some((_, ty)) => ty.clone(),
            None => {
                self.error(
                    TypeErrorKind::UnknownField,
                    format!("`{}` has no field `{}`", base_ty, field),
                    location,
                );
                Type::Void
            }
        }
    }

    /// Like `type_of_identifier`, but used when the identifier is only the
    /// base of a field access: that use borrows the binding rather than
    /// consuming it, regardless of whether its type is `Copy`.
    fn type_of_identifier_for_field_read(&mut self, name: &str, location: SourceLocation) -> Type {
        let Some(binding) = self.env.lookup(name) else {
            self.error(
                TypeErrorKind::UndefinedVariable,
                format!("undefined variable `{}`", name),
                location,
            );
            return Type::Void;
        };
        let ty = binding.ty.clone();
        if let Some(err) = self.ownership.record_copy_read(name, location) {
            self.ownership_error(err);
        }
        ty
    }

    fn type_of_try(&mut self, operand: &Expr<'_>, location: SourceLocation) -> Type {
        let operand_ty = self.type_of(operand);
        match operand_ty {
            Type::Result { ok, err } => {
                if let Some(Type::Result { err: fn_err, .. }) = self.env.current_return_type().cloned() {
                    if *fn_err != *err {
                        self.error_with_types(
                            TypeErrorKind::TypeMismatch,
                            "`?` error type is not compatible with the enclosing function's return type",
                            location,
                            &fn_err,
                            &err,
                        );
                    }
                } else {
                    self.error(
                        TypeErrorKind::TypeMismatch,
                        "`?` used outside a function returning Result",
                        location,
                    );
                }
                *ok
            }
            other => {
                self.error(
                    TypeErrorKind::TypeMismatch,
                    format!("`?` requires a Result operand, found `{}`", other),
                    location,
                );
                Type::Void
            }
        }
    }

    // ---- diagnostics ----

    fn error(&mut self, kind: TypeErrorKind, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics.push(
            Diagnostic::error(message, location).with_suggestion(kind.suggestion()),
        );
    }

    fn error_with_types(
        &mut self,
        kind: TypeErrorKind,
        message: impl Into<String>,
        location: SourceLocation,
        expected: &Type,
        actual: &Type,
    ) {
        self.diagnostics.push(
            Diagnostic::error(message, location)
                .with_types(expected.to_string(), actual.to_string())
                .with_suggestion(kind.suggestion()),
        );
    }

    fn ownership_error(&mut self, err: OwnershipError) {
        let (message, location) = match &err {
            OwnershipError::UseAfterMove { name, location } => {
                (format!("use of moved value `{}`", name), *location)
            }
            OwnershipError::MultipleMutableBorrows { name, location } => {
                (format!("`{}` is already mutably borrowed", name), *location)
            }
            OwnershipError::BorrowWhileMutablyBorrowed { name, location } => (
                format!("cannot borrow `{}` as shared: already mutably borrowed", name),
                *location,
            ),
            OwnershipError::MutBorrowWhileBorrowed { name, location } => (
                format!("cannot borrow `{}` as mutable: already borrowed", name),
                *location,
            ),
        };
        self.diagnostics.push(
            Diagnostic::error(message, location)
                .with_suggestion("respect exclusive-mutable/shared-immutable borrowing"),
        );
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::source::SourceBuffer;
    use bumpalo::Bump;

    fn check(src: &str) -> Vec<Diagnostic> {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
        assert!(lex_errors.is_empty());
        let arena = Bump::new();
        let parser = Parser::new(&arena, tokens);
        let (program, parse_errors) = parser.parse_program("test.home");
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        TypeChecker::new().check_program(&program)
    }

    #[test]
    fn s1_accepts_arithmetic_and_return() {
        let diags = check("fn main() { let x = 2 + 3 * 4; return }");
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    }

    #[test]
    fn s2_mut_borrow_while_borrowed_is_reported() {
        let diags = check("fn main() { let mut a = 1; let b = &a; let c = &mut a; return }");
        assert!(diags.iter().any(|d| d.message.contains("already borrowed")));
    }

    #[test]
    fn s3_wrong_argument_count_is_reported() {
        let diags = check("fn f(x: int) -> int { return x + 1 } fn main() { f(1, 2) return }");
        assert!(diags.iter().any(|d| d.message.contains("expects 1 argument")));
    }

    #[test]
    fn s4_return_type_mismatch_is_reported() {
        let diags = check("fn g() -> int { return \"hi\" }");
        assert!(diags.iter().any(|d| d.expected.as_deref() == Some("int") && d.actual.as_deref() == Some("string")));
    }

    #[test]
    fn s6_try_postfix_unwraps_ok_type() {
        let buf = SourceBuffer::new("test.home", "read()?".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().expect("expr parses");

        let result_ty = Type::Result {
            ok: Box::new(Type::Int),
            err: Box::new(Type::String),
        };
        let mut checker = TypeChecker::new();
        checker.globals.insert(
            "read".to_string(),
            Type::Function {
                params: vec![],
                ret: Box::new(result_ty.clone()),
            },
        );
        checker.env.enter_function(result_ty);
        let ty = checker.type_of(expr);
        assert_eq!(ty, Type::Int);
        assert!(checker.diagnostics.is_empty(), "unexpected diagnostics: {:?}", checker.diagnostics);
    }

    #[test]
    fn undefined_function_is_reported() {
        let diags = check("fn main() { missing(1) return }");
        assert!(diags.iter().any(|d| d.message.contains("undefined function")));
    }

    #[test]
    fn field_access_on_struct_parameter_resolves_declared_field_type() {
        let diags = check(
            "struct Point { x: int, y: int } \
             fn get_x(p: Point) -> int { return p.x }",
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    }

    #[test]
    fn reading_two_fields_off_the_same_struct_binding_does_not_move_it() {
        let diags = check(
            "struct Point { x: int, y: int } \
             fn sum_xy(p: Point) -> int { let a = p.x; let b = p.y; return a + b }",
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    }

    #[test]
    fn unknown_field_is_reported() {
        let diags = check(
            "struct Point { x: int, y: int } \
             fn get_z(p: Point) -> int { return p.z }",
        );
        assert!(diags.iter().any(|d| d.message.contains("no field `z`")));
    }

    #[test]
    fn duplicate_function_declaration_is_reported() {
        let diags = check("fn f() { return } fn f() { return }");
        assert!(diags.iter().any(|d| d.message.contains("already declared")));
    }

    #[test]
    fn print_and_assert_are_variadic_intrinsics() {
        let diags = check("fn main() { print(1, 2, 3) assert(true) return }");
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    }
}
