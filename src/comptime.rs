//! Compile-time (CT) evaluator.
//!
//! A small tree-walking interpreter restricted to the subset of the
//! language the checker is willing to fold: arithmetic/logical operators
//! on literal-typed operands, name lookup into a value store, `if`/`else`
//! and blocks, and calls to pure functions whose bodies themselves stay
//! inside this subset.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinOp, Block, Expr, ExprKind, FnDecl, Stmt, StmtKind, UnOp};
use crate::source::SourceLocation;

const MAX_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum CtValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Void,
}

impl fmt::Display for CtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtValue::Int(v) => write!(f, "{}", v),
            CtValue::Float(v) => write!(f, "{}", v),
            CtValue::Bool(v) => write!(f, "{}", v),
            CtValue::String(v) => write!(f, "{}", v),
            CtValue::Void => write!(f, "()"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CtError {
    UnsupportedExpression { location: SourceLocation },
    UndefinedName { name: String, location: SourceLocation },
    TypeMismatch { location: SourceLocation },
    CtDepthExceeded { location: SourceLocation },
}

impl fmt::Display for CtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtError::UnsupportedExpression { location } => {
                write!(f, "expression is not comptime-evaluable at {}", location)
            }
            CtError::UndefinedName { name, location } => {
                write!(f, "undefined comptime name `{}` at {}", name, location)
            }
            CtError::TypeMismatch { location } => {
                write!(f, "comptime type mismatch at {}", location)
            }
            CtError::CtDepthExceeded { location } => {
                write!(f, "comptime evaluation exceeded {} frames at {}", MAX_DEPTH, location)
            }
        }
    }
}

impl std::error::Error for CtError {}

impl From<&CtError> for crate::diagnostics::Diagnostic {
    fn from(err: &CtError) -> Self {
        let location = match err {
            CtError::UnsupportedExpression { location }
            | CtError::UndefinedName { location, .. }
            | CtError::TypeMismatch { location }
            | CtError::CtDepthExceeded { location } => *location,
        };
        crate::diagnostics::Diagnostic::error(err.to_string(), location)
    }
}

/// Mapping from identifier to its evaluated comptime value, threaded
/// explicitly through the evaluator rather than kept as process-wide
/// state: this store is specific to one compilation.
#[derive(Default)]
pub struct CtStore {
    values: HashMap<String, CtValue>,
}

impl CtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: CtValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&CtValue> {
        self.values.get(name)
    }
}

/// Evaluates expressions against a value store and, for calls, a table of
/// the pure functions this compilation unit is willing to fold through.
/// `'a` is the AST arena's lifetime; `'s` is the borrow of the store and
/// function table for this particular evaluation.
pub struct CtEvaluator<'s, 'a> {
    store: &'s mut CtStore,
    functions: Option<&'s HashMap<String, &'a FnDecl<'a>>>,
    depth: usize,
}

impl<'s, 'a> CtEvaluator<'s, 'a> {
    pub fn new(store: &'s mut CtStore) -> Self {
        CtEvaluator { store, functions: None, depth: 0 }
    }

    /// Builds an evaluator that can also fold calls to the given functions,
    /// each evaluated in a fresh, call-local `CtStore`.
    pub fn with_functions(store: &'s mut CtStore, functions: &'s HashMap<String, &'a FnDecl<'a>>) -> Self {
        CtEvaluator { store, functions: Some(functions), depth: 0 }
    }

    pub fn eval_expr(&mut self, expr: &Expr<'_>) -> Result<CtValue, CtError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(CtError::CtDepthExceeded { location: expr.location });
        }
        let result = self.eval_expr_inner(expr);
        self.depth -= 1;
        result
    }

    fn eval_expr_inner(&mut self, expr: &Expr<'_>) -> Result<CtValue, CtError> {
        match &expr.kind {
            ExprKind::IntLiteral(v) => Ok(CtValue::Int(*v)),
            ExprKind::FloatLiteral(v) => Ok(CtValue::Float(*v)),
            ExprKind::BoolLiteral(v) => Ok(CtValue::Bool(*v)),
            ExprKind::StringLiteral(v) => Ok(CtValue::String(v.clone())),
            ExprKind::Identifier(name) => self
                .store
                .get(name)
                .cloned()
                .ok_or_else(|| CtError::UndefinedName {
                    name: name.clone(),
                    location: expr.location,
                }),
            ExprKind::Unary { op, operand } => {
                let v = self.eval_expr(operand)?;
                self.eval_unary(*op, v, expr.location)
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.eval_binary(*op, l, r, expr.location)
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args, expr.location),
            ExprKind::Block(block) => self.eval_block(block),
            _ => Err(CtError::UnsupportedExpression { location: expr.location }),
        }
    }

    /// Evaluates a call to a pure function by name: its arguments are
    /// evaluated in the current scope, then its body runs to completion in
    /// a fresh `CtStore` seeded with just those argument bindings.
    fn eval_call(
        &mut self,
        callee: &Expr<'_>,
        args: &[&Expr<'_>],
        location: SourceLocation,
    ) -> Result<CtValue, CtError> {
        let ExprKind::Identifier(name) = &callee.kind else {
            return Err(CtError::UnsupportedExpression { location });
        };
        let Some(functions) = self.functions else {
            return Err(CtError::UndefinedName { name: name.clone(), location });
        };
        let Some(decl) = functions.get(name.as_str()) else {
            return Err(CtError::UndefinedName { name: name.clone(), location });
        };
        if decl.params.len() != args.len() {
            return Err(CtError::TypeMismatch { location });
        }

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_expr(arg)?);
        }

        let mut call_store = CtStore::new();
        for (param, value) in decl.params.iter().zip(arg_values) {
            call_store.define(param.name.clone(), value);
        }
        let mut call_evaluator = CtEvaluator {
            store: &mut call_store,
            functions: self.functions,
            depth: self.depth,
        };
        call_evaluator.eval_block(decl.body)
    }

    fn eval_unary(&self, op: UnOp, v: CtValue, location: SourceLocation) -> Result<CtValue, CtError> {
        match (op, v) {
            (UnOp::Neg, CtValue::Int(i)) => Ok(CtValue::Int(-i)),
            (UnOp::Neg, CtValue::Float(f)) => Ok(CtValue::Float(-f)),
            (UnOp::Not, CtValue::Bool(b)) => Ok(CtValue::Bool(!b)),
            _ => Err(CtError::TypeMismatch { location }),
        }
    }

    fn eval_binary(
        &self,
        op: BinOp,
        l: CtValue,
        r: CtValue,
        location: SourceLocation,
    ) -> Result<CtValue, CtError> {
        use CtValue::*;
        match (op, l, r) {
            (BinOp::Add, Int(a), Int(b)) => Ok(Int(a + b)),
            (BinOp::Add, Float(a), Float(b)) => Ok(Float(a + b)),
            (BinOp::Sub, Int(a), Int(b)) => Ok(Int(a - b)),
            (BinOp::Sub, Float(a), Float(b)) => Ok(Float(a - b)),
            (BinOp::Mul, Int(a), Int(b)) => Ok(Int(a * b)),
            (BinOp::Mul, Float(a), Float(b)) => Ok(Float(a * b)),
            (BinOp::Div, Int(a), Int(b)) => {
                if b == 0 {
                    Err(CtError::TypeMismatch { location })
                } else {
                    Ok(Int(a / b))
                }
            }
            (BinOp::Div, Float(a), Float(b)) => Ok(Float(a / b)),
            (BinOp::Rem, Int(a), Int(b)) => {
                if b == 0 {
                    Err(CtError::TypeMismatch { location })
                } else {
                    Ok(Int(a % b))
                }
            }
            (BinOp::Eq, a, b) => Ok(Bool(a == b)),
            (BinOp::NotEq, a, b) => Ok(Bool(a != b)),
            (BinOp::Lt, Int(a), Int(b)) => Ok(Bool(a < b)),
            (BinOp::LtEq, Int(a), Int(b)) => Ok(Bool(a <= b)),
            (BinOp::Gt, Int(a), Int(b)) => Ok(Bool(a > b)),
            (BinOp::GtEq, Int(a), Int(b)) => Ok(Bool(a >= b)),
            (BinOp::And, Bool(a), Bool(b)) => Ok(Bool(a && b)),
            (BinOp::Or, Bool(a), Bool(b)) => Ok(Bool(a || b)),
            _ => Err(CtError::TypeMismatch { location }),
        }
    }

    /// Runs a block to completion and unwraps its result, whether it came
    /// from an early `return` somewhere inside or from the block's own
    /// tail expression.
    fn eval_block(&mut self, block: &Block<'_>) -> Result<CtValue, CtError> {
        match self.eval_block_flow(block)? {
            Flow::Return(v) | Flow::Continue(v) => Ok(v),
        }
    }

    /// Runs a block's statements in order, stopping early if one of them
    /// is (or contains) a `return`, so the call site can tell a function's
    /// early exit apart from its tail expression.
    fn eval_block_flow(&mut self, block: &Block<'_>) -> Result<Flow, CtError> {
        for stmt in block.stmts {
            if let Flow::Return(v) = self.eval_stmt(stmt)? {
                return Ok(Flow::Return(v));
            }
        }
        match block.tail {
            Some(expr) => Ok(Flow::Continue(self.eval_expr(expr)?)),
            None => Ok(Flow::Continue(CtValue::Void)),
        }
    }

    fn eval_stmt(&mut self, stmt: &Stmt<'_>) -> Result<Flow, CtError> {
        match &stmt.kind {
            StmtKind::LetDecl { name, init: Some(init), .. } => {
                let v = self.eval_expr(init)?;
                self.store.define(name.clone(), v);
                Ok(Flow::Continue(CtValue::Void))
            }
            StmtKind::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => CtValue::Void,
                };
                Ok(Flow::Return(v))
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                let cond_v = self.eval_expr(cond)?;
                match cond_v {
                    CtValue::Bool(true) => self.eval_block_flow(then_branch),
                    CtValue::Bool(false) => match else_branch {
                        Some(block) => self.eval_block_flow(block),
                        None => Ok(Flow::Continue(CtValue::Void)),
                    },
                    _ => Err(CtError::TypeMismatch { location: stmt.location }),
                }
            }
            StmtKind::Expr(expr) => Ok(Flow::Continue(self.eval_expr(expr)?)),
            StmtKind::Block(block) => self.eval_block_flow(block),
            _ => Err(CtError::UnsupportedExpression { location: stmt.location }),
        }
    }
}

/// Whether a statement ran to completion or hit a `return`, so a `return`
/// nested inside an `if` still short-circuits the enclosing block.
enum Flow {
    Continue(CtValue),
    Return(CtValue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::source::SourceBuffer;
    use bumpalo::Bump;

    fn eval_src(src: &str) -> Result<CtValue, CtError> {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().expect("expr parses");
        let mut store = CtStore::new();
        let mut evaluator = CtEvaluator::new(&mut store);
        evaluator.eval_expr(expr)
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(eval_src("2 + 3 * 4").unwrap(), CtValue::Int(14));
    }

    #[test]
    fn folds_comparison() {
        assert_eq!(eval_src("2 < 3").unwrap(), CtValue::Bool(true));
    }

    #[test]
    fn division_by_zero_is_an_error_not_a_panic() {
        assert!(matches!(eval_src("1 / 0"), Err(CtError::TypeMismatch { .. })));
    }

    fn parse_fn_decls<'a>(arena: &'a Bump, src: &str) -> HashMap<String, &'a FnDecl<'a>> {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let parser = Parser::new(arena, tokens);
        let (program, errors) = parser.parse_program("test.home");
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        program
            .top_level
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::FnDecl(decl) => Some((decl.name.clone(), *decl)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn folds_a_call_to_a_pure_function() {
        let arena = Bump::new();
        let functions = parse_fn_decls(&arena, "fn double(n: int) -> int { return n * 2 }");
        let mut store = CtStore::new();
        let mut evaluator = CtEvaluator::with_functions(&mut store, &functions);

        let buf = SourceBuffer::new("call.home", "double(21)".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let call_arena = Bump::new();
        let mut call_parser = Parser::new(&call_arena, tokens);
        let call = call_parser.parse_expr().expect("expr parses");

        assert_eq!(evaluator.eval_expr(call).unwrap(), CtValue::Int(42));
    }

    #[test]
    fn call_with_wrong_argument_count_is_a_type_mismatch() {
        let arena = Bump::new();
        let functions = parse_fn_decls(&arena, "fn double(n: int) -> int { return n * 2 }");
        let mut store = CtStore::new();
        let mut evaluator = CtEvaluator::with_functions(&mut store, &functions);

        let buf = SourceBuffer::new("call.home", "double(1, 2)".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let call_arena = Bump::new();
        let mut call_parser = Parser::new(&call_arena, tokens);
        let call = call_parser.parse_expr().expect("expr parses");

        assert!(matches!(evaluator.eval_expr(call), Err(CtError::TypeMismatch { .. })));
    }

    #[test]
    fn calling_without_a_functions_table_is_unsupported() {
        assert!(matches!(
            eval_src_with_call_site("undeclared(1)"),
            Err(CtError::UndefinedName { .. })
        ));
    }

    fn eval_src_with_call_site(src: &str) -> Result<CtValue, CtError> {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().expect("expr parses");
        let mut store = CtStore::new();
        let mut evaluator = CtEvaluator::new(&mut store);
        evaluator.eval_expr(expr)
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut store = CtStore::new();
        let mut evaluator = CtEvaluator::new(&mut store);
        evaluator.depth = MAX_DEPTH;
        let buf = SourceBuffer::new("test.home", "1".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().unwrap();
        assert!(matches!(
            evaluator.eval_expr(expr),
            Err(CtError::CtDepthExceeded { .. })
        ));
    }
}
