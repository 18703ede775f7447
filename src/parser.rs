//! Pratt/precedence-climbing parser: tokens to AST.
//!
//! Declarations are recursive-descent; expressions are parsed with a
//! binding-power table. Errors are accumulated rather than aborting the
//! parse — the parser's contract is "best-effort AST plus error list,"
//! and it resynchronizes at the next statement boundary after a bad token
//! so one malformed line does not swallow the rest of the file.

use std::fmt;

use bumpalo::Bump;

use crate::ast::{
    Block, EnumDecl, EnumVariant, Expr, ExprKind, FnDecl, GenericParam, ImportDecl, ImportSpec,
    Param, Program, Stmt, StmtKind, StructDecl, StructField, TypeAnn, BinOp, UnOp,
};
use crate::lexer::{Token, TokenKind};
use crate::source::SourceLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: String,
        location: SourceLocation,
    },
    OutOfMemory {
        location: SourceLocation,
    },
    InvalidCharacter {
        ch: char,
        location: SourceLocation,
    },
    Overflow {
        location: SourceLocation,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                location,
            } => write!(f, "expected {}, found {} at {}", expected, found, location),
            ParseError::OutOfMemory { location } => {
                write!(f, "arena allocation failed near {}", location)
            }
            ParseError::InvalidCharacter { ch, location } => {
                write!(f, "invalid character '{}' at {}", ch, location)
            }
            ParseError::Overflow { location } => {
                write!(f, "numeric literal out of range at {}", location)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<&ParseError> for crate::diagnostics::Diagnostic {
    fn from(err: &ParseError) -> Self {
        let location = match err {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::OutOfMemory { location }
            | ParseError::InvalidCharacter { location, .. }
            | ParseError::Overflow { location } => *location,
        };
        crate::diagnostics::Diagnostic::error(err.to_string(), location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

fn infix_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq => Precedence::Assignment,
        TokenKind::OrOr => Precedence::Or,
        TokenKind::AndAnd => Precedence::And,
        TokenKind::EqEq | TokenKind::NotEq => Precedence::Equality,
        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => Precedence::Comparison,
        TokenKind::Plus | TokenKind::Minus => Precedence::Term,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Factor,
        TokenKind::LParen | TokenKind::Dot | TokenKind::Question => Precedence::Call,
        _ => Precedence::None,
    }
}

pub struct Parser<'a> {
    arena: &'a Bump,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(arena: &'a Bump, tokens: Vec<Token>) -> Self {
        Parser {
            arena,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse_program(
        mut self,
        source_path: impl Into<std::path::PathBuf>,
    ) -> (Program<'a>, Vec<ParseError>) {
        let mut stmts: Vec<&'a Stmt<'a>> = Vec::new();
        while !self.at_eof() {
            match self.parse_declaration() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }
        let top_level = self.arena.alloc_slice_copy(&stmts);
        (Program::new(top_level, source_path), self.errors)
    }

    // ---- declarations ----

    fn parse_declaration(&mut self) -> Option<&'a Stmt<'a>> {
        match self.peek().kind {
            TokenKind::Fn => self.parse_fn_decl(false),
            TokenKind::Async => {
                self.advance();
                self.expect(TokenKind::Fn, "fn")?;
                self.parse_fn_decl(true)
            }
            TokenKind::Let => self.parse_let_decl(false),
            TokenKind::Const => self.parse_let_decl(true),
            TokenKind::Struct => self.parse_struct_decl(),
            TokenKind::Enum => self.parse_enum_decl(),
            TokenKind::Import => self.parse_import_decl(),
            _ => self.parse_statement(),
        }
    }

    fn parse_fn_decl(&mut self, is_async: bool) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        if !is_async {
            self.expect(TokenKind::Fn, "fn")?;
        }
        let name = self.expect_ident()?;
        let generics = if self.check(TokenKind::Lt) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::LParen, "(")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param_loc = self.peek().location;
                let param_name = self.expect_ident()?;
                self.expect(TokenKind::Colon, ":")?;
                let ty = self.parse_type_ann()?;
                params.push(Param {
                    name: param_name,
                    ty,
                    location: param_loc,
                });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        let return_ty = if self.match_token(TokenKind::Arrow) {
            Some(self.parse_type_ann()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let is_test = false;
        let decl = self.arena.alloc(FnDecl {
            name,
            generics,
            params,
            return_ty,
            body,
            is_test,
            is_async,
            location,
        });
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::FnDecl(decl),
            location,
        }))
    }

    fn parse_generic_params(&mut self) -> Option<Vec<GenericParam>> {
        self.expect(TokenKind::Lt, "<")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::Gt) {
            loop {
                let name = self.expect_ident()?;
                let mut bounds = Vec::new();
                if self.match_token(TokenKind::Colon) {
                    loop {
                        bounds.push(self.expect_ident()?);
                        // `+`-separated bound list reuses the Term-level
                        // `+` token; it is never ambiguous here since no
                        // expression appears inside a generic parameter list.
                        if !self.match_token(TokenKind::Plus) {
                            break;
                        }
                    }
                }
                params.push(GenericParam { name, bounds });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::Gt, ">")?;
        Some(params)
    }

    fn parse_let_decl(&mut self, comptime: bool) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.advance(); // `let` or `const`
        let mutable = self.match_token(TokenKind::Mut);
        let name = self.expect_ident()?;
        let ty = if self.match_token(TokenKind::Colon) {
            Some(self.parse_type_ann()?)
        } else {
            None
        };
        let init = if self.match_token(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.match_token(TokenKind::Semicolon);
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::LetDecl {
                name,
                ty,
                init,
                mutable,
                comptime,
            },
            location,
        }))
    }

    fn parse_struct_decl(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.expect(TokenKind::Struct, "struct")?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace, "{")?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let field_name = self.expect_ident()?;
            self.expect(TokenKind::Colon, ":")?;
            let ty = self.parse_type_ann()?;
            fields.push(StructField { name: field_name, ty });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "}")?;
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::StructDecl(StructDecl { name, fields, location }),
            location,
        }))
    }

    fn parse_enum_decl(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.expect(TokenKind::Enum, "enum")?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace, "{")?;
        let mut variants = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let variant_name = self.expect_ident()?;
            let mut payload = Vec::new();
            if self.match_token(TokenKind::LParen) {
                if !self.check(TokenKind::RParen) {
                    loop {
                        payload.push(self.parse_type_ann()?);
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, ")")?;
            }
            variants.push(EnumVariant {
                name: variant_name,
                payload,
            });
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "}")?;
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::EnumDecl(EnumDecl { name, variants, location }),
            location,
        }))
    }

    fn parse_import_decl(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.expect(TokenKind::Import, "import")?;
        let spec = if self.check(TokenKind::Str) {
            let tok = self.advance();
            let trimmed = tok.lexeme.trim_matches('"').to_string();
            ImportSpec::Path(trimmed)
        } else {
            let first = self.expect_ident()?;
            if self.match_token(TokenKind::Colon) {
                let second = self.expect_ident()?;
                ImportSpec::Std(format!("{}:{}", first, second))
            } else {
                ImportSpec::Std(first)
            }
        };
        self.match_token(TokenKind::Semicolon);
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::ImportDecl(ImportDecl { spec, location }),
            location,
        }))
    }

    fn parse_type_ann(&mut self) -> Option<TypeAnn> {
        if self.match_token(TokenKind::Amp) {
            let mutable = self.match_token(TokenKind::Mut);
            let inner = self.parse_type_ann()?;
            return Some(if mutable {
                TypeAnn::MutableReference(Box::new(inner))
            } else {
                TypeAnn::Reference(Box::new(inner))
            });
        }
        let name = self.expect_ident()?;
        if name == "Result" && self.match_token(TokenKind::Lt) {
            let ok = self.parse_type_ann()?;
            self.expect(TokenKind::Comma, ",")?;
            let err = self.parse_type_ann()?;
            self.expect(TokenKind::Gt, ">")?;
            return Some(TypeAnn::Result(Box::new(ok), Box::new(err)));
        }
        Some(TypeAnn::Named(name))
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> Option<&'a Stmt<'a>> {
        match self.peek().kind {
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Loop => self.parse_loop_stmt(),
            TokenKind::LBrace => {
                let location = self.peek().location;
                let block = self.parse_block()?;
                Some(self.arena.alloc(Stmt {
                    kind: StmtKind::Block(block),
                    location,
                }))
            }
            _ => self.parse_expr_stmt(),
        }
    }

    fn parse_return_stmt(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.advance();
        let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.match_token(TokenKind::Semicolon);
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::Return(value),
            location,
        }))
    }

    fn parse_if_stmt(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.advance();
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.match_token(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            location,
        }))
    }

    fn parse_while_stmt(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.advance();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::While { cond, body },
            location,
        }))
    }

    fn parse_loop_stmt(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        self.advance();
        let body = self.parse_block()?;
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::Loop { body },
            location,
        }))
    }

    fn parse_expr_stmt(&mut self) -> Option<&'a Stmt<'a>> {
        let location = self.peek().location;
        let expr = self.parse_expr()?;
        self.match_token(TokenKind::Semicolon);
        Some(self.arena.alloc(Stmt {
            kind: StmtKind::Expr(expr),
            location,
        }))
    }

    fn parse_block(&mut self) -> Option<&'a Block<'a>> {
        let location = self.peek().location;
        self.expect(TokenKind::LBrace, "{")?;
        let mut stmts: Vec<&'a Stmt<'a>> = Vec::new();
        let mut tail = None;
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            // A trailing expression with no statement terminator and
            // immediately followed by `}` is the block's value.
            let start_pos = self.pos;
            match self.parse_declaration() {
                Some(stmt) => {
                    if let StmtKind::Expr(expr) = stmt.kind {
                        if self.check(TokenKind::RBrace) && self.pos > start_pos {
                            tail = Some(expr);
                            break;
                        }
                    }
                    stmts.push(stmt);
                }
                None => self.synchronize(),
            }
        }
        self.expect(TokenKind::RBrace, "}")?;
        Some(self.arena.alloc(Block {
            stmts: self.arena.alloc_slice_copy(&stmts),
            tail,
            location,
        }))
    }

    // ---- expressions (Pratt) ----

    pub fn parse_expr(&mut self) -> Option<&'a Expr<'a>> {
        self.parse_precedence(Precedence::Assignment)
    }

    fn parse_precedence(&mut self, min_prec: Precedence) -> Option<&'a Expr<'a>> {
        let mut left = self.parse_unary()?;
        loop {
            let kind = self.peek().kind;
            let prec = infix_precedence(kind);
            if prec < min_prec || prec == Precedence::None {
                break;
            }
            left = match kind {
                TokenKind::LParen => self.parse_call(left)?,
                TokenKind::Dot => self.parse_field_access(left)?,
                TokenKind::Question => self.parse_try(left)?,
                _ => self.parse_binary(left, prec)?,
            };
        }
        Some(left)
    }

    fn parse_binary(&mut self, left: &'a Expr<'a>, prec: Precedence) -> Option<&'a Expr<'a>> {
        let op_tok = self.advance();
        let location = op_tok.location;
        let op = match op_tok.kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::LtEq => BinOp::LtEq,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::GtEq => BinOp::GtEq,
            TokenKind::AndAnd => BinOp::And,
            TokenKind::OrOr => BinOp::Or,
            TokenKind::Eq => BinOp::Assign,
            _ => unreachable!("infix_precedence only returns binary-capable kinds"),
        };
        // Assignment is right-associative; everything else is left-assoc,
        // so the recursive call's minimum precedence is one level higher
        // except for Assignment, which recurses at its own level.
        let next_min = if op == BinOp::Assign {
            Precedence::Assignment
        } else {
            bump_precedence(prec)
        };
        let right = self.parse_precedence(next_min)?;
        Some(self.arena.alloc(Expr {
            kind: ExprKind::Binary { op, left, right },
            location,
        }))
    }

    fn parse_call(&mut self, callee: &'a Expr<'a>) -> Option<&'a Expr<'a>> {
        let location = self.peek().location;
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Some(self.arena.alloc(Expr {
            kind: ExprKind::Call {
                callee,
                args: self.arena.alloc_slice_copy(&args),
            },
            location,
        }))
    }

    fn parse_field_access(&mut self, base: &'a Expr<'a>) -> Option<&'a Expr<'a>> {
        let location = self.peek().location;
        self.advance(); // `.`
        let field = self.expect_ident()?;
        Some(self.arena.alloc(Expr {
            kind: ExprKind::FieldAccess { base, field },
            location,
        }))
    }

    fn parse_try(&mut self, operand: &'a Expr<'a>) -> Option<&'a Expr<'a>> {
        let location = self.advance().location;
        Some(self.arena.alloc(Expr {
            kind: ExprKind::Try { operand },
            location,
        }))
    }

    fn parse_unary(&mut self) -> Option<&'a Expr<'a>> {
        let location = self.peek().location;
        match self.peek().kind {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Some(self.arena.alloc(Expr {
                    kind: ExprKind::Unary { op: UnOp::Not, operand },
                    location,
                }))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Some(self.arena.alloc(Expr {
                    kind: ExprKind::Unary { op: UnOp::Neg, operand },
                    location,
                }))
            }
            TokenKind::Amp => {
                self.advance();
                let mutable = self.match_token(TokenKind::Mut);
                let operand = self.parse_unary()?;
                let op = if mutable { UnOp::RefMut } else { UnOp::Ref };
                Some(self.arena.alloc(Expr {
                    kind: ExprKind::Unary { op, operand },
                    location,
                }))
            }
            TokenKind::Await => {
                self.advance();
                let operand = self.parse_unary()?;
                Some(self.arena.alloc(Expr {
                    kind: ExprKind::Await { operand },
                    location,
                }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<&'a Expr<'a>> {
        let tok = self.peek().clone();
        let location = tok.location;
        let expr = match tok.kind {
            TokenKind::Int => {
                self.advance();
                match tok.lexeme.parse::<i64>() {
                    Ok(v) => ExprKind::IntLiteral(v),
                    Err(_) => {
                        self.errors.push(ParseError::Overflow { location });
                        return None;
                    }
                }
            }
            TokenKind::Float => {
                self.advance();
                match tok.lexeme.parse::<f64>() {
                    Ok(v) => ExprKind::FloatLiteral(v),
                    Err(_) => {
                        self.errors.push(ParseError::Overflow { location });
                        return None;
                    }
                }
            }
            TokenKind::Str => {
                self.advance();
                let unescaped = unescape(tok.lexeme.trim_matches('"'));
                ExprKind::StringLiteral(unescaped)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::BoolLiteral(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::BoolLiteral(false)
            }
            TokenKind::Ident => {
                self.advance();
                ExprKind::Identifier(tok.lexeme)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, ")")?;
                return Some(inner);
            }
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                ExprKind::Block(block)
            }
            _ => {
                self.errors.push(ParseError::UnexpectedToken {
                    expected: "an expression".to_string(),
                    found: format!("{:?}", tok.kind),
                    location,
                });
                return None;
            }
        };
        Some(self.arena.alloc(Expr { kind: expr, location }))
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<()> {
        if self.check(kind) {
            self.advance();
            Some(())
        } else {
            let tok = self.peek().clone();
            self.errors.push(ParseError::UnexpectedToken {
                expected: what.to_string(),
                found: format!("{:?}", tok.kind),
                location: tok.location,
            });
            None
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        if self.check(TokenKind::Ident) {
            Some(self.advance().lexeme)
        } else {
            let tok = self.peek().clone();
            self.errors.push(ParseError::UnexpectedToken {
                expected: "an identifier".to_string(),
                found: format!("{:?}", tok.kind),
                location: tok.location,
            });
            None
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Skip tokens until the next statement boundary so one bad
    /// declaration doesn't cascade into spurious downstream errors.
    fn synchronize(&mut self) {
        while !self.at_eof() {
            if self.peek().kind == TokenKind::Semicolon {
                self.advance();
                return;
            }
            match self.peek().kind {
                TokenKind::Fn
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Import
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Loop
                | TokenKind::Return
                | TokenKind::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn bump_precedence(p: Precedence) -> Precedence {
    match p {
        Precedence::None => Precedence::Assignment,
        Precedence::Assignment => Precedence::Or,
        Precedence::Or => Precedence::And,
        Precedence::And => Precedence::Equality,
        Precedence::Equality => Precedence::Comparison,
        Precedence::Comparison => Precedence::Term,
        Precedence::Term => Precedence::Factor,
        Precedence::Factor => Precedence::Unary,
        Precedence::Unary => Precedence::Call,
        Precedence::Call => Precedence::Primary,
        Precedence::Primary => Precedence::Primary,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::source::SourceBuffer;

    fn parse(src: &str) -> (String, Vec<ParseError>) {
        let buf = SourceBuffer::new("test.home", src.to_string());
        let (tokens, lex_errors) = Lexer::new(&buf).tokenize();
        assert!(lex_errors.is_empty(), "unexpected lex errors: {:?}", lex_errors);
        let arena = Bump::new();
        let parser = Parser::new(&arena, tokens);
        let (program, errors) = parser.parse_program("test.home");
        (format!("{:?}", program.top_level.len()), errors)
    }

    #[test]
    fn parses_fn_with_return() {
        let (count, errors) = parse("fn main() { let x = 2 + 3 * 4; return }");
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(count, "1");
    }

    #[test]
    fn precedence_left_associates_and_binds_tighter_operators_deeper() {
        let buf = SourceBuffer::new("test.home", "a + b * c".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().expect("expr parses");
        match expr.kind {
            ExprKind::Binary { op: BinOp::Add, left, right } => {
                assert!(matches!(left.kind, ExprKind::Identifier(_)));
                assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected top-level Add, got {:?}", other),
        }
    }

    #[test]
    fn error_recovery_keeps_surrounding_statements() {
        let (count, errors) = parse("let a = 1; let b = ; let c = 3;");
        assert!(!errors.is_empty());
        // the malformed `let b = ;` is dropped; `a` and `c` still parse
        assert_eq!(count, "2");
    }

    #[test]
    fn struct_decl_parses_fields() {
        let (count, errors) = parse("struct Point { x: int, y: int }");
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(count, "1");
    }

    #[test]
    fn generic_function_signature_parses() {
        let (count, errors) = parse("fn id<T>(x: T) -> T { return x }");
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(count, "1");
    }

    #[test]
    fn try_postfix_parses() {
        let buf = SourceBuffer::new("test.home", "read()?".to_string());
        let (tokens, _) = Lexer::new(&buf).tokenize();
        let arena = Bump::new();
        let mut parser = Parser::new(&arena, tokens);
        let expr = parser.parse_expr().expect("expr parses");
        assert!(matches!(expr.kind, ExprKind::Try { .. }));
    }

    #[test]
    fn import_path_parses() {
        let (count, errors) = parse("import \"lib/util.home\"");
        assert!(errors.is_empty(), "errors: {:?}", errors);
        assert_eq!(count, "1");
    }
}
