//! Abstract syntax tree.
//!
//! Nodes are allocated out of a per-compilation `bumpalo::Bump` arena. A
//! node owns its immediate structure but never owns its children: children
//! are `&'a` references into the same arena, so the whole tree (and every
//! token lexeme it borrows from the source buffer) is dropped in one step
//! when the arena is dropped.

use crate::source::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Ref,
    RefMut,
}

/// A parsed, not-yet-resolved type annotation (`int`, `&T`, `Foo`, ...).
/// Kept as an ordinary owned value rather than arena-allocated: it is
/// small, short-lived within the checker, and does not need arena sharing.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAnn {
    Named(String),
    Reference(Box<TypeAnn>),
    MutableReference(Box<TypeAnn>),
    Result(Box<TypeAnn>, Box<TypeAnn>),
}

#[derive(Debug, Clone)]
pub struct GenericParam {
    pub name: String,
    pub bounds: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeAnn,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: TypeAnn,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<StructField>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
    pub name: String,
    pub payload: Vec<TypeAnn>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpec {
    /// `import "relative/path.home"`
    Path(String),
    /// `import std:name` — accepted syntactically; the resolver treats it
    /// the same as an unresolvable external reference since there is no
    /// embedded stdlib in this scope.
    Std(String),
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub spec: ImportSpec,
    pub location: SourceLocation,
}

/// Expression node. Child expressions are arena references so a `Binary`
/// node can point at sub-expressions allocated earlier in the same parse
/// without any reference counting.
#[derive(Debug, Clone)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum ExprKind<'a> {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    Identifier(String),
    Binary {
        op: BinOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Unary {
        op: UnOp,
        operand: &'a Expr<'a>,
    },
    Call {
        callee: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    },
    FieldAccess {
        base: &'a Expr<'a>,
        field: String,
    },
    /// The postfix `?` operator.
    Try {
        operand: &'a Expr<'a>,
    },
    Await {
        operand: &'a Expr<'a>,
    },
    Block(&'a Block<'a>),
}

/// A brace-delimited sequence of statements plus an optional trailing
/// expression whose value is the block's value.
#[derive(Debug, Clone)]
pub struct Block<'a> {
    pub stmts: &'a [&'a Stmt<'a>],
    pub tail: Option<&'a Expr<'a>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum StmtKind<'a> {
    LetDecl {
        name: String,
        ty: Option<TypeAnn>,
        init: Option<&'a Expr<'a>>,
        mutable: bool,
        comptime: bool,
    },
    FnDecl(&'a FnDecl<'a>),
    StructDecl(StructDecl),
    EnumDecl(EnumDecl),
    ImportDecl(ImportDecl),
    Return(Option<&'a Expr<'a>>),
    If {
        cond: &'a Expr<'a>,
        then_branch: &'a Block<'a>,
        else_branch: Option<&'a Block<'a>>,
    },
    While {
        cond: &'a Expr<'a>,
        body: &'a Block<'a>,
    },
    Loop {
        body: &'a Block<'a>,
    },
    Block(&'a Block<'a>),
    Expr(&'a Expr<'a>),
}

#[derive(Debug, Clone)]
pub struct FnDecl<'a> {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeAnn>,
    pub body: &'a Block<'a>,
    pub is_test: bool,
    pub is_async: bool,
    pub location: SourceLocation,
}

/// The root of one compilation unit: an ordered sequence of top-level
/// statements plus the path they came from, for diagnostics.
pub struct Program<'a> {
    pub top_level: &'a [&'a Stmt<'a>],
    pub source_path: std::path::PathBuf,
}

impl<'a> Program<'a> {
    pub fn new(top_level: &'a [&'a Stmt<'a>], source_path: impl Into<std::path::PathBuf>) -> Self {
        Program {
            top_level,
            source_path: source_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    #[test]
    fn binary_expr_references_children_in_arena() {
        let arena = Bump::new();
        let loc = SourceLocation::new(1, 1);
        let one = arena.alloc(Expr {
            kind: ExprKind::IntLiteral(1),
            location: loc,
        });
        let two = arena.alloc(Expr {
            kind: ExprKind::IntLiteral(2),
            location: loc,
        });
        let sum = Expr {
            kind: ExprKind::Binary {
                op: BinOp::Add,
                left: one,
                right: two,
            },
            location: loc,
        };
        match sum.kind {
            ExprKind::Binary { op, left, right } => {
                assert_eq!(op, BinOp::Add);
                assert!(matches!(left.kind, ExprKind::IntLiteral(1)));
                assert!(matches!(right.kind, ExprKind::IntLiteral(2)));
            }
            _ => panic!("expected Binary"),
        }
    }

    #[test]
    fn program_preserves_top_level_order() {
        let arena = Bump::new();
        let loc = SourceLocation::new(1, 1);
        let a = arena.alloc(Stmt {
            kind: StmtKind::Return(None),
            location: loc,
        });
        let b = arena.alloc(Stmt {
            kind: StmtKind::Return(None),
            location: loc,
        });
        let top_level = arena.alloc_slice_copy(&[&*a, &*b]);
        let program = Program::new(top_level, "test.home");
        assert_eq!(program.top_level.len(), 2);
    }
}
