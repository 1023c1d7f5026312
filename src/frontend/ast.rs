//! Abstract Syntax Tree definitions for the didactic language
//!
//! The parser produces the tree with every `scope` unset and every
//! expression typed `Unknown`. The resolver fills in the scopes, the checker
//! fills in the types and selector offsets.

use crate::frontend::symbol::ScopeId;
use crate::types::Type;
use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub scope: Option<ScopeId>,
}

/// Identifier with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

/// A type as written in the source
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Int,
    Float,
    String,
    Bool,
    /// A struct declared with `type`
    Named(Ident),
    /// `func(param) result`
    Func {
        param: Option<Box<TypeExpr>>,
        result: Option<Box<TypeExpr>>,
    },
    /// `struct { ... }`, only on the right of a `type` declaration
    Struct(Vec<FieldDecl>),
}

/// Struct field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// Code block, owning its own scope
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub scope: Option<ScopeId>,
    pub span: Span,
}

/// Function parameter. Prototypes may leave it unnamed.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

/// Function declaration; a prototype when `body` is `None`
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Ident,
    pub param: Option<Param>,
    pub result: Option<TypeExpr>,
    pub body: Option<Block>,
    /// Scope holding the parameter, parent of the body's scope
    pub scope: Option<ScopeId>,
    pub span: Span,
}

impl Function {
    /// The signature as written, used as the symbol's pending type
    pub fn signature_expr(&self) -> TypeExpr {
        TypeExpr::Func {
            param: self.param.as_ref().map(|p| Box::new(p.ty.clone())),
            result: self.result.clone().map(Box::new),
        }
    }
}

/// `for init; cond; next { body }`
#[derive(Debug, Clone)]
pub struct ForLoop {
    pub init: Box<Stmt>,
    pub cond: Expr,
    pub next: Box<Stmt>,
    pub body: Block,
    pub scope: Option<ScopeId>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    /// print expr
    Print { value: Expr, span: Span },
    /// var name type [= expr]
    Var {
        name: Ident,
        ty: TypeExpr,
        value: Option<Expr>,
        span: Span,
    },
    /// target = expr
    Assign { target: Expr, value: Expr, span: Span },
    Block(Block),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    For(ForLoop),
    /// type name struct { ... }
    Type { name: Ident, ty: TypeExpr, span: Span },
    Func(Function),
    /// return [expr]
    Return { value: Option<Expr>, span: Span },
    /// Expression statement
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Print { span, .. }
            | Stmt::Var { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Type { span, .. }
            | Stmt::Return { span, .. } => *span,
            Stmt::Block(block) => block.span,
            Stmt::For(for_loop) => for_loop.span,
            Stmt::Func(func) => func.span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Eq,
    Ne,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Eq | BinOp::Ne)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }
}

/// Expression kinds
#[derive(Debug, Clone)]
pub enum ExprKind {
    Ident(Ident),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// Function call with at most one argument
    Call {
        callee: Box<Expr>,
        arg: Option<Box<Expr>>,
    },
    /// Field access (expr.field); `offset` is set by the checker
    Selector {
        base: Box<Expr>,
        field: Ident,
        offset: usize,
    },
}

/// Expression, annotated with its type once checked
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, ty: Type::Unknown, span }
    }

    /// Does evaluating this expression call a function?
    pub fn contains_call(&self) -> bool {
        match &self.kind {
            ExprKind::Call { .. } => true,
            ExprKind::Binary { left, right, .. } => left.contains_call() || right.contains_call(),
            ExprKind::Selector { base, .. } => base.contains_call(),
            ExprKind::Ident(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_) => false,
        }
    }

    /// Short source-like rendering for error messages
    pub fn describe(&self) -> String {
        match &self.kind {
            ExprKind::Ident(id) => id.name.clone(),
            ExprKind::Selector { base, field, .. } => format!("{}.{}", base.describe(), field.name),
            ExprKind::Call { callee, .. } => format!("{}(...)", callee.describe()),
            _ => "expression".to_string(),
        }
    }
}
