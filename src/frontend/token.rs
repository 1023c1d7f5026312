//! Token definitions for the didactic language

use std::fmt;

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(span: Span) -> Self {
        Self { kind: TokenKind::Eof, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// print
    Print,
    /// var
    Var,
    /// type
    Type,
    /// for
    For,
    /// if
    If,
    /// else
    Else,
    /// func
    Func,
    /// return
    Return,
    /// struct
    Struct,
    /// int
    IntType,
    /// float
    FloatType,
    /// string
    StringType,
    /// bool
    BoolType,
    /// true
    True,
    /// false
    False,

    // ============ Identifiers and Literals ============
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),

    // ============ Operators ============
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,

    // ============ Delimiters ============
    LParen,
    RParen,
    LBrace,
    RBrace,
    Dot,
    Comma,
    /// `;`, written or inserted at a line end
    Semicolon,

    // ============ Special ============
    /// Something the lexer could not make sense of
    Illegal(String),
    Eof,
}

impl TokenKind {
    /// Convert a keyword string to a token kind
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "print" => Some(TokenKind::Print),
            "var" => Some(TokenKind::Var),
            "type" => Some(TokenKind::Type),
            "for" => Some(TokenKind::For),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "func" => Some(TokenKind::Func),
            "return" => Some(TokenKind::Return),
            "struct" => Some(TokenKind::Struct),
            "int" => Some(TokenKind::IntType),
            "float" => Some(TokenKind::FloatType),
            "string" => Some(TokenKind::StringType),
            "bool" => Some(TokenKind::BoolType),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            _ => None,
        }
    }

    /// A line break after this token terminates the statement
    pub fn ends_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::IntLit(_)
                | TokenKind::FloatLit(_)
                | TokenKind::StringLit(_)
                | TokenKind::RParen
                | TokenKind::RBrace
                | TokenKind::Return
                | TokenKind::IntType
                | TokenKind::FloatType
                | TokenKind::StringType
                | TokenKind::BoolType
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Can this token start a type expression?
    pub fn starts_type(&self) -> bool {
        matches!(
            self,
            TokenKind::IntType
                | TokenKind::FloatType
                | TokenKind::StringType
                | TokenKind::BoolType
                | TokenKind::Ident(_)
                | TokenKind::Func
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Print => "print",
            TokenKind::Var => "var",
            TokenKind::Type => "type",
            TokenKind::For => "for",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Func => "func",
            TokenKind::Return => "return",
            TokenKind::Struct => "struct",
            TokenKind::IntType => "int",
            TokenKind::FloatType => "float",
            TokenKind::StringType => "string",
            TokenKind::BoolType => "bool",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Ident(name) => return write!(f, "identifier {}", name),
            TokenKind::IntLit(v) => return write!(f, "integer {}", v),
            TokenKind::FloatLit(v) => return write!(f, "float {}", v),
            TokenKind::StringLit(s) => return write!(f, "string {:?}", s),
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Illegal(s) => return write!(f, "illegal {:?}", s),
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", s)
    }
}
