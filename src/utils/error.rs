//! Error handling for the didactic compiler

use crate::utils::Span;
use serde::Serialize;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which pipeline stage an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Syntax,
    Resolution,
    Type,
    Compile,
    Io,
}

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Syntax Errors ====================

    #[error("syntax error: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("syntax error: {message}")]
    Syntax { message: String, span: Span },

    // ==================== Resolution Errors ====================

    #[error("resolver: identifier {name:?} is not defined")]
    UndefinedIdentifier { name: String, span: Span },

    #[error("resolver: type {name:?} is not defined")]
    UndefinedType { name: String, span: Span },

    #[error("resolver: identifier {name:?} already defined in scope")]
    DuplicateDefinition { name: String, span: Span },

    #[error("resolver: identifier {name:?} would shadow an existing identifier")]
    IllegalShadowing { name: String, span: Span },

    #[error("resolver: function {name:?} already prototyped")]
    DuplicatePrototype { name: String, span: Span },

    #[error("resolver: {what} declarations are only allowed at top level")]
    NestedDeclaration { what: &'static str, span: Span },

    // ==================== Type Errors ====================

    #[error("type error: {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: String,
        expected: String,
        got: String,
        span: Span,
    },

    #[error("type error: operator {op} does not support type {ty}")]
    UnsupportedOperator { op: String, ty: String, span: Span },

    #[error("type error: can not print value of type {ty}")]
    NotPrintable { ty: String, span: Span },

    #[error("type error: non-bool condition (type {got}) used in {construct} statement")]
    NonBoolCondition {
        construct: &'static str,
        got: String,
        span: Span,
    },

    #[error("type error: selecting field {field:?} on non-struct type {ty}")]
    NotAStruct { field: String, ty: String, span: Span },

    #[error("type error: {field:?} is not a field of {ty}")]
    UnknownField { field: String, ty: String, span: Span },

    #[error("type error: struct field {field:?} must have a basic type, got {ty}")]
    InvalidFieldType { field: String, ty: String, span: Span },

    #[error("type error: {name:?} is not a value")]
    NotAValue { name: String, span: Span },

    #[error("type error: {name:?} is not assignable")]
    NotAssignable { name: String, span: Span },

    #[error("type error: {callee} of type {ty} is not a function")]
    NotCallable { callee: String, ty: String, span: Span },

    #[error("type error: function takes an argument of type {expected}, none was provided")]
    MissingArgument { expected: String, span: Span },

    #[error("type error: function takes no argument, got one of type {got}")]
    UnexpectedArgument { got: String, span: Span },

    #[error("type error: function {name:?}: prototype and definition differ in signature")]
    SignatureMismatch { name: String, span: Span },

    #[error("type error: function {name:?} is missing a return statement at the end")]
    MissingReturn { name: String, span: Span },

    #[error("type error: return statement outside of function")]
    ReturnOutsideFunction { span: Span },

    // ==================== Code Generation Errors ====================

    #[error("compile error: no more {class} registers available")]
    RegisterExhausted { class: &'static str },

    #[error("compile error: {0}")]
    CodeGen(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. }
            | Self::Syntax { span, .. }
            | Self::UndefinedIdentifier { span, .. }
            | Self::UndefinedType { span, .. }
            | Self::DuplicateDefinition { span, .. }
            | Self::IllegalShadowing { span, .. }
            | Self::DuplicatePrototype { span, .. }
            | Self::NestedDeclaration { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::UnsupportedOperator { span, .. }
            | Self::NotPrintable { span, .. }
            | Self::NonBoolCondition { span, .. }
            | Self::NotAStruct { span, .. }
            | Self::UnknownField { span, .. }
            | Self::InvalidFieldType { span, .. }
            | Self::NotAValue { span, .. }
            | Self::NotAssignable { span, .. }
            | Self::NotCallable { span, .. }
            | Self::MissingArgument { span, .. }
            | Self::UnexpectedArgument { span, .. }
            | Self::SignatureMismatch { span, .. }
            | Self::MissingReturn { span, .. }
            | Self::ReturnOutsideFunction { span } => Some(*span),
            Self::RegisterExhausted { .. } | Self::CodeGen(_) | Self::Io(_) => None,
        }
    }

    /// The pipeline stage that produced this error
    pub fn category(&self) -> Category {
        match self {
            Self::UnexpectedToken { .. } | Self::Syntax { .. } => Category::Syntax,
            Self::UndefinedIdentifier { .. }
            | Self::UndefinedType { .. }
            | Self::DuplicateDefinition { .. }
            | Self::IllegalShadowing { .. }
            | Self::DuplicatePrototype { .. }
            | Self::NestedDeclaration { .. } => Category::Resolution,
            Self::RegisterExhausted { .. } | Self::CodeGen(_) => Category::Compile,
            Self::Io(_) => Category::Io,
            _ => Category::Type,
        }
    }

    /// Build a serializable diagnostic for structured output
    pub fn diagnostic(&self) -> Diagnostic {
        let span = self.span();
        Diagnostic {
            category: self.category(),
            message: self.to_string(),
            line: span.map(|s| s.line),
            column: span.map(|s| s.column),
        }
    }
}

/// Machine-readable form of an [`Error`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let span = Span::new(0, 1, 1, 1);
        assert_eq!(
            Error::UndefinedIdentifier { name: "x".into(), span }.category(),
            Category::Resolution
        );
        assert_eq!(
            Error::ReturnOutsideFunction { span }.category(),
            Category::Type
        );
        assert_eq!(Error::RegisterExhausted { class: "general" }.category(), Category::Compile);
    }

    #[test]
    fn test_diagnostic_json() {
        let err = Error::DuplicateDefinition { name: "x".into(), span: Span::new(4, 5, 2, 5) };
        let json = serde_json::to_value(err.diagnostic()).unwrap();
        assert_eq!(json["category"], "resolution");
        assert_eq!(json["line"], 2);
        assert_eq!(json["column"], 5);
        assert_eq!(json["message"], "resolver: identifier \"x\" already defined in scope");
    }
}
