//! Inference errors and their rich rendering.
//!
//! [`InferError`] is what every fallible operation of the analyzer
//! returns. Each variant carries the span of the node the error is
//! about. Errors are never recovered inside the analyzer: the first failure
//! aborts the inference attempt and unwinds to the driver.
//!
//! [`CompileError`] uses miette to render an `InferError` against the
//! source text with the offending node underlined.

use crate::span::Span;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// The ways an inference attempt can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferError {
    #[error("name redefinition: `{name}`")]
    NameRedefinition { name: String, span: Span },

    #[error("undefined name: `{name}`")]
    UndefinedName { name: String, span: Span },

    #[error("`{name}` is not {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        span: Span,
    },

    #[error("expected {expected} {what}, found {found}")]
    Arity {
        what: &'static str,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("value expected")]
    ValueExpected { span: Span },

    #[error("type expected")]
    TypeExpected { span: Span },

    #[error("invalid type: {found}")]
    InvalidType { found: String, span: Span },

    #[error("int literal expected")]
    IntLiteralExpected { span: Span },

    #[error("unresolved type variable: `{name}`")]
    UnresolvedTypeVariable { name: String, span: Span },

    /// Raised when a procedure's return type is demanded while the same
    /// call is already being inferred further up the stack. Drivers may
    /// treat it as "an explicit return type is required here".
    #[error("recursive inference: the return type depends on itself")]
    RecursiveInference { span: Span },

    #[error("not supported: {what}")]
    Unsupported { what: &'static str, span: Span },

    #[error("cannot infer the element type of an empty array literal")]
    EmptyArrayLiteral { span: Span },

    #[error("declaring scope of `{name}` is no longer alive")]
    ScopeClosed { name: String, span: Span },
}

/// Fieldless view of [`InferError`], for matching on the failure alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NameRedefinition,
    UndefinedName,
    KindMismatch,
    Arity,
    TypeMismatch,
    ValueExpected,
    TypeExpected,
    InvalidType,
    IntLiteralExpected,
    UnresolvedTypeVariable,
    RecursiveInference,
    Unsupported,
    EmptyArrayLiteral,
    ScopeClosed,
}

impl InferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InferError::NameRedefinition { .. } => ErrorKind::NameRedefinition,
            InferError::UndefinedName { .. } => ErrorKind::UndefinedName,
            InferError::KindMismatch { .. } => ErrorKind::KindMismatch,
            InferError::Arity { .. } => ErrorKind::Arity,
            InferError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            InferError::ValueExpected { .. } => ErrorKind::ValueExpected,
            InferError::TypeExpected { .. } => ErrorKind::TypeExpected,
            InferError::InvalidType { .. } => ErrorKind::InvalidType,
            InferError::IntLiteralExpected { .. } => ErrorKind::IntLiteralExpected,
            InferError::UnresolvedTypeVariable { .. } => ErrorKind::UnresolvedTypeVariable,
            InferError::RecursiveInference { .. } => ErrorKind::RecursiveInference,
            InferError::Unsupported { .. } => ErrorKind::Unsupported,
            InferError::EmptyArrayLiteral { .. } => ErrorKind::EmptyArrayLiteral,
            InferError::ScopeClosed { .. } => ErrorKind::ScopeClosed,
        }
    }

    /// Location of the node the error is about.
    pub fn span(&self) -> Span {
        match self {
            InferError::NameRedefinition { span, .. }
            | InferError::UndefinedName { span, .. }
            | InferError::KindMismatch { span, .. }
            | InferError::Arity { span, .. }
            | InferError::TypeMismatch { span, .. }
            | InferError::ValueExpected { span }
            | InferError::TypeExpected { span }
            | InferError::InvalidType { span, .. }
            | InferError::IntLiteralExpected { span }
            | InferError::UnresolvedTypeVariable { span, .. }
            | InferError::RecursiveInference { span }
            | InferError::Unsupported { span, .. }
            | InferError::EmptyArrayLiteral { span }
            | InferError::ScopeClosed { span, .. } => *span,
        }
    }

    /// `true` for the recursion control signal, as opposed to an ordinary
    /// type error in user code.
    pub fn is_recursive(&self) -> bool {
        matches!(self, InferError::RecursiveInference { .. })
    }

    fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NameRedefinition => "already defined in this scope",
            ErrorKind::UndefinedName => "not found in scope",
            ErrorKind::KindMismatch => "wrong kind of name",
            ErrorKind::Arity => "wrong number of parameters",
            ErrorKind::TypeMismatch => "type does not match",
            ErrorKind::ValueExpected => "this denotes a type",
            ErrorKind::TypeExpected => "this denotes a value",
            ErrorKind::InvalidType => "type not accepted here",
            ErrorKind::IntLiteralExpected => "must be an integer literal",
            ErrorKind::UnresolvedTypeVariable => "cannot be inferred from the arguments",
            ErrorKind::RecursiveInference => "call is already being inferred",
            ErrorKind::Unsupported => "not supported yet",
            ErrorKind::EmptyArrayLiteral => "empty array literal",
            ErrorKind::ScopeClosed => "scope dropped",
        }
    }
}

/// A compiler error with source location information.
#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,

    #[source_code]
    pub src: String,

    #[label("{label}")]
    pub span: SourceSpan,

    pub label: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>, src: &str, span: Span, label: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            src: src.to_string(),
            span: span.into(),
            label: label.into(),
        }
    }

    /// Attach source text to an inference error for display.
    pub fn from_infer_error(err: &InferError, src: &str) -> Self {
        Self::new(err.to_string(), src, err.span(), err.label())
    }
}
