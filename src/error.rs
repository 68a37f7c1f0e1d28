//! Error types for the compiler pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte-offset range into the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    /// Failed to parse the query text.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Wrong number of arguments or parameters to a function.
    #[error("{message}")]
    Arity {
        message: String,
        span: Option<Span>,
    },

    /// A name could not be bound to a field, table, alias or CTE.
    #[error("{message}")]
    Resolution {
        message: String,
        span: Option<Span>,
    },

    /// No declared signature matches the argument types of a call.
    #[error("{message}")]
    Overload {
        message: String,
        span: Option<Span>,
    },

    /// A value-type level operation is unsupported.
    #[error("{message}")]
    Type {
        message: String,
        span: Option<Span>,
    },

    /// Invalid parametric signature declaration. Raised while building the
    /// function registry, before any query is compiled.
    #[error("Generic signature error: {0}")]
    Generics(String),

    /// A node reached a component that has no handler for it. Indicates a
    /// compiler bug, not a user error.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {message}")]
    NotImplemented {
        message: String,
        span: Option<Span>,
    },
}

impl QueryError {
    /// Create a parse error at the given byte position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn arity(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Arity {
            message: message.into(),
            span,
        }
    }

    pub fn resolution(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Resolution {
            message: message.into(),
            span,
        }
    }

    pub fn overload(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Overload {
            message: message.into(),
            span,
        }
    }

    pub fn type_error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Type {
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The source span this error points at, if one was recorded.
    pub fn span(&self) -> Option<Span> {
        match self {
            QueryError::Parse { position, .. } => Some(Span::new(*position, *position)),
            QueryError::Arity { span, .. }
            | QueryError::Resolution { span, .. }
            | QueryError::Overload { span, .. }
            | QueryError::Type { span, .. }
            | QueryError::NotImplemented { span, .. } => *span,
            QueryError::Generics(_) | QueryError::Internal(_) => None,
        }
    }
}

/// Result type alias for compiler operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = QueryError::parse(12, "unexpected token");
        assert_eq!(err.to_string(), "Parse error at position 12: unexpected token");
        assert_eq!(err.span(), Some(Span::new(12, 12)));
    }

    #[test]
    fn test_resolution_error_carries_span() {
        let err = QueryError::resolution("Unable to resolve field: foo", Some(Span::new(7, 10)));
        assert_eq!(err.span(), Some(Span::new(7, 10)));
        assert_eq!(err.to_string(), "Unable to resolve field: foo");
    }
}
