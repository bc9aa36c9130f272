//! Error types for the search subsystem

use thiserror::Error;
use vortikal_core::CoreError;

/// Result type alias for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    /// Malformed request or predicate (negative cursor/limit, empty child
    /// list, value of the wrong type, unknown property)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation cannot be honored (e.g. multi-field or
    /// descending sort for streaming iteration)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The index failed while compiling or executing a query
    #[error("Query failed while {context}: {source}")]
    Query {
        context: String,
        #[source]
        source: tantivy::TantivyError,
    },

    /// The authorization token is not known to the principal resolver
    #[error("Invalid authorization token")]
    InvalidToken,

    /// The on-disk index was written with a different schema
    #[error("Schema mismatch: index has {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },

    /// The search index is not ready (never committed or corrupted record)
    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Repository model validation error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SearchError {
    /// Wrap an index failure with the operation that was running
    pub fn query(context: impl Into<String>, source: impl Into<tantivy::TantivyError>) -> Self {
        Self::Query {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns the error type string (for JSON responses)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Unsupported(_) => "UNSUPPORTED_OPERATION",
            Self::Query { .. } => "QUERY_ERROR",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::IndexNotReady(_) => "INDEX_NOT_READY",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Core(_) => "INVALID_MODEL",
        }
    }

    /// Returns whether the error is transient and can be retried
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IndexNotReady(_)
                | Self::Query {
                    source: tantivy::TantivyError::IoError(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_query_error() -> SearchError {
        SearchError::query("loading documents", std::io::Error::other("disk gone"))
    }

    #[test]
    fn error_type_mapping() {
        let cases: Vec<(SearchError, &str)> = vec![
            (
                SearchError::InvalidArgument("cursor".into()),
                "INVALID_ARGUMENT",
            ),
            (
                SearchError::Unsupported("descending".into()),
                "UNSUPPORTED_OPERATION",
            ),
            (io_query_error(), "QUERY_ERROR"),
            (SearchError::InvalidToken, "INVALID_TOKEN"),
            (
                SearchError::SchemaMismatch {
                    expected: "a".into(),
                    found: "b".into(),
                },
                "SCHEMA_MISMATCH",
            ),
            (SearchError::IndexNotReady("x".into()), "INDEX_NOT_READY"),
            (
                SearchError::Core(CoreError::InvalidPath("x".into())),
                "INVALID_MODEL",
            ),
        ];
        for (err, expected) in &cases {
            assert_eq!(
                err.error_type(),
                *expected,
                "Error {err:?} should map to {expected}"
            );
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(io_query_error().is_retryable());
        assert!(SearchError::IndexNotReady("x".into()).is_retryable());

        assert!(!SearchError::InvalidArgument("x".into()).is_retryable());
        assert!(!SearchError::Unsupported("x".into()).is_retryable());
        assert!(!SearchError::InvalidToken.is_retryable());
        assert!(
            !SearchError::query(
                "parsing",
                tantivy::TantivyError::InvalidArgument("x".into())
            )
            .is_retryable()
        );
    }

    #[test]
    fn query_error_keeps_source() {
        let err = io_query_error();
        assert!(err.to_string().contains("loading documents"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn conversions() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        assert!(matches!(
            SearchError::from(json_err),
            SearchError::Serialization(_)
        ));
        let core: SearchError = CoreError::InvalidPrincipal("x".into()).into();
        assert_eq!(core.error_type(), "INVALID_MODEL");
    }
}
