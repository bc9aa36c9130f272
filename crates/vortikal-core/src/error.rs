//! Error types for the repository model

use thiserror::Error;

/// Result type alias for repository model operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised while constructing or validating repository model values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Invalid property key: {0}")]
    InvalidPropertyKey(String),

    #[error("Value type mismatch for {key}: expected {expected}, got {actual}")]
    ValueTypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Property {0} has no values")]
    EmptyProperty(String),

    #[error("Property {0} does not accept multiple values")]
    MultipleValuesNotAllowed(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Duplicate resource type: {0}")]
    DuplicateResourceType(String),
}

impl CoreError {
    /// Returns the error type string (for JSON responses)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::InvalidPrincipal(_) => "INVALID_PRINCIPAL",
            Self::InvalidPropertyKey(_) => "INVALID_PROPERTY_KEY",
            Self::ValueTypeMismatch { .. } => "VALUE_TYPE_MISMATCH",
            Self::EmptyProperty(_) => "EMPTY_PROPERTY",
            Self::MultipleValuesNotAllowed(_) => "MULTIPLE_VALUES_NOT_ALLOWED",
            Self::UnknownResourceType(_) => "UNKNOWN_RESOURCE_TYPE",
            Self::DuplicateResourceType(_) => "DUPLICATE_RESOURCE_TYPE",
        }
    }
}
