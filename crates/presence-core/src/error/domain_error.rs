//! Domain errors - error types for the domain layer and the store ports

use thiserror::Error;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid {kind}: {reason}")]
    InvalidIdentifier { kind: &'static str, reason: String },

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Store connection closed")]
    ConnectionClosed,

    #[error("Store rejected write to {path}: {reason}")]
    WriteRejected { path: String, reason: String },

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            kind,
            reason: reason.into(),
        }
    }

    /// Get an error code string for logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::WriteRejected { .. } => "WRITE_REJECTED",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Subscription(_) => "SUBSCRIPTION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error came from the store side (network, backend, closed connection)
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::WriteRejected { .. }
                | Self::Unsupported(_)
                | Self::Subscription(_)
                | Self::DatabaseError(_)
                | Self::CacheError(_)
        )
    }
}
