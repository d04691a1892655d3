//! Service layer error types
//!
//! Presence operations themselves never fail (every effect is best-effort and
//! reported in a [`SyncReport`](super::SyncReport)); this type covers wiring
//! and input validation around them.

use presence_common::AppError;
use presence_core::DomainError;

/// Service layer error type
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Domain rule violation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Application error (configuration, infrastructure)
    #[error(transparent)]
    App(#[from] AppError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ServiceError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Get the error code for logs
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => AppError::Domain(e),
            ServiceError::App(e) => e,
            ServiceError::Validation(msg) => AppError::Validation(msg),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
