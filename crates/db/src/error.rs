//! Error types for store operations.

use thiserror::Error;

/// Errors raised by a [`crate::CatalogStore`] backend.
///
/// Precondition failures are not errors; they are reported through
/// [`crate::WriteResult::PreconditionFailed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not serve the request (connection lost, contention timeout).
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The configured endpoint names a backend this build does not ship.
    #[error("unsupported database endpoint: {endpoint}")]
    UnsupportedEndpoint { endpoint: String },
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
