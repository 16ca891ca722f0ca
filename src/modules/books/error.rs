use biblio_authz::{AuthzError, Operation, Role};
use biblio_db::{BookId, StoreError};
use biblio_http::error::AppError;
use serde_json::json;
use thiserror::Error;

/// Failures of lending, review, and catalog operations.
///
/// Every variant is detected before any mutation is committed, except
/// `StoreUnavailable` which reports the store failing underneath us.
#[derive(Debug, Error)]
pub enum LendingError {
    #[error("book {book_id} not found")]
    NotFound { book_id: BookId },

    #[error("authentication required for {operation}")]
    Unauthenticated { operation: Operation },

    #[error("role {role} may not perform {operation}")]
    Forbidden { operation: Operation, role: Role },

    #[error("book {book_id} is already checked out")]
    AlreadyCheckedOut { book_id: BookId },

    #[error("book {book_id} is not checked out")]
    BadState { book_id: BookId },

    /// Lost the conditional-write race on every attempt.
    #[error("book {book_id} changed concurrently {attempts} times; giving up")]
    Conflict { book_id: BookId, attempts: u32 },

    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("catalog store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl LendingError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }
}

impl From<AuthzError> for LendingError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated { operation } => Self::Unauthenticated { operation },
            AuthzError::Forbidden { operation, role } => Self::Forbidden { operation, role },
        }
    }
}

impl From<LendingError> for AppError {
    fn from(err: LendingError) -> Self {
        let message = err.to_string();
        match err {
            LendingError::NotFound { .. } => AppError::not_found(message),
            LendingError::Unauthenticated { .. } => AppError::unauthorized(message),
            LendingError::Forbidden { .. } => AppError::forbidden(message),
            LendingError::AlreadyCheckedOut { book_id } => {
                AppError::conflict(vec![json!({ "book_id": book_id })], message)
                    .with_code("already_checked_out")
            }
            LendingError::BadState { .. } => AppError::bad_request(message).with_code("bad_state"),
            LendingError::Conflict { book_id, attempts } => AppError::conflict(
                vec![json!({ "book_id": book_id, "attempts": attempts })],
                message,
            ),
            LendingError::InvalidArgument { field, reason } => {
                AppError::validation(vec![json!({ "field": field, "error": reason })], message)
            }
            LendingError::StoreUnavailable(source) => {
                tracing::error!(error = %source, "catalog store failure");
                AppError::service_unavailable(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    fn status(err: LendingError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(status(LendingError::NotFound { book_id: 1 }), StatusCode::NOT_FOUND);
        assert_eq!(
            status(LendingError::Unauthenticated {
                operation: Operation::Checkout
            }),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(LendingError::Forbidden {
                operation: Operation::Return,
                role: Role::Patron
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(LendingError::AlreadyCheckedOut { book_id: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(LendingError::BadState { book_id: 1 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(LendingError::Conflict {
                book_id: 1,
                attempts: 3
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(LendingError::invalid("rating", "must be between 1 and 5")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(LendingError::StoreUnavailable(StoreError::unavailable("down"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn authz_errors_keep_their_kind() {
        let err: LendingError = AuthzError::Forbidden {
            operation: Operation::Return,
            role: Role::Patron,
        }
        .into();
        assert!(matches!(err, LendingError::Forbidden { .. }));
    }
}
