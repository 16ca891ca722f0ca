//! Caller identity extraction.
//!
//! Credentials are verified by the gateway in front of the service, which
//! forwards the resolved identity as headers. Handlers receive a
//! [`CallerIdentity`] and hand the inner [`Caller`] to the access gate.

use axum::{extract::FromRequestParts, http::request::Parts};
use biblio_authz::{Caller, Role};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Resolved caller of the current request.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Caller);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| {
                AppError::unauthorized(format!("header {name} is not valid ASCII"))
                    .with_code("invalid_identity")
            }),
    }
}

/// Build a caller from the identity headers.
///
/// No user id means anonymous. A user id without a role header is a patron.
pub fn caller_from_parts(parts: &Parts) -> Result<Caller, AppError> {
    let Some(user_id) = header(parts, USER_ID_HEADER)? else {
        return Ok(Caller::Anonymous);
    };

    let role = match header(parts, USER_ROLE_HEADER)? {
        None => Role::Patron,
        Some(raw) => Role::parse(raw).ok_or_else(|| {
            AppError::unauthorized(format!("unrecognised role '{raw}'"))
                .with_code("invalid_identity")
        })?,
    };

    Ok(Caller::Authenticated {
        user_id: user_id.to_string(),
        role,
    })
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_parts(parts).map(CallerIdentity)
    }
}
