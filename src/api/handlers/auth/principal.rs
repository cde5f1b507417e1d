//! Authenticated principal extraction for collaborator handlers.
//!
//! Flow Overview: read the session cookies, resolve them to a user, and
//! return a principal plus the pending renewal cookie (if silent renewal
//! fired) that the calling handler must attach to its response.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use sqlx::PgPool;

use super::session::authenticate;
use super::state::AuthState;

/// Authenticated user context derived from the session cookies.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

/// Resolve the session cookies into a principal, or 401 when anonymous.
///
/// The second tuple element is the pending `Set-Cookie` update from
/// silent renewal; callers are required to apply it to their response.
///
/// # Errors
/// `401` for anonymous requests, `500` when the backing store fails.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<(Principal, Option<HeaderValue>), StatusCode> {
    let outcome = authenticate(headers, pool, state).await?;
    match outcome.principal {
        Some(principal) => Ok((principal, outcome.renewed_access)),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}
