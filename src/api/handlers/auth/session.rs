//! Session issuance, validation, silent renewal, and teardown.
//!
//! Login and registration mint an access/refresh pair delivered as two
//! `HttpOnly` cookies. Every authenticated request passes through
//! [`authenticate`], which collapses all token failures to an anonymous
//! outcome; only backing-store errors surface as 5xx. When the access
//! token has expired but the refresh token is still valid and
//! non-revoked, a new access token (and only the access token) is minted
//! and handed back as a pending `Set-Cookie` value the caller attaches
//! to its response.
//!
//! Cookie policy is uniform across issuance, refresh, and renewal:
//! `Path=/; HttpOnly; SameSite=Lax`, plus `Secure` when the frontend is
//! served over HTTPS.
//!
//! Logout blacklists the refresh token's `jti` only; access tokens
//! already in the wild ride out their short natural expiry.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::principal::Principal;
use super::state::AuthState;
use super::storage::{self, UserRecord};
use super::token::{TokenError, TokenKind};
use super::types::{RefreshResponse, SessionResponse};
use super::utils::extract_cookie;

pub(crate) const ACCESS_COOKIE_NAME: &str = "access_token";
pub(crate) const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Access/refresh pair minted together; both embed the same subject.
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Result of validating one request's cookies.
///
/// `renewed_access` is the pending cookie update from silent renewal;
/// the caller is contractually required to apply it to its outgoing
/// response. It is a value, never request-scoped mutable state.
pub struct AuthOutcome {
    pub principal: Option<Principal>,
    pub renewed_access: Option<HeaderValue>,
}

impl AuthOutcome {
    fn anonymous() -> Self {
        Self {
            principal: None,
            renewed_access: None,
        }
    }

    fn authenticated(user: UserRecord, renewed_access: Option<HeaderValue>) -> Self {
        Self {
            principal: Some(Principal {
                user_id: user.id,
                username: user.username,
                email: user.email,
            }),
            renewed_access,
        }
    }
}

/// Mint an access/refresh pair for a verified identity.
pub(super) fn issue_session(state: &AuthState, subject_id: i64) -> anyhow::Result<TokenPair> {
    let access = state.codec().issue(
        subject_id,
        TokenKind::Access,
        state.config().access_ttl_seconds(),
    )?;
    let refresh = state.codec().issue(
        subject_id,
        TokenKind::Refresh,
        state.config().refresh_ttl_seconds(),
    )?;
    Ok(TokenPair { access, refresh })
}

fn build_cookie(
    state: &AuthState,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if state.config().cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn access_cookie(
    state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        state,
        ACCESS_COOKIE_NAME,
        token,
        state.config().access_ttl_seconds(),
    )
}

pub(super) fn refresh_cookie(
    state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        state,
        REFRESH_COOKIE_NAME,
        token,
        state.config().refresh_ttl_seconds(),
    )
}

fn clear_cookie(state: &AuthState, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(state, name, "", 0)
}

/// Both session cookies as response headers, for login/registration.
pub(super) fn session_cookie_headers(
    state: &AuthState,
    pair: &TokenPair,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, access_cookie(state, &pair.access)?);
    headers.append(SET_COOKIE, refresh_cookie(state, &pair.refresh)?);
    Ok(headers)
}

/// Why a renewal attempt was turned down.
///
/// `Revoked` and `Token(Expired)` are deliberately distinct classes:
/// a blacklisted token must fail as revoked even while unexpired.
#[derive(Debug, thiserror::Error)]
pub(super) enum RenewError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("refresh token revoked")]
    Revoked,
    #[error("unknown subject")]
    UnknownSubject,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Verify a refresh token and mint a new access token for its subject.
///
/// The refresh token itself is not rotated here.
pub(super) async fn renew_access(
    pool: &PgPool,
    state: &AuthState,
    refresh_token: &str,
) -> Result<(UserRecord, String), RenewError> {
    let claims = state.codec().verify(refresh_token, TokenKind::Refresh)?;
    // Expiry alone is not sufficient; the blacklist is always consulted.
    if storage::is_refresh_revoked(pool, claims.jti).await? {
        return Err(RenewError::Revoked);
    }
    let user = storage::lookup_user_by_id(pool, claims.sub)
        .await?
        .ok_or(RenewError::UnknownSubject)?;
    let access = state.codec().issue(
        claims.sub,
        TokenKind::Access,
        state.config().access_ttl_seconds(),
    )?;
    Ok((user, access))
}

/// Resolve a request's cookies to a principal, silently renewing an
/// expired access token from the refresh token when possible.
///
/// Never surfaces token errors to the caller; everything short of a
/// backing-store failure collapses to an anonymous outcome.
///
/// # Errors
/// Returns `500` only when the identity or revocation store fails.
pub(crate) async fn authenticate(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &AuthState,
) -> Result<AuthOutcome, StatusCode> {
    let Some(access) = extract_cookie(headers, ACCESS_COOKIE_NAME) else {
        return Ok(AuthOutcome::anonymous());
    };

    match state.codec().verify(&access, TokenKind::Access) {
        Ok(claims) => match storage::lookup_user_by_id(pool, claims.sub).await {
            Ok(Some(user)) => Ok(AuthOutcome::authenticated(user, None)),
            Ok(None) => {
                // Unknown subject is an authentication failure, not a crash.
                debug!(subject = claims.sub, "access token subject not found");
                Ok(AuthOutcome::anonymous())
            }
            Err(err) => {
                error!("Failed to resolve session subject: {err}");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        Err(TokenError::Expired) => {
            let Some(refresh) = extract_cookie(headers, REFRESH_COOKIE_NAME) else {
                return Ok(AuthOutcome::anonymous());
            };
            match renew_access(pool, state, &refresh).await {
                Ok((user, access_token)) => match access_cookie(state, &access_token) {
                    Ok(cookie) => Ok(AuthOutcome::authenticated(user, Some(cookie))),
                    Err(err) => {
                        // The client keeps its expired cookie and renews again
                        // on the next request.
                        warn!("Failed to build renewed access cookie: {err}");
                        Ok(AuthOutcome::authenticated(user, None))
                    }
                },
                Err(RenewError::Backend(err)) => {
                    error!("Silent renewal failed against the store: {err}");
                    Err(StatusCode::INTERNAL_SERVER_ERROR)
                }
                Err(err) => {
                    debug!("silent renewal rejected: {err}");
                    Ok(AuthOutcome::anonymous())
                }
            }
        }
        Err(err) => {
            debug!("access token rejected: {err}");
            Ok(AuthOutcome::anonymous())
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match authenticate(&headers, &pool, &auth_state).await {
        Ok(outcome) => {
            let Some(principal) = outcome.principal else {
                return StatusCode::NO_CONTENT.into_response();
            };
            let mut response_headers = HeaderMap::new();
            if let Some(cookie) = outcome.renewed_access {
                response_headers.insert(SET_COOKIE, cookie);
            }
            let response = SessionResponse {
                user_id: principal.user_id,
                username: principal.username,
                email: principal.email,
            };
            (StatusCode::OK, response_headers, Json(response)).into_response()
        }
        Err(status) => status.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "New access token issued", body = RefreshResponse),
        (status = 401, description = "Missing, invalid, expired, or revoked refresh token", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.".to_string(),
        )
            .into_response();
    };

    match renew_access(&pool, &auth_state, &token).await {
        Ok((_user, access)) => {
            let mut response_headers = HeaderMap::new();
            match access_cookie(&auth_state, &access) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => warn!("Failed to build access cookie: {err}"),
            }
            (
                StatusCode::OK,
                response_headers,
                Json(RefreshResponse { access }),
            )
                .into_response()
        }
        Err(RenewError::Backend(err)) => {
            error!("Failed to refresh session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            // Revoked vs expired stays internal; callers get one answer.
            debug!("refresh rejected: {err}");
            (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired refresh token.".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Err(err) = storage::revoke_refresh_token(&pool, auth_state.codec(), &token).await {
            // Logout is unconditional from the client's point of view.
            error!("Failed to record logout revocation: {err}");
        }
    }

    // Always clear both cookies, even when no session was present.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_cookie(&auth_state, ACCESS_COOKIE_NAME) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_cookie(&auth_state, REFRESH_COOKIE_NAME) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}
