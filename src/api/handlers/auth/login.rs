//! Credential login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{issue_session, session_cookie_headers};
use super::state::AuthState;
use super::storage::{UserRecord, lookup_user_by_email, lookup_user_by_username};
use super::types::{LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, normalize_email, verify_password};

/// One uniform rejection for unknown users and bad passwords.
const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Verify credentials and start a session.
///
/// The identifier may be a username or an email; `@` decides which.
/// On success both session cookies are set and the pair is echoed in
/// the body for non-browser clients.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let identifier = request.username_or_email.trim().to_string();
    if identifier.is_empty() || request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, INVALID_CREDENTIALS.to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let lookup = if identifier.contains('@') {
        let email = normalize_email(&identifier);
        if auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::Login)
            == RateLimitDecision::Limited
        {
            return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
        }
        lookup_user_by_email(&pool, &email).await
    } else {
        lookup_user_by_username(&pool, &identifier).await
    };

    let user: UserRecord = match lookup {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, INVALID_CREDENTIALS.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup login user: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    if !verify_password(&request.password, &user.password_hash) {
        return (StatusCode::BAD_REQUEST, INVALID_CREDENTIALS.to_string()).into_response();
    }

    let pair = match issue_session(&auth_state, user.id) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to issue session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };
    let response_headers = match session_cookie_headers(&auth_state, &pair) {
        Ok(headers) => headers,
        Err(err) => {
            error!("Failed to build session cookies: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    let body = LoginResponse {
        message: "Login successful".to_string(),
        access: pair.access,
        refresh: pair.refresh,
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}
