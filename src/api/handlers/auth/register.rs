//! Account registration endpoint.

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
use super::storage::{SignupOutcome, insert_user};
use super::types::{MessageResponse, RegisterRequest};
use super::utils::{extract_client_ip, hash_password, normalize_email, valid_email, valid_username};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Create an identity and start its first session.
///
/// On success both session cookies are set and a `201` is returned;
/// username and email conflicts come back as distinct `409` messages.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered and session started", body = MessageResponse),
        (status = 400, description = "Invalid username, email, or password", body = String),
        (status = 409, description = "Username or email already in use", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim().to_string();
    let email = normalize_email(&request.email);
    if !valid_username(&username) {
        return (StatusCode::BAD_REQUEST, "Invalid username".to_string()).into_response();
    }
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response();
        }
    };

    match insert_user(&pool, &username, &email, &password_hash).await {
        Ok(SignupOutcome::Created(user_id)) => {
            let pair = match issue_session(&auth_state, user_id) {
                Ok(pair) => pair,
                Err(err) => {
                    error!("Failed to issue session: {err}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Registration failed".to_string(),
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
                        "Registration failed".to_string(),
                    )
                        .into_response();
                }
            };
            let body = MessageResponse {
                message: "User registered successfully".to_string(),
            };
            (StatusCode::CREATED, response_headers, Json(body)).into_response()
        }
        Ok(SignupOutcome::UsernameTaken) => (
            StatusCode::CONFLICT,
            "This username is already taken.".to_string(),
        )
            .into_response(),
        Ok(SignupOutcome::EmailTaken) => (
            StatusCode::CONFLICT,
            "This email is already registered.".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to register user: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            "https://sesio.dev".to_string(),
            SecretString::from("test-secret-0123456789-0123456789".to_string()),
        );
        Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let response = register(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let response = register(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                username: "alice".to_string(),
                email: "not-an-email".to_string(),
                password: "correct-horse".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_short_password() -> Result<()> {
        let response = register(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_username_with_at_sign() -> Result<()> {
        let response = register(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                username: "alice@home".to_string(),
                email: "alice@example.com".to_string(),
                password: "correct-horse".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
