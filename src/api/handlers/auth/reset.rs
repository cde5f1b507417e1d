//! Password recovery: request a code, verify it, reset the credential.
//!
//! Three independent steps correlated only by email. Step 2 is advisory:
//! it checks the latest matching code without consuming anything and may
//! be repeated freely. Step 3 sets the new credential WITHOUT re-checking
//! a code and purges every outstanding code for the identity as a side
//! effect. Steps 2 and 3 are not cryptographically or transactionally
//! linked; that gap is inherited from the upstream flow and is tracked
//! in DESIGN.md rather than silently closed here.
//!
//! Codes live for ten minutes from creation. Requesting a new code does
//! not invalidate older, still-fresh ones.

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
use super::state::AuthState;
use super::storage::{
    insert_reset_code, latest_reset_code_fresh, lookup_user_by_email,
    update_password_and_purge_codes,
};
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, VerifyResetCodeRequest};
use super::utils::{
    extract_client_ip, generate_reset_code, hash_password, normalize_email, valid_email,
};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Issue a six-digit reset code and queue its delivery.
///
/// The code row and its outbox row are written in one transaction, so a
/// code is never acknowledged without a queued notification; actual
/// delivery failures are retried by the outbox worker and never surface
/// here.
#[utoipa::path(
    post,
    path = "/v1/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code queued for delivery", body = MessageResponse),
        (status = 404, description = "Email does not exist", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "recovery"
)]
pub async fn forgot_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::PasswordResetRequest)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::PasswordResetRequest)
            == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Email does not exist".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user for reset: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Reset request failed".to_string(),
            )
                .into_response();
        }
    };

    let code = generate_reset_code();
    if let Err(err) = insert_reset_code(&pool, &user, &code).await {
        error!("Failed to store reset code: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Reset request failed".to_string(),
        )
            .into_response();
    }

    let body = MessageResponse {
        message: "Reset code sent to your email".to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Check a reset code without consuming it.
///
/// Succeeds only when the code matches the identity's most recently
/// created code AND that code is under ten minutes old. Pure read.
#[utoipa::path(
    post,
    path = "/v1/auth/password/verify-code",
    request_body = VerifyResetCodeRequest,
    responses(
        (status = 200, description = "Code is valid", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "recovery"
)]
pub async fn verify_reset_code(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyResetCodeRequest>>,
) -> impl IntoResponse {
    let request: VerifyResetCodeRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    let code = request.code.trim();
    if !valid_email(&email) || code.is_empty() {
        return (StatusCode::BAD_REQUEST, "Invalid email or code".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::PasswordResetVerify)
        == RateLimitDecision::Limited
        || auth_state
            .rate_limiter()
            .check_email(&email, RateLimitAction::PasswordResetVerify)
            == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user for code check: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    };

    let ttl_seconds = auth_state.config().reset_code_ttl_seconds();
    match latest_reset_code_fresh(&pool, user.id, code, ttl_seconds).await {
        Ok(Some(true)) => {
            let body = MessageResponse {
                message: "Code verified successfully".to_string(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Some(false) | None) => (
            StatusCode::BAD_REQUEST,
            "Invalid or expired code".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to check reset code: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response()
        }
    }
}

/// Set a new password and purge every outstanding reset code.
///
/// No code is checked at this step; see the module docs for the flagged
/// verify/reset decoupling.
#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid email or password", body = String),
        (status = 404, description = "Email does not exist", body = String)
    ),
    tag = "recovery"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return (StatusCode::BAD_REQUEST, "Password too short".to_string()).into_response();
    }

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Email does not exist".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to lookup user for password reset: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
    };

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
    };

    if let Err(err) = update_password_and_purge_codes(&pool, user.id, &password_hash).await {
        error!("Failed to reset password: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password reset failed".to_string(),
        )
            .into_response();
    }

    let body = MessageResponse {
        message: "Password reset successful".to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::{AuthConfig, AuthState};
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
    async fn forgot_password_missing_payload() -> Result<()> {
        let response = forgot_password(
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
    async fn forgot_password_rejects_invalid_email() -> Result<()> {
        let response = forgot_password(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(ForgotPasswordRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_reset_code_rejects_empty_code() -> Result<()> {
        let response = verify_reset_code(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(VerifyResetCodeRequest {
                email: "alice@example.com".to_string(),
                code: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_rejects_short_password() -> Result<()> {
        let response = reset_password(
            Extension(lazy_pool()?),
            Some(Json(ResetPasswordRequest {
                email: "alice@example.com".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
