//! Current-user profile endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::auth::AuthState;
use super::auth::principal::require_auth;
use super::auth::types::SessionResponse;

/// Profile of the authenticated caller.
///
/// Any pending renewal cookie from silent renewal is applied to the
/// response, per the validator contract.
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Authenticated caller profile", body = SessionResponse),
        (status = 401, description = "No active session")
    ),
    tag = "me"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match require_auth(&headers, &pool, &auth_state).await {
        Ok((principal, renewed_cookie)) => {
            let mut response_headers = HeaderMap::new();
            if let Some(cookie) = renewed_cookie {
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

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, NoopRateLimiter};
    use super::*;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn me_requires_a_session() -> Result<()> {
        let config = AuthConfig::new(
            "https://sesio.dev".to_string(),
            SecretString::from("test-secret-0123456789-0123456789".to_string()),
        );
        let state = Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)));
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = me(HeaderMap::new(), Extension(pool), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
