//! Token lifecycle tests over the public API.
//!
//! These run without a database: the unreachable-pool cases use a short
//! acquire timeout to exercise the store-failure paths deterministically.

use anyhow::Result;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE};
use axum::response::IntoResponse;
use secrecy::SecretString;
use sesio::api::handlers::auth::token::TokenKind;
use sesio::api::handlers::auth::{AuthConfig, AuthState, NoopRateLimiter, session};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

fn auth_state() -> Arc<AuthState> {
    let config = AuthConfig::new(
        "https://sesio.dev".to_string(),
        SecretString::from("integration-secret-0123456789abcdef".to_string()),
    );
    Arc::new(AuthState::new(config, Arc::new(NoopRateLimiter)))
}

fn unreachable_pool() -> Result<sqlx::PgPool> {
    // Port 1 answers nothing; acquire fails fast.
    Ok(PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://postgres@127.0.0.1:1/nowhere")?)
}

fn cookie_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::COOKIE,
        HeaderValue::from_str(value).expect("cookie header"),
    );
    headers
}

#[test]
fn issued_tokens_carry_configured_ttls() -> Result<()> {
    let state = auth_state();
    let access = state.codec().issue(
        7,
        TokenKind::Access,
        state.config().access_ttl_seconds(),
    )?;
    let refresh = state.codec().issue(
        7,
        TokenKind::Refresh,
        state.config().refresh_ttl_seconds(),
    )?;

    let access = state
        .codec()
        .verify(&access, TokenKind::Access)
        .map_err(|err| anyhow::anyhow!(err))?;
    let refresh = state
        .codec()
        .verify(&refresh, TokenKind::Refresh)
        .map_err(|err| anyhow::anyhow!(err))?;

    assert_eq!(access.exp - access.iat, 86_400);
    assert_eq!(refresh.exp - refresh.iat, 604_800);
    assert_eq!(access.sub, refresh.sub);
    Ok(())
}

#[tokio::test]
async fn logout_succeeds_even_when_the_store_is_down() -> Result<()> {
    let state = auth_state();
    let refresh = state.codec().issue(
        7,
        TokenKind::Refresh,
        state.config().refresh_ttl_seconds(),
    )?;
    let headers = cookie_headers(&format!("refresh_token={refresh}"));

    // The revocation write fails against the dead pool; the client still
    // gets a clean 204 with both cookies cleared.
    let response = session::logout(headers, Extension(unreachable_pool()?), Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
    assert_eq!(cookies.len(), 2);
    Ok(())
}

#[tokio::test]
async fn store_failure_during_renewal_is_a_server_error_not_anonymous() -> Result<()> {
    let state = auth_state();
    let expired_access = state.codec().issue(7, TokenKind::Access, -10)?;
    let refresh = state.codec().issue(
        7,
        TokenKind::Refresh,
        state.config().refresh_ttl_seconds(),
    )?;
    let headers = cookie_headers(&format!(
        "access_token={expired_access}; refresh_token={refresh}"
    ));

    let response = session::session(headers, Extension(unreachable_pool()?), Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn refresh_endpoint_maps_store_failure_to_server_error() -> Result<()> {
    let state = auth_state();
    let refresh = state.codec().issue(
        7,
        TokenKind::Refresh,
        state.config().refresh_ttl_seconds(),
    )?;
    let headers = cookie_headers(&format!("refresh_token={refresh}"));

    let response = session::refresh(headers, Extension(unreachable_pool()?), Extension(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}
