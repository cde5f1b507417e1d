//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use super::token::TokenCodec;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_RESET_CODE_TTL_SECONDS: i64 = 10 * 60;

/// Process-wide auth configuration, loaded once at startup and injected
/// into [`AuthState`]; nothing here is read from ambient globals.
#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    token_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    reset_code_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String, token_secret: SecretString) -> Self {
        Self {
            frontend_base_url,
            token_secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            reset_code_ttl_seconds: DEFAULT_RESET_CODE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn reset_code_ttl_seconds(&self) -> i64 {
        self.reset_code_ttl_seconds
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    /// Cookies carry `Secure` only when the frontend is served over HTTPS.
    pub(super) fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("token_secret", &"***")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("reset_code_ttl_seconds", &self.reset_code_ttl_seconds)
            .finish()
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let codec = TokenCodec::new(config.token_secret());
        Self {
            config,
            codec,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-secret-0123456789-0123456789".to_string())
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://sesio.dev".to_string(), secret());

        assert_eq!(config.frontend_base_url(), "https://sesio.dev");
        assert_eq!(config.access_ttl_seconds(), DEFAULT_ACCESS_TTL_SECONDS);
        assert_eq!(config.refresh_ttl_seconds(), DEFAULT_REFRESH_TTL_SECONDS);
        assert_eq!(
            config.reset_code_ttl_seconds(),
            DEFAULT_RESET_CODE_TTL_SECONDS
        );

        let config = config
            .with_access_ttl_seconds(120)
            .with_refresh_ttl_seconds(3600)
            .with_reset_code_ttl_seconds(42);

        assert_eq!(config.access_ttl_seconds(), 120);
        assert_eq!(config.refresh_ttl_seconds(), 3600);
        assert_eq!(config.reset_code_ttl_seconds(), 42);
    }

    #[test]
    fn cookie_secure_tracks_frontend_scheme() {
        let https = AuthConfig::new("https://sesio.dev".to_string(), secret());
        let http = AuthConfig::new("http://localhost:5173".to_string(), secret());
        assert!(https.cookie_secure());
        assert!(!http.cookie_secure());
    }

    #[test]
    fn debug_redacts_the_signing_secret() {
        let config = AuthConfig::new("https://sesio.dev".to_string(), secret());
        let rendered = format!("{config:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("test-secret"));
    }

    #[test]
    fn auth_state_exposes_config_and_codec() {
        let config = AuthConfig::new("https://sesio.dev".to_string(), secret());
        let state = AuthState::new(config, Arc::new(NoopRateLimiter));
        assert_eq!(state.config().frontend_base_url(), "https://sesio.dev");
        let token = state
            .codec()
            .issue(1, super::super::token::TokenKind::Access, 60)
            .expect("token issuance");
        assert!(!token.is_empty());
    }
}
