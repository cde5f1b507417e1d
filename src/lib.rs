//! # Sesio (Session Lifecycle & Account Recovery Core)
//!
//! `sesio` is the authentication core of a social backend. It owns the
//! cookie-based access/refresh token lifecycle and the password-reset
//! code flow; every other part of the backend (posts, follow graph,
//! analytics, search) consumes `sesio`'s `authenticate` contract and is
//! otherwise a plain CRUD collaborator.
//!
//! ## Token lifecycle
//!
//! Login and registration mint an access/refresh JWT pair delivered as
//! two `HttpOnly` cookies. Access tokens are short-lived and stateless;
//! refresh tokens are longer-lived and checked against a revocation
//! table on every renewal. When an access token expires mid-session the
//! validator silently mints a new one from the refresh token and hands
//! the caller a pending `Set-Cookie` value to attach to its response.
//!
//! > **Warning:** Rotating the signing secret invalidates all
//! > outstanding tokens.
//!
//! ## Password recovery
//!
//! A three-step flow (request → verify → reset) guarded by a six-digit
//! code valid for ten minutes. Codes are dispatched through a
//! transactional outbox so delivery failures never surface as request
//! failures.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
