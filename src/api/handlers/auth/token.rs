//! JWT codec for the access/refresh token pair.
//!
//! Tokens are HS256-signed with a single process-wide secret injected via
//! [`AuthConfig`](super::state::AuthConfig). Validity is signature plus
//! embedded expiry with zero leeway; refresh tokens additionally carry a
//! `jti` so they can be blacklisted individually.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::utils::now_unix_seconds;

/// Discriminator claim keeping access and refresh tokens from being
/// swapped for one another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identity id.
    pub sub: i64,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id; the revocation store keys on this.
    pub jti: Uuid,
    pub kind: TokenKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("malformed token")]
    Malformed,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
        }
    }

    /// Sign a token for `subject_id` expiring `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns an error if claim serialization fails.
    pub fn issue(
        &self,
        subject_id: i64,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> anyhow::Result<String> {
        let now = now_unix_seconds();
        let claims = TokenClaims {
            sub: subject_id,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
            jti: Uuid::new_v4(),
            kind,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| anyhow::anyhow!("failed to sign {} token: {err}", kind.as_str()))
    }

    /// Verify signature, expiry, and kind.
    ///
    /// # Errors
    /// `InvalidSignature` on a signature mismatch, `Expired` once the
    /// embedded expiry has passed, `WrongKind` when an access token is
    /// presented where a refresh token is required (or vice versa), and
    /// `Malformed` for anything that does not parse as one of our tokens.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &validation(true))
            .map_err(map_jwt_error)?;
        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    /// Verify a refresh token for revocation purposes, ignoring expiry.
    ///
    /// Logout must be able to blacklist a token that has already expired;
    /// the signature and kind checks still apply so arbitrary input cannot
    /// seed the revocation store.
    ///
    /// # Errors
    /// Same taxonomy as [`verify`](Self::verify), minus `Expired`.
    pub fn verify_for_revocation(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &validation(false))
            .map_err(map_jwt_error)?;
        if data.claims.kind != TokenKind::Refresh {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }
}

fn validation(validate_exp: bool) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is exact: a token one second past `exp` is expired.
    validation.leeway = 0;
    validation.validate_exp = validate_exp;
    validation
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SecretString::from(secret.to_string()))
    }

    #[test]
    fn round_trip_access_token() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let token = codec.issue(42, TokenKind::Access, 60)?;
        let claims = codec
            .verify(&token, TokenKind::Access)
            .map_err(|err| anyhow::anyhow!(err))?;
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn kind_confusion_is_rejected_both_ways() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let refresh = codec.issue(7, TokenKind::Refresh, 60)?;
        let access = codec.issue(7, TokenKind::Access, 60)?;
        assert_eq!(
            codec.verify(&refresh, TokenKind::Access),
            Err(TokenError::WrongKind)
        );
        assert_eq!(
            codec.verify(&access, TokenKind::Refresh),
            Err(TokenError::WrongKind)
        );
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let token = codec.issue(7, TokenKind::Access, -10)?;
        assert_eq!(
            codec.verify(&token, TokenKind::Access),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn foreign_secret_is_rejected() -> anyhow::Result<()> {
        let ours = codec("test-secret-0123456789-0123456789");
        let theirs = codec("other-secret-9876543210-987654321");
        let token = theirs.issue(7, TokenKind::Access, 60)?;
        assert_eq!(
            ours.verify(&token, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec("test-secret-0123456789-0123456789");
        assert_eq!(
            codec.verify("not.a.token", TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(codec.verify("", TokenKind::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn revocation_decode_accepts_expired_refresh() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let expired = codec.issue(7, TokenKind::Refresh, -10)?;
        let claims = codec
            .verify_for_revocation(&expired)
            .map_err(|err| anyhow::anyhow!(err))?;
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.kind, TokenKind::Refresh);
        Ok(())
    }

    #[test]
    fn revocation_decode_rejects_access_tokens() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let access = codec.issue(7, TokenKind::Access, 60)?;
        assert_eq!(
            codec.verify_for_revocation(&access),
            Err(TokenError::WrongKind)
        );
        Ok(())
    }

    #[test]
    fn each_token_gets_a_distinct_jti() -> anyhow::Result<()> {
        let codec = codec("test-secret-0123456789-0123456789");
        let first = codec.issue(7, TokenKind::Refresh, 60)?;
        let second = codec.issue(7, TokenKind::Refresh, 60)?;
        let first = codec
            .verify(&first, TokenKind::Refresh)
            .map_err(|err| anyhow::anyhow!(err))?;
        let second = codec
            .verify(&second, TokenKind::Refresh)
            .map_err(|err| anyhow::anyhow!(err))?;
        assert_ne!(first.jti, second.jti);
        Ok(())
    }
}
