//! Database helpers for identities, revocations, and reset codes.
//!
//! Three tables back this module: `users` (identity + bcrypt hash),
//! `revoked_refresh_tokens` (blacklisted refresh `jti`s, append-only),
//! and `password_reset_codes` (six-digit codes with creation timestamps).
//! Reset-code dispatch also writes a `notify_outbox` row in the same
//! transaction; the worker in [`crate::api::notify`] drains it.

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::token::TokenCodec;
use super::utils::is_unique_violation;

/// Minimal identity projection used across the auth handlers.
#[derive(Clone, Debug)]
pub(crate) struct UserRecord {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
}

/// Outcome when attempting to create a new identity.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(i64),
    UsernameTaken,
    EmailTaken,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
    }
}

pub(super) async fn insert_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => {
            let constraint = match &err {
                sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
                _ => None,
            };
            if constraint.as_deref().is_some_and(|name| name.contains("email")) {
                Ok(SignupOutcome::EmailTaken)
            } else {
                Ok(SignupOutcome::UsernameTaken)
            }
        }
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRecord>> {
    let query = "SELECT id, username, email, password_hash FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(super) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = "SELECT id, username, email, password_hash FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(super) async fn lookup_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, username, email, password_hash FROM users WHERE username = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by username")?;
    Ok(row.as_ref().map(user_from_row))
}

/// Blacklist a refresh token, keyed by its `jti` claim.
///
/// Lenient on input: malformed or foreign-signed tokens are a no-op so
/// logout always succeeds from the client's point of view. Re-revoking
/// an already-revoked token is equally a no-op (`ON CONFLICT DO NOTHING`).
pub(super) async fn revoke_refresh_token(
    pool: &PgPool,
    codec: &TokenCodec,
    token: &str,
) -> Result<()> {
    // Expired tokens are still accepted here; only the signature gates.
    let Ok(claims) = codec.verify_for_revocation(token) else {
        return Ok(());
    };
    insert_revocation(pool, claims.jti, claims.sub).await
}

pub(super) async fn insert_revocation(pool: &PgPool, jti: Uuid, user_id: i64) -> Result<()> {
    let query = r"
        INSERT INTO revoked_refresh_tokens (jti, user_id)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(jti)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert revocation")?;
    Ok(())
}

/// Revocation is checked on every renewal, in addition to the codec's
/// own expiry check; an unexpired-but-revoked token must never renew.
pub(crate) async fn is_refresh_revoked(pool: &PgPool, jti: Uuid) -> Result<bool> {
    let query = "SELECT 1 FROM revoked_refresh_tokens WHERE jti = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check revocation")?;
    Ok(row.is_some())
}

/// Persist a fresh reset code and enqueue its notification atomically.
///
/// Previously issued codes are deliberately left alone; each stays
/// usable until its own ten-minute window closes.
pub(super) async fn insert_reset_code(
    pool: &PgPool,
    user: &UserRecord,
    code: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin reset-code transaction")?;

    let query = r"
        INSERT INTO password_reset_codes (user_id, code)
        VALUES ($1, $2)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user.id)
        .bind(code)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert reset code")?;

    let payload_json = json!({
        "username": user.username,
        "email": user.email,
        "code": code,
    });
    let payload_text =
        serde_json::to_string(&payload_json).context("failed to serialize reset payload")?;

    let query = r"
        INSERT INTO notify_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(&user.email)
        .bind("password_reset_code")
        .bind(payload_text)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert notify outbox row")?;

    tx.commit().await.context("commit reset-code transaction")?;
    Ok(())
}

/// Check `code` against the most recently created code for `user_id`.
///
/// Returns `None` when no record matches, `Some(true)` when the latest
/// match is within `ttl_seconds` of its creation, `Some(false)` when it
/// has aged out. Purely a read; repeated verification mutates nothing.
pub(super) async fn latest_reset_code_fresh(
    pool: &PgPool,
    user_id: i64,
    code: &str,
    ttl_seconds: i64,
) -> Result<Option<bool>> {
    let query = r"
        SELECT created_at > NOW() - ($3 * INTERVAL '1 second') AS fresh
        FROM password_reset_codes
        WHERE user_id = $1
          AND code = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(code)
        .bind(ttl_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check reset code")?;
    Ok(row.map(|row| row.get("fresh")))
}

/// Set the new credential and purge every outstanding reset code for the
/// identity in one transaction.
pub(super) async fn update_password_and_purge_codes(
    pool: &PgPool,
    user_id: i64,
    password_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin password-reset transaction")?;

    let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password hash")?;

    let query = "DELETE FROM password_reset_codes WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to purge reset codes")?;

    tx.commit().await.context("commit password-reset transaction")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SignupOutcome, UserRecord};

    #[test]
    fn signup_outcome_debug_names() {
        assert_eq!(format!("{:?}", SignupOutcome::Created(1)), "Created(1)");
        assert_eq!(format!("{:?}", SignupOutcome::UsernameTaken), "UsernameTaken");
        assert_eq!(format!("{:?}", SignupOutcome::EmailTaken), "EmailTaken");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$12$hash".to_string(),
        };
        assert_eq!(record.id, 7);
        assert_eq!(record.username, "alice");
        assert_eq!(record.email, "alice@example.com");
        assert_eq!(record.password_hash, "$2b$12$hash");
    }
}
