//! Notification outbox worker and delivery abstractions.
//!
//! The recovery flow enqueues rows in `notify_outbox` within the same
//! transaction that persists the reset code, so a code is never created
//! without a queued notification and a delivery failure never fails the
//! originating request. A background task polls the table, locks a batch
//! via `FOR UPDATE SKIP LOCKED`, and hands each row to a
//! [`NotificationSender`] under a bounded per-send timeout. Failed rows
//! are retried with exponential backoff and jitter until a max attempt
//! threshold, then marked `failed`.
//!
//! The default sender for local dev is [`LogSender`], which logs the
//! payload and reports success.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rand::Rng;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct Notification {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Delivery abstraction used by the outbox worker.
///
/// Implementations decide the transport (SMTP, HTTP API, a broker); the
/// worker owns retries and the per-send deadline.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver a notification or return an error to schedule a retry.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Local dev sender that logs the payload instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to_email = %notification.to_email,
            template = %notification.template,
            payload = %notification.payload_json,
            "notification send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OutboxConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    send_timeout: Duration,
}

impl OutboxConfig {
    /// Defaults: 5s poll, 10 rows per batch, 5 attempts, 5s→5m backoff
    /// with jitter, 10s per-send deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            send_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_send_timeout_seconds(mut self, seconds: u64) -> Self {
        self.send_timeout = Duration::from_secs(seconds);
        self
    }

    /// Clamp zero/inverted settings to usable values.
    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.poll_interval
        };
        let batch_size = self.batch_size.max(1);
        let max_attempts = self.max_attempts.max(1);
        let backoff_base = if self.backoff_base.is_zero() {
            Duration::from_secs(1)
        } else {
            self.backoff_base
        };
        let backoff_max = self.backoff_max.max(backoff_base);
        let send_timeout = if self.send_timeout.is_zero() {
            Duration::from_secs(1)
        } else {
            self.send_timeout
        };
        Self {
            poll_interval,
            batch_size,
            max_attempts,
            backoff_base,
            backoff_max,
            send_timeout,
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the background task that drains the notification outbox.
pub fn spawn_outbox_worker(
    pool: PgPool,
    sender: Arc<dyn NotificationSender>,
    config: OutboxConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        loop {
            if let Err(err) = drain_outbox_batch(&pool, sender.as_ref(), &config).await {
                error!("notification outbox batch failed: {err}");
            }
            sleep(config.poll_interval()).await;
        }
    })
}

async fn drain_outbox_batch(
    pool: &PgPool,
    sender: &dyn NotificationSender,
    config: &OutboxConfig,
) -> Result<usize> {
    let mut tx = pool
        .begin()
        .await
        .context("failed to start notify outbox transaction")?;

    // Locked batch so multiple instances never double-send.
    let query = r"
        SELECT id, to_email, template, payload_json::text AS payload_json, attempts
        FROM notify_outbox
        WHERE status = 'pending'
          AND next_attempt_at <= NOW()
        ORDER BY next_attempt_at ASC, created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(i64::try_from(config.batch_size()).unwrap_or(1))
        .fetch_all(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load notify outbox batch")?;

    if rows.is_empty() {
        // Commit even when empty to release locks promptly.
        tx.commit()
            .await
            .context("failed to commit empty outbox batch")?;
        return Ok(0);
    }

    let row_count = rows.len();
    for row in rows {
        let id: Uuid = row.get("id");
        let attempts: i32 = row.get("attempts");
        let attempts = u32::try_from(attempts).unwrap_or(0);
        let notification = Notification {
            to_email: row.get("to_email"),
            template: row.get("template"),
            payload_json: row.get("payload_json"),
        };

        // A sender that hangs must not stall the whole batch.
        let outcome = match timeout(config.send_timeout(), sender.send(&notification)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "delivery timed out after {:?}",
                config.send_timeout()
            )),
        };
        record_outcome(&mut tx, id, attempts, outcome, config).await?;
    }

    tx.commit()
        .await
        .context("failed to commit notify outbox batch")?;

    Ok(row_count)
}

async fn record_outcome(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    attempts: u32,
    outcome: Result<()>,
    config: &OutboxConfig,
) -> Result<()> {
    let next_attempt = attempts.saturating_add(1);
    let next_attempts_i32 = i32::try_from(next_attempt).unwrap_or(i32::MAX);

    match outcome {
        Ok(()) => {
            let query = r"
                UPDATE notify_outbox
                SET status = 'sent',
                    attempts = $2,
                    last_error = NULL,
                    sent_at = NOW(),
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox row sent")?;
        }
        Err(err) if next_attempt >= config.max_attempts() => {
            let query = r"
                UPDATE notify_outbox
                SET status = 'failed',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW()
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .bind(err.to_string())
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to mark outbox row failed")?;
        }
        Err(err) => {
            let delay = backoff_delay(next_attempt, config.backoff_base(), config.backoff_max());
            let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
            let query = r"
                UPDATE notify_outbox
                SET status = 'pending',
                    attempts = $2,
                    last_error = $3,
                    next_attempt_at = NOW() + ($4 * INTERVAL '1 millisecond')
                WHERE id = $1
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(id)
                .bind(next_attempts_i32)
                .bind(err.to_string())
                .bind(delay_ms)
                .execute(&mut **tx)
                .instrument(span)
                .await
                .context("failed to schedule outbox retry")?;
        }
    }

    Ok(())
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    jitter_delay(delay.min(max))
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_degenerate_settings() {
        let config = OutboxConfig::new()
            .with_poll_interval_seconds(0)
            .with_batch_size(0)
            .with_max_attempts(0)
            .with_backoff_base_seconds(0)
            .with_backoff_max_seconds(0)
            .with_send_timeout_seconds(0)
            .normalize();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_attempts(), 1);
        assert!(config.backoff_max() >= config.backoff_base());
        assert_eq!(config.send_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_delay_is_capped() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(300);
        for attempt in 1..=20 {
            assert!(backoff_delay(attempt, base, max) <= max);
        }
    }

    #[test]
    fn jitter_stays_within_original_delay() {
        let delay = Duration::from_millis(1000);
        for _ in 0..32 {
            let jittered = jitter_delay(delay);
            assert!(jittered >= Duration::from_millis(500));
            assert!(jittered <= delay);
        }
    }

    #[tokio::test]
    async fn log_sender_accepts_everything() {
        let sender = LogSender;
        let notification = Notification {
            to_email: "alice@example.com".to_string(),
            template: "password_reset_code".to_string(),
            payload_json: "{}".to_string(),
        };
        assert!(sender.send(&notification).await.is_ok());
    }
}
