use crate::api::{self, handlers::auth::AuthConfig, notify::OutboxConfig};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reset_code_ttl_seconds: i64,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_size: usize,
    pub outbox_max_attempts: u32,
    pub outbox_backoff_base_seconds: u64,
    pub outbox_backoff_max_seconds: u64,
    pub notify_send_timeout_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if the database connection or the listener fails.
pub async fn execute(args: Args) -> Result<()> {
    debug!("starting server with {args:?}");

    let auth_config = AuthConfig::new(args.frontend_base_url, args.token_secret)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds)
        .with_reset_code_ttl_seconds(args.reset_code_ttl_seconds);

    let outbox_config = OutboxConfig::new()
        .with_poll_interval_seconds(args.outbox_poll_seconds)
        .with_batch_size(args.outbox_batch_size)
        .with_max_attempts(args.outbox_max_attempts)
        .with_backoff_base_seconds(args.outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.outbox_backoff_max_seconds)
        .with_send_timeout_seconds(args.notify_send_timeout_seconds);

    api::new(args.port, args.dsn, auth_config, outbox_config).await
}
