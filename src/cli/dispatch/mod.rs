//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action,
//! such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{self, auth};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .context("missing required argument: --token-secret")?;

    commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        token_secret: SecretString::from(token_secret),
        frontend_base_url: auth_opts.frontend_base_url,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        reset_code_ttl_seconds: auth_opts.reset_code_ttl_seconds,
        outbox_poll_seconds: auth_opts.outbox.poll_seconds,
        outbox_batch_size: auth_opts.outbox.batch_size,
        outbox_max_attempts: auth_opts.outbox.max_attempts,
        outbox_backoff_base_seconds: auth_opts.outbox.backoff_base_seconds,
        outbox_backoff_max_seconds: auth_opts.outbox.backoff_max_seconds,
        notify_send_timeout_seconds: auth_opts.outbox.send_timeout_seconds,
    }))
}
