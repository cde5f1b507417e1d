use anyhow::{Context, Result};
use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_recovery_args(command);
    with_outbox_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL; drives CORS and the cookie Secure flag")
                .env("SESIO_FRONTEND_BASE_URL")
                .default_value("https://sesio.dev"),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("SESIO_ACCESS_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("SESIO_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_recovery_args(command: Command) -> Command {
    command.arg(
        Arg::new("reset-code-ttl-seconds")
            .long("reset-code-ttl-seconds")
            .help("Password reset code TTL in seconds")
            .env("SESIO_RESET_CODE_TTL_SECONDS")
            .default_value("600")
            .value_parser(clap::value_parser!(i64)),
    )
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("notify-outbox-poll-seconds")
                .long("notify-outbox-poll-seconds")
                .help("Notification outbox poll interval in seconds")
                .env("SESIO_NOTIFY_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("notify-outbox-batch-size")
                .long("notify-outbox-batch-size")
                .help("Notification outbox batch size per poll")
                .env("SESIO_NOTIFY_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("notify-outbox-max-attempts")
                .long("notify-outbox-max-attempts")
                .help("Max attempts before marking a notification as failed")
                .env("SESIO_NOTIFY_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("notify-outbox-backoff-base-seconds")
                .long("notify-outbox-backoff-base-seconds")
                .help("Base delay for notification retry backoff")
                .env("SESIO_NOTIFY_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("notify-outbox-backoff-max-seconds")
                .long("notify-outbox-backoff-max-seconds")
                .help("Max delay for notification retry backoff")
                .env("SESIO_NOTIFY_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("notify-send-timeout-seconds")
                .long("notify-send-timeout-seconds")
                .help("Per-send delivery deadline for outbound notifications")
                .env("SESIO_NOTIFY_SEND_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct OutboxOptions {
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
    pub send_timeout_seconds: u64,
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reset_code_ttl_seconds: i64,
    pub outbox: OutboxOptions,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            access_ttl_seconds: matches
                .get_one::<i64>("access-ttl-seconds")
                .copied()
                .context("missing required argument: --access-ttl-seconds")?,
            refresh_ttl_seconds: matches
                .get_one::<i64>("refresh-ttl-seconds")
                .copied()
                .context("missing required argument: --refresh-ttl-seconds")?,
            reset_code_ttl_seconds: matches
                .get_one::<i64>("reset-code-ttl-seconds")
                .copied()
                .context("missing required argument: --reset-code-ttl-seconds")?,
            outbox: OutboxOptions {
                poll_seconds: matches
                    .get_one::<u64>("notify-outbox-poll-seconds")
                    .copied()
                    .context("missing required argument: --notify-outbox-poll-seconds")?,
                batch_size: matches
                    .get_one::<usize>("notify-outbox-batch-size")
                    .copied()
                    .context("missing required argument: --notify-outbox-batch-size")?,
                max_attempts: matches
                    .get_one::<u32>("notify-outbox-max-attempts")
                    .copied()
                    .context("missing required argument: --notify-outbox-max-attempts")?,
                backoff_base_seconds: matches
                    .get_one::<u64>("notify-outbox-backoff-base-seconds")
                    .copied()
                    .context("missing required argument: --notify-outbox-backoff-base-seconds")?,
                backoff_max_seconds: matches
                    .get_one::<u64>("notify-outbox-backoff-max-seconds")
                    .copied()
                    .context("missing required argument: --notify-outbox-backoff-max-seconds")?,
                send_timeout_seconds: matches
                    .get_one::<u64>("notify-send-timeout-seconds")
                    .copied()
                    .context("missing required argument: --notify-send-timeout-seconds")?,
            },
        })
    }
}
