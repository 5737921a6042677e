//! `pending`: submissions parked in the pending directory after their
//! retries ran out.

use std::sync::Arc;

use chrono::SecondsFormat;
use clap::Subcommand;
use leadfunnel_core::{AppConfig, SystemClock};
use leadfunnel_db::PgLeadStore;
use leadfunnel_queue::{
    FileState, PersistedState, RetryPolicy, SubmissionEnvelope, SubmissionQueue, PENDING_PREFIX,
};
use sqlx::PgPool;

/// Sub-commands available under `pending`.
#[derive(Debug, Subcommand)]
pub enum PendingCommands {
    /// List parked submissions
    List,
    /// Re-submit every parked submission and wait for the outcome
    Flush {
        /// Retry without sleeping between attempts
        #[arg(long)]
        no_backoff: bool,
    },
}

/// Connects to `DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or the pool cannot connect.
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for this command"))?;
    let pool =
        leadfunnel_db::connect_pool(database_url, leadfunnel_db::PoolConfig::from_app_config(config))
            .await?;
    Ok(pool)
}

/// Reads every decodable envelope without claiming it. Entries that do not
/// decode are logged and skipped.
///
/// # Errors
///
/// Returns an error if the state cannot be listed or read.
pub(crate) async fn load_pending(
    state: &dyn PersistedState,
) -> anyhow::Result<Vec<SubmissionEnvelope>> {
    let mut envelopes = Vec::new();
    for key in state.keys().await? {
        if !key.starts_with(PENDING_PREFIX) {
            continue;
        }
        let Some(raw) = state.get(&key).await? else {
            continue;
        };
        match serde_json::from_str::<SubmissionEnvelope>(&raw) {
            Ok(envelope) => envelopes.push(envelope),
            Err(e) => tracing::warn!(key = %key, error = %e, "skipping undecodable pending entry"),
        }
    }
    Ok(envelopes)
}

pub(crate) async fn run_pending_list(config: &AppConfig) -> anyhow::Result<()> {
    let state = FileState::open(&config.pending_dir).await?;
    let envelopes = load_pending(&state).await?;

    if envelopes.is_empty() {
        println!("no pending submissions in {}", state.dir().display());
        return Ok(());
    }

    println!("{:<38} {:>8} {:<25} FIELDS", "LEAD", "ATTEMPTS", "PARKED AT");
    for envelope in &envelopes {
        let fields: Vec<&str> = envelope.payload.keys().map(String::as_str).collect();
        println!(
            "{:<38} {:>8} {:<25} {}",
            envelope.lead_id.to_string(),
            envelope.attempt_count,
            envelope.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            fields.join(",")
        );
    }
    println!("{} pending submission(s)", envelopes.len());
    Ok(())
}

/// Claims every parked envelope and pushes it through the queue against
/// the Postgres store.
///
/// # Errors
///
/// Returns an error if the database or pending directory is unavailable.
pub(crate) async fn run_pending_flush(config: &AppConfig, no_backoff: bool) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let state = FileState::open(&config.pending_dir).await?;

    let policy = if no_backoff {
        RetryPolicy::immediate(config.submit_max_attempts)
    } else {
        RetryPolicy::from_app_config(config)
    };
    let queue = SubmissionQueue::new(
        Arc::new(PgLeadStore::new(pool)),
        Arc::new(state),
        policy,
        Arc::new(SystemClock),
    );

    let report = queue.flush_pending().await?;
    println!(
        "claimed {} (skipped {}, invalid {}): delivered {}, re-parked {}, coalesced {}, rejected {}, dropped {}",
        report.claimed,
        report.skipped,
        report.invalid,
        report.delivered,
        report.persisted,
        report.coalesced,
        report.rejected,
        report.dropped
    );
    if report.dropped > 0 {
        anyhow::bail!("{} submission(s) could not be delivered or re-parked", report.dropped);
    }
    Ok(())
}
