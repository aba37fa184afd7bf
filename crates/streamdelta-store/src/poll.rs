//! Completion poller.
//!
//! The collect process writes today's snapshot to the store; the process
//! that triggered it waits by re-reading the dated path on a fixed interval.
//! A snapshot generated before `since` belongs to an earlier run of the same
//! day and is treated as not yet written.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use streamdelta_core::{DailySnapshot, TenantId};
use tokio::time::Instant;

use crate::blob::BlobStore;
use crate::snapshots::load_snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Found(DailySnapshot),
    TimedOut,
}

/// Waits for a snapshot of `tenant` on `date` generated at or after `since`.
///
/// The path is read at least once. Read errors are logged and polling
/// continues; exhausting `max_wait` yields [`PollOutcome::TimedOut`].
pub async fn await_snapshot<S>(
    store: &S,
    tenant: &TenantId,
    date: NaiveDate,
    since: Option<DateTime<Utc>>,
    config: &PollConfig,
) -> PollOutcome
where
    S: BlobStore + ?Sized,
{
    let deadline = Instant::now() + config.max_wait;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match load_snapshot(store, tenant, date).await {
            Ok(Some(snapshot)) if since.is_none_or(|t| snapshot.generated_at >= t) => {
                tracing::debug!(tenant = %tenant, %date, attempts, "poller: snapshot found");
                return PollOutcome::Found(snapshot);
            }
            Ok(Some(stale)) => {
                tracing::debug!(
                    tenant = %tenant,
                    %date,
                    generated_at = %stale.generated_at,
                    "poller: snapshot predates this run, waiting"
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(tenant = %tenant, %date, error = %e, "poller: read failed, will retry");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(tenant = %tenant, %date, attempts, "poller: gave up waiting for snapshot");
            return PollOutcome::TimedOut;
        }
        tokio::time::sleep(config.interval.min(deadline - now)).await;
    }
}
