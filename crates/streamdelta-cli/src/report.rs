//! `streamdelta report`: diff stored snapshots without collecting.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use streamdelta_core::{DailySnapshot, TenantId};
use streamdelta_report::{build_report, deliver_paced, MessageChannel, TextFormat};
use streamdelta_store::{load_snapshot, BlobStore};

use crate::services::Services;

/// Pagination and pacing for report delivery.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Delivery {
    pub chunk_chars: usize,
    pub chunk_delay: Duration,
}

impl Delivery {
    pub(crate) fn from_config(config: &streamdelta_core::AppConfig) -> Self {
        Self {
            chunk_chars: config.report_chunk_chars,
            chunk_delay: config.report_chunk_delay(),
        }
    }
}

/// Reads the snapshot of the day before `today`. Read failures count as
/// "no previous day".
pub(crate) async fn load_previous(
    store: &dyn BlobStore,
    tenant: &TenantId,
    today: NaiveDate,
) -> Option<DailySnapshot> {
    let previous = today.pred_opt()?;
    match load_snapshot(store, tenant, previous).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(tenant = %tenant, date = %previous, error = %e, "report: previous snapshot unreadable");
            None
        }
    }
}

/// Builds today's report against the previous day and delivers it.
/// Returns `(chunks, delivered)`.
pub(crate) async fn deliver_report(
    store: &dyn BlobStore,
    channel: &dyn MessageChannel,
    today: &DailySnapshot,
    delivery: Delivery,
) -> (usize, usize) {
    let yesterday = load_previous(store, &today.tenant_id, today.date).await;
    if yesterday.is_none() {
        tracing::info!(tenant = %today.tenant_id, date = %today.date, "report: no previous snapshot, all tracks are new");
    }

    let chunks = build_report(today, yesterday.as_ref(), delivery.chunk_chars);
    let delivered = deliver_paced(
        channel,
        &today.tenant_id,
        &chunks,
        TextFormat::Html,
        delivery.chunk_delay,
    )
    .await;
    (chunks.len(), delivered)
}

pub(crate) async fn run_report(
    services: &Services,
    tenant: &TenantId,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let today = load_snapshot(services.store.as_ref(), tenant, date)
        .await
        .with_context(|| format!("failed to read snapshot for {tenant} on {date}"))?
        .with_context(|| format!("no snapshot stored for {tenant} on {date}"))?;

    let (chunks, delivered) = deliver_report(
        services.store.as_ref(),
        services.channel.as_ref(),
        &today,
        Delivery::from_config(&services.config),
    )
    .await;

    if delivered < chunks {
        anyhow::bail!("delivered {delivered} of {chunks} report message(s) for {tenant}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use streamdelta_report::MemoryChannel;
    use streamdelta_store::{save_snapshot, MemoryStore};

    use super::*;
    use crate::test_support::{daily, date, playlist, tenant, unit};

    fn delivery() -> Delivery {
        Delivery {
            chunk_chars: 4000,
            chunk_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn report_diffs_against_previous_day() {
        let store = MemoryStore::new();
        let channel = MemoryChannel::new();
        let id = tenant("200");
        save_snapshot(&store, &daily(&id, date(1), vec![playlist(&unit("P1"), 900)]))
            .await
            .unwrap();
        let today = daily(&id, date(2), vec![playlist(&unit("P1"), 1_000)]);

        let (chunks, delivered) = deliver_report(&store, &channel, &today, delivery()).await;

        assert_eq!((chunks, delivered), (1, 1));
        let text = &channel.texts()[0];
        assert!(text.contains("🎯 Opener by Band: 1,000 streams (+100 streams)"));
        assert!(text.contains("📅 Report Date: 2025-06-02"));
    }

    #[tokio::test]
    async fn unreadable_previous_day_reports_everything_new() {
        let store = MemoryStore::new();
        let channel = MemoryChannel::new();
        let id = tenant("201");
        save_snapshot(&store, &daily(&id, date(1), vec![playlist(&unit("P1"), 900)]))
            .await
            .unwrap();
        store.fail_next_reads(1);
        let today = daily(&id, date(2), vec![playlist(&unit("P1"), 1_000)]);

        deliver_report(&store, &channel, &today, delivery()).await;

        assert!(channel.texts()[0].contains("(NEW)"));
    }
}
