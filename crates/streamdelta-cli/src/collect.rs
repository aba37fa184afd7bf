//! `streamdelta collect`: one collection round for a tenant, persisted as
//! the dated snapshot.
//!
//! This runs in its own process; whoever triggered it learns about the
//! result by polling the store, so every failure here is reported to the
//! tenant before the process exits non-zero.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use streamdelta_collector::{
    collect_with_fallback, CollectorBackend, PoolConfig, ProcessBackend, ProcessConfig, RoundMode,
};
use streamdelta_core::{DailySnapshot, TenantId};
use streamdelta_report::format::escape_html;
use streamdelta_report::{notify, MessageChannel, TextFormat};
use streamdelta_store::{load_sources, save_snapshot, BlobStore};

use crate::services::{retry_hint, Services};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollectSummary {
    pub playlists: usize,
    pub failed: usize,
    pub mode: Option<RoundMode>,
}

pub(crate) async fn run_collect(services: &Services, tenant: &TenantId) -> anyhow::Result<()> {
    let config = &services.config;
    let backend = Arc::new(ProcessBackend::new(ProcessConfig::from_app_config(config)));
    let pool = PoolConfig::from_app_config(config);
    let today = chrono::Local::now().date_naive();

    let summary = collect_tenant(
        services.store.as_ref(),
        services.channel.as_ref(),
        backend,
        &pool,
        tenant,
        today,
    )
    .await?;

    println!(
        "collected {} playlist(s) for {tenant} ({} failed)",
        summary.playlists, summary.failed
    );
    Ok(())
}

/// Collects every playlist in the tenant's source list and persists the
/// snapshot for `date`.
///
/// An empty source list is not an error. The snapshot is persisted even
/// when every playlist failed, and the run then reports failure.
pub(crate) async fn collect_tenant<B>(
    store: &dyn BlobStore,
    channel: &dyn MessageChannel,
    backend: Arc<B>,
    pool: &PoolConfig,
    tenant: &TenantId,
    date: NaiveDate,
) -> anyhow::Result<CollectSummary>
where
    B: CollectorBackend + ?Sized + 'static,
{
    let sources = match load_sources(store, tenant).await {
        Ok(sources) => sources,
        Err(e) => {
            let text = format!(
                "❌ <b>Could not read playlist list</b>\n🛠️ Details: {}\n{}",
                escape_html(&e.to_string()),
                retry_hint(tenant)
            );
            notify(channel, tenant, &text, TextFormat::Html).await;
            return Err(anyhow::Error::new(e).context("failed to load source list"));
        }
    };

    if sources.units.is_empty() {
        tracing::info!(tenant = %tenant, "collect: no playlists configured");
        notify(channel, tenant, "📂 <b>No playlists found</b>", TextFormat::Html).await;
        return Ok(CollectSummary {
            playlists: 0,
            failed: 0,
            mode: None,
        });
    }

    let expected = sources.units.len();
    tracing::info!(tenant = %tenant, playlists = expected, "collect: starting round");
    let outcome = collect_with_fallback(backend, sources.units, pool).await;

    let snapshot = DailySnapshot {
        tenant_id: tenant.clone(),
        date,
        playlists: outcome.snapshots,
        generated_at: Utc::now(),
    };
    let failed = snapshot.error_count();

    if let Err(e) = save_snapshot(store, &snapshot).await {
        let text = format!(
            "❌ <b>Could not save results</b>\n🛠️ Details: {}\n{}",
            escape_html(&e.to_string()),
            retry_hint(tenant)
        );
        notify(channel, tenant, &text, TextFormat::Html).await;
        return Err(anyhow::Error::new(e).context("failed to persist snapshot"));
    }

    tracing::info!(
        tenant = %tenant,
        playlists = snapshot.playlists.len(),
        failed,
        mode = ?outcome.mode,
        "collect: round complete"
    );

    if failed == snapshot.playlists.len() {
        let first_error = snapshot
            .playlists
            .iter()
            .find_map(|p| p.error.as_deref())
            .unwrap_or("unknown error");
        let text = format!(
            "❌ <b>All {failed} playlist(s) failed</b>\n🛠️ Details: {}\n{}",
            escape_html(first_error),
            retry_hint(tenant)
        );
        notify(channel, tenant, &text, TextFormat::Html).await;
        anyhow::bail!("all {failed} playlists failed collection for {tenant}");
    }

    Ok(CollectSummary {
        playlists: snapshot.playlists.len(),
        failed,
        mode: Some(outcome.mode),
    })
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
