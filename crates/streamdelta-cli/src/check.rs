//! The check pipeline: announce, run a collect process, wait for its
//! snapshot, then deliver the day-over-day report.
//!
//! Shared by `streamdelta check`, the scheduled triggers and the admin API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use streamdelta_collector::{CollectCommand, CollectTrigger};
use streamdelta_core::{DailySnapshot, TenantId};
use streamdelta_report::{notify, MessageChannel, TextFormat};
use streamdelta_store::{await_snapshot, load_sources, BlobStore, PollConfig, PollOutcome};

use crate::report::{deliver_report, Delivery};
use crate::services::{retry_hint, Services};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckOutcome {
    NoPlaylists,
    Delivered { chunks: usize, delivered: usize },
}

pub(crate) struct CheckRunner {
    pub store: Arc<dyn BlobStore>,
    pub channel: Arc<dyn MessageChannel>,
    pub trigger: Arc<dyn CollectTrigger>,
    pub poll: PollConfig,
    pub delivery: Delivery,
}

impl CheckRunner {
    /// Production runner: re-invokes this binary as the collect process.
    pub(crate) fn from_services(services: &Services) -> anyhow::Result<Self> {
        let config = &services.config;
        let trigger = CollectCommand::current_exe(config.collect_timeout())?;
        Ok(Self {
            store: Arc::clone(&services.store),
            channel: Arc::clone(&services.channel),
            trigger: Arc::new(trigger),
            poll: PollConfig {
                max_wait: config.poll_max_wait(),
                interval: config.poll_interval(),
            },
            delivery: Delivery::from_config(config),
        })
    }

    pub(crate) async fn run(&self, tenant: &TenantId) -> anyhow::Result<CheckOutcome> {
        self.run_for(tenant, chrono::Local::now().date_naive()).await
    }

    /// Runs the pipeline expecting the collect process to write the snapshot
    /// dated `today`.
    pub(crate) async fn run_for(
        &self,
        tenant: &TenantId,
        today: NaiveDate,
    ) -> anyhow::Result<CheckOutcome> {
        let store = self.store.as_ref();
        let channel = self.channel.as_ref();

        let sources = match load_sources(store, tenant).await {
            Ok(sources) => sources,
            Err(e) => {
                self.report_failure(tenant, "Could not read playlist list", &e.to_string())
                    .await;
                return Err(anyhow::Error::new(e).context("failed to load source list"));
            }
        };

        if sources.units.is_empty() {
            let text = format!(
                "📂 <b>No playlists to analyze</b>\n\n🚀 <b>Start:</b> <code>streamdelta playlists add --tenant {tenant} &lt;url&gt;</code>"
            );
            notify(channel, tenant, &text, TextFormat::Html).await;
            return Ok(CheckOutcome::NoPlaylists);
        }

        let announce = format!("⏳ <b>Analyzing {} playlist(s)...</b>", sources.units.len());
        notify(channel, tenant, &announce, TextFormat::Html).await;

        tracing::info!(tenant = %tenant, playlists = sources.units.len(), "check: starting collect process");
        let started = Utc::now();
        if let Err(e) = self.trigger.trigger(tenant).await {
            // The collect process exits non-zero after persisting when every
            // playlist failed; it has notified already.
            let settled = PollConfig {
                max_wait: Duration::ZERO,
                ..self.poll
            };
            if let PollOutcome::Found(snapshot) =
                await_snapshot(store, tenant, today, Some(started), &settled).await
            {
                tracing::warn!(tenant = %tenant, error = %e, "check: collect process failed after persisting, delivering anyway");
                return Ok(self.deliver(&snapshot).await);
            }
            self.report_failure(tenant, "Auto-scrape error", &e.to_string())
                .await;
            return Err(anyhow::Error::new(e).context("collect process failed"));
        }

        let snapshot = match await_snapshot(store, tenant, today, Some(started), &self.poll).await {
            PollOutcome::Found(snapshot) => snapshot,
            PollOutcome::TimedOut => {
                let text = format!(
                    "⚠️ <b>No report found</b>\n\nThe collection finished but no results for {today} appeared in time.\n{}",
                    retry_hint(tenant)
                );
                notify(channel, tenant, &text, TextFormat::Html).await;
                anyhow::bail!("no snapshot for {tenant} on {today} after waiting");
            }
        };

        Ok(self.deliver(&snapshot).await)
    }

    async fn deliver(&self, snapshot: &DailySnapshot) -> CheckOutcome {
        let (chunks, delivered) =
            deliver_report(self.store.as_ref(), self.channel.as_ref(), snapshot, self.delivery).await;
        tracing::info!(tenant = %snapshot.tenant_id, chunks, delivered, "check: report delivered");
        CheckOutcome::Delivered { chunks, delivered }
    }

    async fn report_failure(&self, tenant: &TenantId, title: &str, details: &str) {
        let text = format!(
            "❌ <b>{title}</b>\n🛠️ Details: {}\n{}",
            streamdelta_report::format::escape_html(details),
            retry_hint(tenant)
        );
        notify(self.channel.as_ref(), tenant, &text, TextFormat::Html).await;
    }
}

#[cfg(test)]
#[path = "check_test.rs"]
mod tests;
