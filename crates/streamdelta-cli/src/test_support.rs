//! Fakes shared by the command and API tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use streamdelta_collector::{CollectError, CollectTrigger, CollectorBackend, LaunchError, UnitExecutor};
use streamdelta_core::{CollectionUnit, DailySnapshot, PlaylistSnapshot, TenantId, TotalStreams, TrackRecord};
use streamdelta_store::{save_snapshot, MemoryStore};

pub(crate) fn tenant(raw: &str) -> TenantId {
    TenantId::parse(raw).expect("valid tenant")
}

pub(crate) fn unit(id: &str) -> CollectionUnit {
    CollectionUnit::parse(&format!("https://app.artist.tools/playlist/{id}")).expect("valid url")
}

pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date")
}

pub(crate) fn playlist(unit: &CollectionUnit, streams: u64) -> PlaylistSnapshot {
    PlaylistSnapshot::from_tracks(
        unit,
        format!("List {}", unit.id),
        vec![TrackRecord {
            entity_id: Some(format!("{}-t1", unit.id)),
            title: "Opener".to_owned(),
            artists: vec!["Band".to_owned()],
            stream_count: streams,
        }],
        None,
        TotalStreams::Count(streams),
    )
}

pub(crate) fn daily(tenant_id: &TenantId, day: NaiveDate, playlists: Vec<PlaylistSnapshot>) -> DailySnapshot {
    DailySnapshot {
        tenant_id: tenant_id.clone(),
        date: day,
        playlists,
        generated_at: Utc::now(),
    }
}

pub(crate) async fn seed_sources(store: &MemoryStore, tenant_id: &TenantId, ids: &[&str]) {
    for id in ids {
        let url = format!("https://app.artist.tools/playlist/{id}");
        streamdelta_store::add_source(store, tenant_id, &url)
            .await
            .expect("seed source");
    }
}

/// Collects a fixed 1,000 streams per playlist; ids starting with `FAIL`
/// error out.
pub(crate) struct FakeBackend;

struct FakeExecutor;

#[async_trait]
impl UnitExecutor for FakeExecutor {
    async fn collect(&mut self, unit: &CollectionUnit) -> Result<PlaylistSnapshot, CollectError> {
        if unit.id.starts_with("FAIL") {
            return Err(CollectError::Scraper("playlist unavailable".to_owned()));
        }
        Ok(playlist(unit, 1_000))
    }
}

#[async_trait]
impl CollectorBackend for FakeBackend {
    async fn launch(&self, _slot: usize) -> Result<Box<dyn UnitExecutor>, CollectError> {
        Ok(Box::new(FakeExecutor))
    }
}

/// Stands in for the collect process: optionally writes a one-playlist
/// snapshot for `day` (error-tagged when `errored`), then fails if `fail`.
pub(crate) struct FakeTrigger {
    pub store: Arc<MemoryStore>,
    pub day: NaiveDate,
    pub streams: u64,
    pub fail: bool,
    pub write: bool,
    pub errored: bool,
}

impl FakeTrigger {
    pub(crate) fn writing(store: Arc<MemoryStore>, day: NaiveDate, streams: u64) -> Self {
        Self {
            store,
            day,
            streams,
            fail: false,
            write: true,
            errored: false,
        }
    }

    pub(crate) fn failing(store: Arc<MemoryStore>, day: NaiveDate) -> Self {
        Self {
            fail: true,
            write: false,
            ..Self::writing(store, day, 0)
        }
    }
}

#[async_trait]
impl CollectTrigger for FakeTrigger {
    async fn trigger(&self, tenant: &TenantId) -> Result<(), LaunchError> {
        if self.write {
            let collected = if self.errored {
                PlaylistSnapshot::failed(&unit("P1"), "playlist unavailable")
            } else {
                playlist(&unit("P1"), self.streams)
            };
            save_snapshot(self.store.as_ref(), &daily(tenant, self.day, vec![collected]))
                .await
                .expect("fake collect should persist");
        }
        if self.fail {
            return Err(LaunchError::TimedOut(std::time::Duration::from_secs(900)));
        }
        Ok(())
    }
}
