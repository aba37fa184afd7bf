use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use streamdelta_core::{TotalStreams, TrackRecord};

use super::*;
use crate::backend::UnitExecutor;
use crate::error::CollectError;

/// Behaviour is picked by the playlist id: `HANG…` never returns, `PANIC…`
/// panics, `FAIL…` errors, anything else succeeds after a short pause.
#[derive(Default)]
struct FakeBackend {
    launch_failures: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    launches: AtomicUsize,
}

impl FakeBackend {
    fn failing_launches(count: usize) -> Self {
        Self {
            launch_failures: AtomicUsize::new(count),
            ..Self::default()
        }
    }
}

struct FakeExecutor {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl CollectorBackend for FakeBackend {
    async fn launch(&self, _slot: usize) -> Result<Box<dyn UnitExecutor>, CollectError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .launch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CollectError::Launch("browser did not start".into()));
        }
        Ok(Box::new(FakeExecutor {
            in_flight: Arc::clone(&self.in_flight),
            peak: Arc::clone(&self.peak),
        }))
    }
}

#[async_trait]
impl UnitExecutor for FakeExecutor {
    async fn collect(&mut self, unit: &CollectionUnit) -> Result<PlaylistSnapshot, CollectError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = if unit.id.starts_with("HANG") {
            std::future::pending::<()>().await;
            unreachable!()
        } else if unit.id.starts_with("PANIC") {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("renderer crashed on {}", unit.id);
        } else if unit.id.starts_with("FAIL") {
            Err(CollectError::Scraper("no cards rendered".into()))
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let other = CollectionUnit::parse("https://app.artist.tools/playlist/WRONG").unwrap();
            Ok(PlaylistSnapshot::from_tracks(
                &other,
                format!("Playlist {}", unit.id),
                vec![TrackRecord {
                    entity_id: Some(format!("{}-t1", unit.id)),
                    title: "Song".into(),
                    artists: vec!["Artist".into()],
                    stream_count: 100,
                }],
                None,
                TotalStreams::Count(100),
            ))
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn units(ids: &[&str]) -> Vec<CollectionUnit> {
    ids.iter()
        .map(|id| CollectionUnit::parse(&format!("https://app.artist.tools/playlist/{id}")).unwrap())
        .collect()
}

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

fn quick_config(max_executors: usize) -> PoolConfig {
    PoolConfig {
        max_executors,
        unit_timeout: Duration::from_millis(200),
        round_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn empty_round_returns_nothing_without_launching() {
    let backend = Arc::new(FakeBackend::default());
    let results = collect(Arc::clone(&backend), Vec::new(), &quick_config(4))
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fewer_units_than_pool_yield_one_result_each() {
    let backend = Arc::new(FakeBackend::default());
    let input = units(&["A1", "B2", "C3"]);
    let results = collect(Arc::clone(&backend), input, &quick_config(8)).await.unwrap();

    let ids: HashSet<&str> = results.iter().map(|s| s.unit_id.as_str()).collect();
    assert_eq!(results.len(), 3);
    assert_eq!(ids, HashSet::from(["A1", "B2", "C3"]));
    assert_eq!(backend.launches.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn results_are_retagged_with_their_unit() {
    let backend = Arc::new(FakeBackend::default());
    let results = collect(backend, units(&["A1"]), &quick_config(1)).await.unwrap();
    assert_eq!(results[0].unit_id, "A1");
    assert_eq!(results[0].url, "https://app.artist.tools/playlist/A1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_never_exceeds_pool_size() {
    let backend = Arc::new(FakeBackend::default());
    let ids = numbered("P", 12);
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let results = collect(Arc::clone(&backend), units(&ids), &quick_config(3)).await.unwrap();

    assert_eq!(results.len(), 12);
    assert!(backend.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(backend.launches.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hanging_unit_times_out_while_queue_drains() {
    let backend = Arc::new(FakeBackend::default());
    let mut ids = numbered("OK", 14);
    ids.insert(5, "HANG1".to_owned());
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let started = std::time::Instant::now();
    let results = collect(backend, units(&ids), &quick_config(4)).await.unwrap();

    assert_eq!(results.len(), 15);
    let failed: Vec<&PlaylistSnapshot> = results.iter().filter(|s| s.is_error()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].unit_id, "HANG1");
    assert!(failed[0].error.as_deref().unwrap_or_default().contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panics_and_errors_become_error_snapshots() {
    let backend = Arc::new(FakeBackend::default());
    let results = collect(backend, units(&["PANIC1", "FAIL1", "OK1"]), &quick_config(1))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let panicked = results.iter().find(|s| s.unit_id == "PANIC1").unwrap();
    assert!(panicked.is_error());
    assert!(panicked.error.as_deref().unwrap().contains("renderer crashed"));
    assert_eq!(panicked.name, "Error - PANIC1");

    let failed = results.iter().find(|s| s.unit_id == "FAIL1").unwrap();
    assert_eq!(failed.error.as_deref(), Some("no cards rendered"));

    let ok = results.iter().find(|s| s.unit_id == "OK1").unwrap();
    assert!(!ok.is_error());
}

#[tokio::test]
async fn all_launches_failing_is_a_pool_failure() {
    let backend = Arc::new(FakeBackend::failing_launches(usize::MAX));
    let err = collect(backend, units(&["A1", "B2"]), &quick_config(2))
        .await
        .unwrap_err();
    assert_eq!(err, PoolFailure::NoExecutors { attempted: 2 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partial_launch_failure_still_collects_everything() {
    let backend = Arc::new(FakeBackend::failing_launches(2));
    let results = collect(backend, units(&["A1", "B2", "C3", "D4"]), &quick_config(3))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|s| !s.is_error()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn round_deadline_aborts_workers() {
    let backend = Arc::new(FakeBackend::default());
    let config = PoolConfig {
        max_executors: 2,
        unit_timeout: Duration::from_secs(60),
        round_timeout: Duration::from_millis(150),
    };
    let err = collect(backend, units(&["OK1", "HANG1", "HANG2"]), &config)
        .await
        .unwrap_err();

    match err {
        PoolFailure::RoundTimeout { received, expected } => {
            assert_eq!(expected, 3);
            assert!(received <= 1);
        }
        other => panic!("expected round timeout, got {other:?}"),
    }
}

/// Slot 0 launches normally; every other slot never finishes launching.
struct StuckLaunchBackend {
    inner: FakeBackend,
}

#[async_trait]
impl CollectorBackend for StuckLaunchBackend {
    async fn launch(&self, slot: usize) -> Result<Box<dyn UnitExecutor>, CollectError> {
        if slot > 0 {
            std::future::pending::<()>().await;
        }
        self.inner.launch(slot).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stuck_launch_does_not_hold_a_finished_round() {
    let backend = Arc::new(StuckLaunchBackend {
        inner: FakeBackend::default(),
    });
    let config = PoolConfig {
        max_executors: 2,
        unit_timeout: Duration::from_secs(1),
        round_timeout: Duration::from_millis(500),
    };

    let results = tokio::time::timeout(
        Duration::from_secs(3),
        collect(backend, units(&["A1", "B2", "C3"]), &config),
    )
    .await
    .expect("round should finish once every unit is collected")
    .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|s| !s.is_error()));
}
