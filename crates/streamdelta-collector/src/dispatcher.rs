//! Bounded-parallel collection round.
//!
//! Units sit in one FIFO queue owned by the round. Up to `max_executors`
//! workers each launch an executor, then pop and collect units until the
//! queue is empty, posting exactly one snapshot per unit. The round as a
//! whole is bounded by `round_timeout`; every unit call by `unit_timeout`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use streamdelta_core::{AppConfig, CollectionUnit, PlaylistSnapshot};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::backend::{run_unit, CollectorBackend};
use crate::error::PoolFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_executors: usize,
    pub unit_timeout: Duration,
    pub round_timeout: Duration,
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_executors: config.pool_max_executors,
            unit_timeout: config.unit_timeout(),
            round_timeout: config.round_timeout(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_executors: 4,
            unit_timeout: Duration::from_secs(300),
            round_timeout: Duration::from_secs(600),
        }
    }
}

/// Pending units of one round. Workers only ever pop.
#[derive(Clone)]
struct UnitQueue {
    inner: Arc<Mutex<VecDeque<CollectionUnit>>>,
}

impl UnitQueue {
    fn new(units: Vec<CollectionUnit>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(units.into())),
        }
    }

    fn pop(&self) -> Option<CollectionUnit> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

enum WorkerEvent {
    Launched { slot: usize },
    LaunchFailed { slot: usize },
    Collected(PlaylistSnapshot),
}

/// Collects every unit with at most `config.max_executors` in flight.
///
/// Returns one snapshot per unit, in completion order.
///
/// # Errors
///
/// - [`PoolFailure::NoExecutors`] when no worker could launch an executor.
/// - [`PoolFailure::RoundTimeout`] when the round deadline passes first.
///
/// Workers are aborted when the round ends either way, so an executor stuck
/// in `launch` never outlives the round.
/// - [`PoolFailure::WorkersExited`] when every worker stopped with units
///   still unaccounted for.
pub async fn collect<B>(
    backend: Arc<B>,
    units: Vec<CollectionUnit>,
    config: &PoolConfig,
) -> Result<Vec<PlaylistSnapshot>, PoolFailure>
where
    B: CollectorBackend + ?Sized + 'static,
{
    let expected = units.len();
    if expected == 0 {
        return Ok(Vec::new());
    }

    let pool_size = config.max_executors.clamp(1, expected);
    let deadline = Instant::now() + config.round_timeout;
    let queue = UnitQueue::new(units);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut workers = JoinSet::new();

    tracing::info!(units = expected, pool_size, "dispatcher: starting round");

    for slot in 0..pool_size {
        workers.spawn(run_worker(
            Arc::clone(&backend),
            slot,
            queue.clone(),
            tx.clone(),
            config.unit_timeout,
        ));
    }
    drop(tx);

    let mut results = Vec::with_capacity(expected);
    let drained = tokio::time::timeout_at(
        deadline,
        drain(&mut rx, &mut results, expected, pool_size),
    )
    .await;

    let outcome = match drained {
        Ok(Ok(())) => Ok(()),
        Ok(Err(failure)) => Err(failure),
        Err(_) => Err(PoolFailure::RoundTimeout {
            received: results.len(),
            expected,
        }),
    };

    // Every unit is accounted for (or the round failed); a worker still
    // launching or idle has nothing left to do.
    workers.abort_all();
    while workers.join_next().await.is_some() {}

    match outcome {
        Ok(()) => {
            tracing::info!(
                units = expected,
                errors = results.iter().filter(|s| s.is_error()).count(),
                "dispatcher: round complete"
            );
            Ok(results)
        }
        Err(failure) => {
            tracing::warn!(error = %failure, "dispatcher: round failed");
            Err(failure)
        }
    }
}

async fn drain(
    rx: &mut mpsc::UnboundedReceiver<WorkerEvent>,
    results: &mut Vec<PlaylistSnapshot>,
    expected: usize,
    pool_size: usize,
) -> Result<(), PoolFailure> {
    let mut launch_failures = 0usize;

    while results.len() < expected {
        match rx.recv().await {
            Some(WorkerEvent::Collected(snapshot)) => results.push(snapshot),
            Some(WorkerEvent::Launched { slot }) => {
                tracing::debug!(slot, "dispatcher: executor launched");
            }
            Some(WorkerEvent::LaunchFailed { slot }) => {
                launch_failures += 1;
                tracing::warn!(slot, launch_failures, "dispatcher: executor launch failed");
                if launch_failures == pool_size {
                    return Err(PoolFailure::NoExecutors {
                        attempted: pool_size,
                    });
                }
            }
            None => {
                return Err(PoolFailure::WorkersExited {
                    received: results.len(),
                    expected,
                });
            }
        }
    }
    Ok(())
}

async fn run_worker<B>(
    backend: Arc<B>,
    slot: usize,
    queue: UnitQueue,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    unit_timeout: Duration,
) where
    B: CollectorBackend + ?Sized,
{
    let mut executor = match backend.launch(slot).await {
        Ok(executor) => executor,
        Err(e) => {
            tracing::warn!(slot, error = %e, "dispatcher: launch error");
            let _ = tx.send(WorkerEvent::LaunchFailed { slot });
            return;
        }
    };
    let _ = tx.send(WorkerEvent::Launched { slot });

    while let Some(unit) = queue.pop() {
        let snapshot = run_unit(executor.as_mut(), &unit, unit_timeout).await;
        if tx.send(WorkerEvent::Collected(snapshot)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
