//! One-unit-at-a-time fallback used when a parallel round fails.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use streamdelta_core::{CollectionUnit, PlaylistSnapshot};

use crate::backend::{panic_message, settle, CollectorBackend};
use crate::dispatcher::{collect, PoolConfig};
use crate::error::CollectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    Pool,
    Sequential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub snapshots: Vec<PlaylistSnapshot>,
    pub mode: RoundMode,
}

/// Collects `units` one at a time, each with a freshly launched executor.
///
/// `unit_timeout` covers launch plus collection. Returns exactly one
/// snapshot per unit, in input order.
pub async fn collect_sequential<B>(
    backend: &B,
    units: &[CollectionUnit],
    unit_timeout: Duration,
) -> Vec<PlaylistSnapshot>
where
    B: CollectorBackend + ?Sized,
{
    let mut snapshots = Vec::with_capacity(units.len());

    for (index, unit) in units.iter().enumerate() {
        tracing::info!(
            unit = %unit.id,
            position = index + 1,
            total = units.len(),
            "sequential: collecting"
        );
        let attempt = async {
            let mut executor = backend.launch(index).await?;
            executor.collect(unit).await
        };
        let outcome = match tokio::time::timeout(
            unit_timeout,
            AssertUnwindSafe(attempt).catch_unwind(),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(CollectError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(CollectError::Timeout(unit_timeout)),
        };
        snapshots.push(settle(unit, outcome));
    }

    snapshots
}

/// Runs a parallel round and falls back to sequential collection when the
/// pool fails.
pub async fn collect_with_fallback<B>(
    backend: Arc<B>,
    units: Vec<CollectionUnit>,
    config: &PoolConfig,
) -> RoundOutcome
where
    B: CollectorBackend + ?Sized + 'static,
{
    match collect(Arc::clone(&backend), units.clone(), config).await {
        Ok(snapshots) => RoundOutcome {
            snapshots,
            mode: RoundMode::Pool,
        },
        Err(failure) => {
            tracing::warn!(
                error = %failure,
                units = units.len(),
                "dispatcher: pool failed, switching to sequential collection"
            );
            RoundOutcome {
                snapshots: collect_sequential(backend.as_ref(), &units, config.unit_timeout).await,
                mode: RoundMode::Sequential,
            }
        }
    }
}
