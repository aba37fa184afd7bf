//! Collection-unit capability.
//!
//! A [`CollectorBackend`] hands out executors; an executor collects one
//! playlist at a time. Executors are owned by a single worker for the length
//! of one round and dropped afterwards.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use streamdelta_core::{CollectionUnit, PlaylistSnapshot};

use crate::error::CollectError;

#[async_trait]
pub trait UnitExecutor: Send {
    async fn collect(&mut self, unit: &CollectionUnit) -> Result<PlaylistSnapshot, CollectError>;
}

#[async_trait]
pub trait CollectorBackend: Send + Sync {
    /// Prepares the executor for worker `slot`.
    async fn launch(&self, slot: usize) -> Result<Box<dyn UnitExecutor>, CollectError>;
}

/// Runs one unit on `executor`, bounded by `limit`.
///
/// Always yields exactly one snapshot tagged with `unit`: errors, panics and
/// timeouts become [`PlaylistSnapshot::failed`]. On timeout the in-flight
/// call is dropped.
pub(crate) async fn run_unit(
    executor: &mut dyn UnitExecutor,
    unit: &CollectionUnit,
    limit: Duration,
) -> PlaylistSnapshot {
    let call = AssertUnwindSafe(executor.collect(unit)).catch_unwind();
    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CollectError::Panicked(panic_message(panic.as_ref()))),
        Err(_) => Err(CollectError::Timeout(limit)),
    };
    settle(unit, outcome)
}

/// Turns a collection outcome into the snapshot recorded for `unit`.
pub(crate) fn settle(
    unit: &CollectionUnit,
    outcome: Result<PlaylistSnapshot, CollectError>,
) -> PlaylistSnapshot {
    match outcome {
        Ok(snapshot) => snapshot.tagged(unit),
        Err(e) => {
            tracing::warn!(unit = %unit.id, error = %e, "collector: unit failed");
            PlaylistSnapshot::failed(unit, e.to_string())
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
