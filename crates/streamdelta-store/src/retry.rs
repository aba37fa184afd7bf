//! Single retry for transient store reads.
//!
//! Reads against the remote store are retried exactly once after a short
//! pause when the failure looks transient (network error or 5xx). Writes are
//! never retried here; they go through the compare-and-swap helper instead.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

pub(crate) const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Returns `true` for errors worth one more attempt.
pub(crate) fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        StoreError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
        StoreError::Simulated(_) => true,
        StoreError::Conflict { .. }
        | StoreError::Deserialize { .. }
        | StoreError::Serialize { .. }
        | StoreError::Encoding { .. }
        | StoreError::Io { .. }
        | StoreError::InvalidPath(_)
        | StoreError::Config(_) => false,
    }
}

/// Runs `operation`, retrying once after `delay` on a transient error.
pub(crate) async fn retry_transient<T, F, Fut>(
    path: &str,
    delay: Duration,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(err) if is_transient(&err) => {
            tracing::warn!(path, error = %err, "store: transient read failure, retrying once");
            tokio::time::sleep(delay).await;
            operation().await
        }
        Err(err) => Err(err),
    }
}
