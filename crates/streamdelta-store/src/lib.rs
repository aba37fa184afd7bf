//! Versioned persistence for streamdelta.
//!
//! A [`BlobStore`] holds text records addressed by relative path, each with a
//! [`VersionToken`]. The helpers in this crate layer the playlist domain on
//! top: source lists, trigger state, daily snapshots, and the completion
//! poller that waits for a snapshot to appear.

pub mod blob;
pub mod cas;
pub mod error;
pub mod github;
pub mod local;
pub mod memory;
pub mod paths;
pub mod poll;
mod retry;
pub mod snapshots;
pub mod sources;
pub mod triggers;

use std::sync::Arc;

use streamdelta_core::StoreConfig;

pub use blob::{Blob, BlobStore, VersionToken, Versioned};
pub use cas::{update_json, update_text};
pub use error::StoreError;
pub use github::GithubStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use poll::{await_snapshot, PollConfig, PollOutcome};
pub use snapshots::{list_tenants, load_snapshot, save_snapshot};
pub use sources::{
    add_source, load_sources, remove_source, AddOutcome, RemoveOutcome, SourceError, SourceList,
};
pub use triggers::{disable_trigger, load_global_trigger, load_trigger, save_trigger};

/// Builds the configured store backend.
///
/// # Errors
///
/// Returns [`StoreError::Config`] for a malformed GitHub repo or API base, or
/// [`StoreError::Http`] if the HTTP client cannot be built.
pub fn store_from_config(
    config: &StoreConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn BlobStore>, StoreError> {
    match config {
        StoreConfig::Github {
            token,
            repo,
            api_base,
        } => {
            tracing::debug!(repo = %repo, api_base = %api_base, "store: using GitHub contents backend");
            Ok(Arc::new(GithubStore::with_base_url(
                token,
                repo,
                timeout_secs,
                api_base,
            )?))
        }
        StoreConfig::Local { root } => {
            tracing::debug!(root = %root.display(), "store: using local directory backend");
            Ok(Arc::new(LocalStore::new(root.clone())))
        }
    }
}
