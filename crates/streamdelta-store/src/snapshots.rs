//! Daily snapshot persistence.

use chrono::NaiveDate;
use streamdelta_core::{DailySnapshot, TenantId};

use crate::blob::{BlobStore, VersionToken};
use crate::cas::update_text;
use crate::error::StoreError;
use crate::paths::{snapshot_path, TENANTS_ROOT};

/// Persists a tenant's snapshot for its date, replacing an earlier run from
/// the same day.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or the write fails.
pub async fn save_snapshot<S>(store: &S, snapshot: &DailySnapshot) -> Result<VersionToken, StoreError>
where
    S: BlobStore + ?Sized,
{
    let path = snapshot_path(&snapshot.tenant_id, snapshot.date);
    let text = serde_json::to_string_pretty(snapshot).map_err(|e| StoreError::Serialize {
        context: path.clone(),
        source: e,
    })?;
    let message = format!(
        "Update data for {} on {}",
        snapshot.tenant_id,
        snapshot.date.format("%Y-%m-%d")
    );

    let version = update_text(store, &path, &message, |_| Ok::<_, StoreError>(text.clone())).await?;
    tracing::info!(
        tenant = %snapshot.tenant_id,
        date = %snapshot.date,
        playlists = snapshot.playlists.len(),
        "store: snapshot persisted"
    );
    Ok(version)
}

/// Reads the snapshot for `tenant` on `date`.
///
/// A record whose tenant id differs from `tenant` is treated as absent.
///
/// # Errors
///
/// Returns [`StoreError`] on read failure or when the record is not a valid
/// snapshot.
pub async fn load_snapshot<S>(
    store: &S,
    tenant: &TenantId,
    date: NaiveDate,
) -> Result<Option<DailySnapshot>, StoreError>
where
    S: BlobStore + ?Sized,
{
    let path = snapshot_path(tenant, date);
    let Some(blob) = store.get(&path).await? else {
        return Ok(None);
    };

    let snapshot: DailySnapshot =
        serde_json::from_str(&blob.content).map_err(|e| StoreError::Deserialize {
            context: path.clone(),
            source: e,
        })?;

    if &snapshot.tenant_id != tenant {
        tracing::warn!(
            path = %path,
            expected = %tenant,
            found = %snapshot.tenant_id,
            "store: snapshot tenant mismatch, ignoring record"
        );
        return Ok(None);
    }
    Ok(Some(snapshot))
}

/// Every tenant with a directory under the tenants root. Directory names
/// that are not valid tenant ids are skipped.
///
/// # Errors
///
/// Returns [`StoreError`] if the listing fails.
pub async fn list_tenants<S>(store: &S) -> Result<Vec<TenantId>, StoreError>
where
    S: BlobStore + ?Sized,
{
    let dirs = store.list_dirs(TENANTS_ROOT).await?;
    Ok(dirs
        .into_iter()
        .filter_map(|name| match TenantId::parse(&name) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "store: skipping tenant directory");
                None
            }
        })
        .collect())
}
