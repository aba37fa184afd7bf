//! Compare-and-swap updates.
//!
//! A read-modify-write against the store: read the record with its version,
//! apply the mutation, write back with the observed version. If the write
//! loses a race, the record is re-read and the mutation re-applied to the
//! fresh content exactly once before the conflict is surfaced.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blob::{BlobStore, VersionToken, Versioned};
use crate::error::StoreError;

const MAX_ATTEMPTS: u32 = 2;

async fn update_with<S, F, R, E>(
    store: &S,
    path: &str,
    message: &str,
    mut apply: F,
) -> Result<(R, VersionToken), E>
where
    S: BlobStore + ?Sized,
    F: FnMut(Option<&str>) -> Result<(String, R), E>,
    E: From<StoreError>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let current = store.get(path).await?;
        let (next, result) = apply(current.as_ref().map(|b| b.content.as_str()))?;

        if let Some(blob) = &current {
            if blob.content == next {
                return Ok((result, blob.version.clone()));
            }
        }

        let expected = current.as_ref().map(|b| &b.version);
        match store.put(path, &next, expected, message).await {
            Ok(version) => return Ok((result, version)),
            Err(StoreError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(path, "cas: version conflict, re-reading and retrying once");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Read-modify-write of a text record.
///
/// `apply` receives the current content (`None` when absent) and returns the
/// new content. Returning the unchanged content skips the write.
///
/// # Errors
///
/// Returns whatever `apply` returns, or the [`StoreError`] from the store;
/// [`StoreError::Conflict`] if the write loses twice.
pub async fn update_text<S, F, E>(
    store: &S,
    path: &str,
    message: &str,
    mut apply: F,
) -> Result<VersionToken, E>
where
    S: BlobStore + ?Sized,
    F: FnMut(Option<&str>) -> Result<String, E>,
    E: From<StoreError>,
{
    let ((), version) =
        update_with::<S, _, (), E>(store, path, message, |current| {
            Ok((apply(current)?, ()))
        })
        .await?;
    Ok(version)
}

/// Read-modify-write of a JSON record.
///
/// # Errors
///
/// As [`update_text`], plus [`StoreError::Deserialize`] when the stored
/// record is not valid JSON for `T`.
pub async fn update_json<S, T, F, E>(
    store: &S,
    path: &str,
    message: &str,
    mut apply: F,
) -> Result<Versioned<T>, E>
where
    S: BlobStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> Result<T, E>,
    E: From<StoreError>,
{
    let (value, version) = update_with::<S, _, T, E>(store, path, message, |current| {
        let parsed = current
            .map(serde_json::from_str::<T>)
            .transpose()
            .map_err(|e| StoreError::Deserialize {
                context: path.to_owned(),
                source: e,
            })?;
        let next = apply(parsed)?;
        let text = serde_json::to_string_pretty(&next).map_err(|e| StoreError::Serialize {
            context: path.to_owned(),
            source: e,
        })?;
        Ok((text, next))
    })
    .await?;

    Ok(Versioned {
        value,
        version: Some(version),
    })
}
