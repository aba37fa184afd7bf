//! Per-tenant source lists (`urls.txt`).
//!
//! One playlist URL per line; blank lines and `#` comments are ignored. The
//! file is always rewritten with its comment header and normalized URLs.

use streamdelta_core::{CollectionUnit, TenantId, ValidationError};
use thiserror::Error;

use crate::blob::{BlobStore, VersionToken};
use crate::cas::update_text;
use crate::error::StoreError;
use crate::paths::sources_path;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A tenant's parsed source list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceList {
    pub units: Vec<CollectionUnit>,
    /// Non-comment lines that are not supported playlist URLs.
    pub skipped: Vec<String>,
    pub version: Option<VersionToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { unit: CollectionUnit, total: usize },
    AlreadyPresent { unit: CollectionUnit },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { unit: CollectionUnit, remaining: usize },
    NotFound,
}

/// Parses source-list text into units, de-duplicated by unit id.
#[must_use]
pub fn parse_source_list(content: &str) -> (Vec<CollectionUnit>, Vec<String>) {
    let mut units: Vec<CollectionUnit> = Vec::new();
    let mut skipped = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match CollectionUnit::parse(line) {
            Ok(unit) if units.iter().any(|u| u.id == unit.id) => {}
            Ok(unit) => units.push(unit),
            Err(_) => skipped.push(line.to_owned()),
        }
    }
    (units, skipped)
}

#[must_use]
pub fn render_source_list(tenant: &TenantId, units: &[CollectionUnit]) -> String {
    let mut out = format!(
        "# Playlist URLs for Chat ID: {tenant}\n# Add one URL per line\n# Format: https://app.artist.tools/playlist/ID\n\n"
    );
    let urls: Vec<&str> = units.iter().map(|u| u.url.as_str()).collect();
    out.push_str(&urls.join("\n"));
    out
}

/// Loads a tenant's source list. A missing file is an empty list.
///
/// # Errors
///
/// Returns [`StoreError`] if the read fails.
pub async fn load_sources<S>(store: &S, tenant: &TenantId) -> Result<SourceList, StoreError>
where
    S: BlobStore + ?Sized,
{
    let Some(blob) = store.get(&sources_path(tenant)).await? else {
        tracing::debug!(tenant = %tenant, "store: no source list, treating as empty");
        return Ok(SourceList::default());
    };

    let (units, skipped) = parse_source_list(&blob.content);
    if !skipped.is_empty() {
        tracing::warn!(
            tenant = %tenant,
            skipped = skipped.len(),
            "store: ignoring unsupported lines in source list"
        );
    }
    Ok(SourceList {
        units,
        skipped,
        version: Some(blob.version),
    })
}

/// Adds a playlist URL to a tenant's source list.
///
/// # Errors
///
/// [`SourceError::Validation`] for unsupported URLs (nothing is written),
/// [`SourceError::Store`] when the read or write fails.
pub async fn add_source<S>(store: &S, tenant: &TenantId, raw_url: &str) -> Result<AddOutcome, SourceError>
where
    S: BlobStore + ?Sized,
{
    let unit = CollectionUnit::parse(raw_url)?;
    let message = format!("Update playlist file for chat {tenant}");
    let mut outcome = None;

    update_text(store, &sources_path(tenant), &message, |current| {
        let (mut units, _) = parse_source_list(current.unwrap_or_default());
        if units.iter().any(|u| u.id == unit.id) {
            outcome = Some(AddOutcome::AlreadyPresent { unit: unit.clone() });
            return Ok::<_, SourceError>(current.unwrap_or_default().to_owned());
        }
        units.push(unit.clone());
        outcome = Some(AddOutcome::Added {
            unit: unit.clone(),
            total: units.len(),
        });
        Ok(render_source_list(tenant, &units))
    })
    .await?;

    if let Some(AddOutcome::Added { total, .. }) = &outcome {
        tracing::info!(tenant = %tenant, unit = %unit, total, "store: playlist added");
    }
    Ok(outcome.unwrap_or(AddOutcome::AlreadyPresent { unit }))
}

/// Removes a playlist from a tenant's source list. Matches the raw text, the
/// normalized URL, or the playlist id.
///
/// # Errors
///
/// [`SourceError::Store`] when the read or write fails.
pub async fn remove_source<S>(
    store: &S,
    tenant: &TenantId,
    raw: &str,
) -> Result<RemoveOutcome, SourceError>
where
    S: BlobStore + ?Sized,
{
    let raw = raw.trim();
    let wanted_id = CollectionUnit::parse(raw).ok().map(|u| u.id);
    let is_target = |unit: &CollectionUnit| {
        unit.url == raw || unit.id == raw || wanted_id.as_deref() == Some(unit.id.as_str())
    };

    let path = sources_path(tenant);
    if store.get(&path).await?.is_none() {
        return Ok(RemoveOutcome::NotFound);
    }

    let message = format!("Update playlist file for chat {tenant}");
    let mut outcome = RemoveOutcome::NotFound;

    update_text(store, &path, &message, |current| {
        let (units, _) = parse_source_list(current.unwrap_or_default());
        let Some(position) = units.iter().position(&is_target) else {
            outcome = RemoveOutcome::NotFound;
            return Ok::<_, SourceError>(current.unwrap_or_default().to_owned());
        };
        let mut kept = units;
        let removed = kept.remove(position);
        outcome = RemoveOutcome::Removed {
            unit: removed,
            remaining: kept.len(),
        };
        Ok(render_source_list(tenant, &kept))
    })
    .await?;

    if let RemoveOutcome::Removed { unit, remaining } = &outcome {
        tracing::info!(tenant = %tenant, unit = %unit, remaining, "store: playlist removed");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn tenant() -> TenantId {
        TenantId::parse("777").unwrap()
    }

    #[test]
    fn parse_skips_comments_blanks_and_duplicates() {
        let content = "# header\n\nhttps://artist.tools/playlist/A1\n  https://open.spotify.com/playlist/A1?si=x \nhttps://example.com/x\nhttps://app.artist.tools/playlist/B2\n";
        let (units, skipped) = parse_source_list(content);
        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "B2"]);
        assert_eq!(skipped, vec!["https://example.com/x".to_string()]);
    }

    #[test]
    fn render_keeps_header() {
        let units = vec![CollectionUnit::parse("https://app.artist.tools/playlist/A1").unwrap()];
        let text = render_source_list(&tenant(), &units);
        assert!(text.starts_with("# Playlist URLs for Chat ID: 777\n"));
        assert!(text.ends_with("https://app.artist.tools/playlist/A1"));
    }

    #[tokio::test]
    async fn add_normalizes_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let first = add_source(&store, &tenant(), "https://open.spotify.com/playlist/A1?si=1")
            .await
            .unwrap();
        assert!(matches!(first, AddOutcome::Added { total: 1, .. }));

        let dup = add_source(&store, &tenant(), "https://artist.tools/playlist/A1")
            .await
            .unwrap();
        assert!(matches!(dup, AddOutcome::AlreadyPresent { .. }));
        assert_eq!(store.write_count(), 1);

        let list = load_sources(&store, &tenant()).await.unwrap();
        assert_eq!(list.units.len(), 1);
        assert_eq!(list.units[0].url, "https://app.artist.tools/playlist/A1");
    }

    #[tokio::test]
    async fn add_rejects_unsupported_url_without_writing() {
        let store = MemoryStore::new();
        let err = add_source(&store, &tenant(), "https://example.com/playlist/A1")
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Validation(ValidationError::UnsupportedUrl(_))));
        assert!(store.paths().is_empty());
    }

    #[tokio::test]
    async fn remove_matches_any_url_variant() {
        let store = MemoryStore::new();
        add_source(&store, &tenant(), "https://app.artist.tools/playlist/A1").await.unwrap();
        add_source(&store, &tenant(), "https://app.artist.tools/playlist/B2").await.unwrap();

        let removed = remove_source(&store, &tenant(), "https://open.spotify.com/playlist/A1")
            .await
            .unwrap();
        assert!(matches!(removed, RemoveOutcome::Removed { remaining: 1, .. }));

        let missing = remove_source(&store, &tenant(), "https://app.artist.tools/playlist/ZZ")
            .await
            .unwrap();
        assert_eq!(missing, RemoveOutcome::NotFound);

        let list = load_sources(&store, &tenant()).await.unwrap();
        assert_eq!(list.units[0].id, "B2");
    }

    #[tokio::test]
    async fn missing_list_is_empty() {
        let store = MemoryStore::new();
        let list = load_sources(&store, &tenant()).await.unwrap();
        assert!(list.units.is_empty());
        assert!(list.version.is_none());
    }
}
