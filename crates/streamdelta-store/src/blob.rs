//! Versioned blob-store capability.
//!
//! Every record carries an opaque [`VersionToken`]. Writes present the token
//! they observed; a stale token is rejected with [`StoreError::Conflict`]
//! instead of silently overwriting a concurrent change.

use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;

/// Opaque version of a stored record (a blob SHA for the GitHub backend, a
/// content hash for the local backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored record and the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
    pub version: VersionToken,
}

/// A decoded record plus the version it was read at. `version` is `None`
/// when the record does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: Option<VersionToken>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads a record. `Ok(None)` when the path does not exist.
    async fn get(&self, path: &str) -> Result<Option<Blob>, StoreError>;

    /// Writes a record.
    ///
    /// `expected = None` means create-only: the write fails with
    /// [`StoreError::Conflict`] if the path already exists. `Some(token)`
    /// must match the current version.
    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError>;

    /// Lists the names of the immediate sub-directories of `prefix`.
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Rejects absolute paths and `..` segments before they reach a backend.
pub(crate) fn validate_path(path: &str) -> Result<(), StoreError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(())
}
