//! Blob store rooted at a local directory.
//!
//! Version tokens are SHA-256 digests of the file content. The
//! compare-then-write step runs under an in-process lock plus an advisory
//! lock on `<root>/.streamdelta.lock`, so two writers sharing a root cannot
//! both succeed with one stale token, even from separate processes.
//! Advisory locks only bind processes that take them; an editor writing
//! into the root directly is not serialized.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::blob::{validate_path, Blob, BlobStore, VersionToken};
use crate::error::StoreError;

const LOCK_FILE: &str = ".streamdelta.lock";

pub struct LocalStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        validate_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }

    /// Blocks until this handle holds the root's exclusive lock. The lock is
    /// released when the returned file is dropped.
    async fn lock_root(&self, path: &str) -> Result<File, StoreError> {
        let root = self.root.clone();
        let locked = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let file = File::options()
                .create(true)
                .truncate(false)
                .write(true)
                .open(root.join(LOCK_FILE))?;
            file.lock()?;
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()));

        locked.and_then(|r| r).map_err(|source| StoreError::Io {
            path: path.to_owned(),
            source,
        })
    }

    async fn read(&self, path: &str, file: &Path) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(file).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io {
                path: path.to_owned(),
                source: e,
            }),
        }
    }
}

fn content_token(content: &str) -> VersionToken {
    VersionToken::new(format!("{:x}", Sha256::digest(content.as_bytes())))
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        let file = self.resolve(path)?;
        Ok(self.read(path, &file).await?.map(|content| Blob {
            version: content_token(&content),
            content,
        }))
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        _message: &str,
    ) -> Result<VersionToken, StoreError> {
        let file = self.resolve(path)?;
        let io_err = |source| StoreError::Io {
            path: path.to_owned(),
            source,
        };

        let _guard = self.write_lock.lock().await;
        let _root_lock = self.lock_root(path).await?;

        let current = self.read(path, &file).await?.map(|c| content_token(&c));
        if current.as_ref() != expected {
            return Err(StoreError::Conflict {
                path: path.to_owned(),
            });
        }

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let staging = file.with_extension("tmp~");
        tokio::fs::write(&staging, content).await.map_err(io_err)?;
        tokio::fs::rename(&staging, &file).await.map_err(io_err)?;

        Ok(content_token(content))
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: prefix.to_owned(),
                    source: e,
                })
            }
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::Io {
            path: prefix.to_owned(),
            source: e,
        })? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    dirs.push(name.to_owned());
                }
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
