//! Local-disk artifact store for development and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::{ArtifactStore, StoredArtifact};

/// Stores artifacts under a root directory, keyed by relative path.
///
/// URLs use the `file://` scheme; only useful when producer and consumer
/// share a filesystem.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        if key.split('/').any(|part| part == "..") || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("file://{}/{key}", self.root.display())
    }
}

#[async_trait]
impl ArtifactStore for LocalDiskStore {
    async fn fetch(&self, key: &str, dest: &Path) -> StorageResult<()> {
        let src = self.resolve(key)?;
        if !src.exists() {
            return Err(StorageError::not_found(key));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, dest).await?;
        Ok(())
    }

    async fn store_file(
        &self,
        path: &Path,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<StoredArtifact> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest).await?;

        debug!(key, "stored file locally");
        Ok(StoredArtifact {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    async fn store_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<StoredArtifact> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, data).await?;

        Ok(StoredArtifact {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32> {
        let dir = self.resolve(prefix)?;
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        let mut stack = vec![dir.clone()];
        while let Some(d) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&d).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    count += 1;
                }
            }
        }
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(count)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.resolve(key)?.exists())
    }
}
