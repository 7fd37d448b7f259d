//! The artifact store abstraction.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// A stored artifact, addressable by key and reachable by URL.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Object key within the store
    pub key: String,
    /// URL clients can fetch the artifact from
    pub url: String,
}

/// Where job inputs come from and outputs go.
///
/// Keys are slash-separated paths namespaced per job, e.g.
/// `jobs/<job_id>/clips/clip_0.mp4`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download an object to a local file, creating parent directories.
    async fn fetch(&self, key: &str, dest: &Path) -> StorageResult<()>;

    /// Upload a local file under `key`.
    async fn store_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<StoredArtifact>;

    /// Upload raw bytes under `key`.
    async fn store_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<StoredArtifact>;

    /// Delete every object under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> StorageResult<u32>;

    /// Whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Content type from a file extension, defaulting to octet-stream.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("vtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}
