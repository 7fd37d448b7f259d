//! Filesystem utilities for job work directories.

use std::path::Path;
use tokio::fs;

/// Remove a directory tree, logging rather than failing on error.
pub async fn remove_dir_best_effort(dir: impl AsRef<Path>) {
    let dir = dir.as_ref();
    if !dir.exists() {
        return;
    }
    if let Err(e) = fs::remove_dir_all(dir).await {
        tracing::warn!(dir = %dir.display(), %e, "failed to remove work directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_removes_populated_tree() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("job-1");
        fs::create_dir_all(work.join("clips")).await.unwrap();
        fs::write(work.join("clips/clip_0.mp4"), b"x").await.unwrap();

        remove_dir_best_effort(&work).await;
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn test_missing_dir_is_a_no_op() {
        remove_dir_best_effort("/tmp/clipkit-definitely-missing-dir").await;
    }
}
