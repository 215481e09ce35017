//! Scoped acquisition of a per-fingerprint working directory. Released on
//! every exit path unless explicitly persisted — the default policy until
//! Cleanup runs, so a crashed or retried run can resume from its artifacts.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Guard around a working directory under `temp_root/<fingerprint>`. Dropping
/// it without calling [`ScopedTempDir::persist`] removes the directory
/// (best-effort, synchronously, since `Drop` cannot be async).
pub struct ScopedTempDir {
    path: PathBuf,
    persist: bool,
}

impl ScopedTempDir {
    /// Create (idempotently) and return the scoped directory for `fingerprint`.
    pub async fn acquire(temp_root: &Path, fingerprint: &str) -> std::io::Result<Self> {
        let path = temp_root.join(fingerprint);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, persist: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory on drop. Used whenever the pipeline stops short of
    /// Cleanup so a later resume can find its artifacts.
    pub fn persist(&mut self) {
        self.persist = true;
    }

    /// Mark the directory for removal on drop. Called once Cleanup has
    /// copied out everything it needs.
    pub fn discard(&mut self) {
        self.persist = false;
    }
}

impl Drop for ScopedTempDir {
    fn drop(&mut self) {
        if self.persist {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove scoped temp dir");
            }
        } else {
            debug!(path = %self.path.display(), "removed scoped temp dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_creates_the_directory() {
        let root = tempdir().unwrap();
        let guard = ScopedTempDir::acquire(root.path(), "abc123").await.unwrap();
        assert!(guard.path().exists());
    }

    #[tokio::test]
    async fn discarded_guard_removes_directory_on_drop() {
        let root = tempdir().unwrap();
        let path;
        {
            let mut guard = ScopedTempDir::acquire(root.path(), "abc123").await.unwrap();
            guard.discard();
            path = guard.path().to_path_buf();
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn persisted_guard_keeps_directory_on_drop() {
        let root = tempdir().unwrap();
        let path;
        {
            let guard = ScopedTempDir::acquire(root.path(), "abc123").await.unwrap();
            path = guard.path().to_path_buf();
        }
        assert!(path.exists());
    }
}
