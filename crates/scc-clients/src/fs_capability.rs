//! Filesystem capability used by the pipeline's artifact stages: bounded
//! retry around transient I/O, and a cross-device-safe atomic rename.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;

use scc_queue::{retry_async, BackoffPolicy, RetryConfig};

use crate::error::{FsCapabilityError, FsCapabilityResult};

fn retry_config(operation: &str) -> RetryConfig {
    RetryConfig::new(operation, 3).with_backoff(BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(2)))
}

fn wrap(path: &Path, source: std::io::Error) -> FsCapabilityError {
    FsCapabilityError::Io { path: path.display().to_string(), source }
}

pub async fn stat(path: &Path) -> FsCapabilityResult<std::fs::Metadata> {
    retry_async(&retry_config("stat"), || async { fs::metadata(path).await.map_err(|e| wrap(path, e)) }).await
}

pub async fn read_dir(path: &Path) -> FsCapabilityResult<Vec<PathBuf>> {
    retry_async(&retry_config("read_dir"), || async {
        let mut entries = fs::read_dir(path).await.map_err(|e| wrap(path, e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| wrap(path, e))? {
            out.push(entry.path());
        }
        Ok(out)
    })
    .await
}

/// Create an empty temp file under `dir` with a unique name, returning its
/// path. Callers write into it, then call [`atomic_rename`] into place.
pub async fn create_temp_file(dir: &Path, prefix: &str) -> FsCapabilityResult<PathBuf> {
    let path = dir.join(format!("{prefix}.{}.part", uuid::Uuid::new_v4()));
    retry_async(&retry_config("create_temp_file"), || async {
        fs::File::create(&path).await.map_err(|e| wrap(&path, e))?;
        Ok(())
    })
    .await?;
    Ok(path)
}

/// Rename `src` into `dst`, falling back to copy-then-delete on EXDEV
/// (cross-device rename).
pub async fn atomic_rename(src: &Path, dst: &Path) -> FsCapabilityResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await.map_err(|e| wrap(parent, e))?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => copy_and_delete(src, dst).await,
        Err(e) => Err(wrap(src, e)),
    }
}

fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> FsCapabilityResult<()> {
    let tmp_dst = dst.with_extension("tmp");
    fs::copy(src, &tmp_dst).await.map_err(|e| wrap(src, e))?;
    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(wrap(dst, e));
    }
    fs::remove_file(src).await.ok();
    Ok(())
}

pub async fn remove(path: &Path) -> FsCapabilityResult<()> {
    retry_async(&retry_config("remove"), || async {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(wrap(path, e)),
        }
    })
    .await
}
