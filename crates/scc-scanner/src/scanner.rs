//! The scan operation itself: stateless, side-effect free, never writes.

use std::cmp::Reverse;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scc_models::{Recording, StorageVolume};

use crate::error::{ScanDiagnostic, ScanError};
use crate::policy::ScanPolicy;

/// Result of scanning one volume: possibly-empty recordings plus an optional
/// non-fatal diagnostic the caller should log or surface to the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub recordings: Vec<Recording>,
    pub diagnostic: Option<ScanDiagnostic>,
}

struct Candidate {
    recording: Recording,
    tier: usize,
}

/// Scan `volume` for candidate recordings per `policy`.
///
/// A missing or unreadable mount is a soft failure: this returns `Ok` with an
/// empty recording list and a [`ScanDiagnostic::VolumeUnavailable`], so the
/// dispatcher can mark the corresponding sub-job skipped rather than failed.
/// An unreadable subtree below the mount root is logged and skipped without
/// affecting the rest of the scan.
pub async fn scan(volume: &StorageVolume, policy: &ScanPolicy) -> Result<ScanOutcome, ScanError> {
    if !volume.enabled {
        return Ok(ScanOutcome {
            recordings: Vec::new(),
            diagnostic: Some(ScanDiagnostic::VolumeUnavailable {
                reason: "volume disabled".to_string(),
            }),
        });
    }

    let timeout = Duration::from_secs(policy.scan_timeout_secs);
    match tokio::time::timeout(timeout, scan_inner(volume, policy)).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(ScanError::VolumeUnavailable { reason })) => {
            tracing::warn!(volume = %volume.id, %reason, "volume unavailable during scan");
            Ok(ScanOutcome {
                recordings: Vec::new(),
                diagnostic: Some(ScanDiagnostic::VolumeUnavailable { reason }),
            })
        }
        Ok(Err(e)) => Err(e),
        Err(_) => {
            let reason = format!("scan exceeded {}s timeout", policy.scan_timeout_secs);
            tracing::warn!(volume = %volume.id, "scan timed out");
            Ok(ScanOutcome {
                recordings: Vec::new(),
                diagnostic: Some(ScanDiagnostic::VolumeUnavailable { reason }),
            })
        }
    }
}

async fn scan_inner(volume: &StorageVolume, policy: &ScanPolicy) -> Result<ScanOutcome, ScanError> {
    let root = &volume.mount_path;
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ScanError::VolumeUnavailable {
                reason: format!("{} is not a directory", root.display()),
            })
        }
        Err(e) => {
            return Err(ScanError::VolumeUnavailable {
                reason: format!("{} not reachable: {}", root.display(), e),
            })
        }
    }

    let mut candidates = Vec::new();
    walk(root, root, &volume.id, 0, policy, &mut candidates).await;

    candidates.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| Reverse(a.recording.mtime).cmp(&Reverse(b.recording.mtime)))
            .then_with(|| a.recording.absolute_path.cmp(&b.recording.absolute_path))
    });
    candidates.truncate(policy.recent_n);

    Ok(ScanOutcome {
        recordings: candidates.into_iter().map(|c| c.recording).collect(),
        diagnostic: None,
    })
}

/// Priority tier for a direct child of the volume root: its index in
/// `subtree_priority` if it names a priority subtree, else the fallback tier
/// (everything else, including loose root-level files).
fn tier_for(root: &Path, dir: &Path, policy: &ScanPolicy) -> usize {
    if dir == root {
        return policy.subtree_priority.len();
    }
    if let Ok(rel) = dir.strip_prefix(root) {
        if let Some(first) = rel.components().next() {
            let name = first.as_os_str().to_string_lossy();
            if let Some(idx) = policy.subtree_priority.iter().position(|p| p.as_str() == name) {
                return idx;
            }
        }
    }
    policy.subtree_priority.len()
}

fn walk<'a>(
    root: &'a Path,
    dir: &'a Path,
    volume_id: &'a scc_models::VolumeId,
    tier_hint: usize,
    policy: &'a ScanPolicy,
    out: &'a mut Vec<Candidate>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable subtree");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(e)) => e,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "aborting walk of subtree");
                    break;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                let child_tier = if dir == root { tier_for(root, &path, policy) } else { tier_hint };
                walk(root, &path, volume_id, child_tier, policy, out).await;
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
            if !policy.matches_extension(&ext) {
                continue;
            }

            let meta = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let size_bytes = meta.len();
            if size_bytes <= policy.min_size_bytes {
                continue;
            }

            if policy.skip_if_caption_exists && caption_sidecar_exists(&path).await {
                continue;
            }

            let mtime = mtime_of(&meta);
            let recording = Recording::new(volume_id.clone(), path.clone(), size_bytes, mtime);
            let tier = if dir == root { tier_for(root, dir, policy) } else { tier_hint };
            out.push(Candidate { recording, tier });
        }
    })
}

async fn caption_sidecar_exists(recording_path: &Path) -> bool {
    let sidecar = recording_path.with_extension("scc");
    match tokio::fs::metadata(&sidecar).await {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

fn mtime_of(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .ok()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(Utc::now)
}

/// Recompute the fingerprint of an already-discovered recording. Exposed
/// alongside `scan` so callers auditing a stale Recording snapshot (the
/// caption-check flow) can detect whether the underlying file has changed.
pub fn fingerprint(recording: &Recording) -> scc_models::Fingerprint {
    scc_models::compute_fingerprint(
        &recording.volume_id,
        &recording.absolute_path,
        recording.mtime,
        recording.size_bytes,
    )
}
