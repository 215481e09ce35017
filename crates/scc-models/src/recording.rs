//! Recordings discovered by the storage scanner.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::ids::{Fingerprint, VolumeId};

/// A file discovered on a flex volume.
///
/// Snapshotted by value at discovery time so the pipeline is decoupled from
/// live filesystem changes on the source volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recording {
    pub volume_id: VolumeId,
    pub absolute_path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    #[schemars(with = "String")]
    pub mtime: DateTime<Utc>,
    pub ext: String,
    pub fingerprint: Fingerprint,
}

impl Recording {
    /// Build a Recording from discovered filesystem facts, computing its fingerprint.
    pub fn new(
        volume_id: VolumeId,
        absolute_path: PathBuf,
        size_bytes: u64,
        mtime: DateTime<Utc>,
    ) -> Self {
        let filename = absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = absolute_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let fingerprint = compute_fingerprint(&volume_id, &absolute_path, mtime, size_bytes);

        Self {
            volume_id,
            absolute_path,
            filename,
            size_bytes,
            mtime,
            ext,
            fingerprint,
        }
    }

    /// Path of the sibling SCC caption file next to this recording.
    pub fn sidecar_scc_path(&self) -> PathBuf {
        self.absolute_path.with_extension("scc")
    }
}

/// `sha256(volume_id || "\0" || absolute_path || "\0" || mtime_ns || "\0" || size_bytes)`, hex-encoded.
///
/// Stable across restarts; changes if the file is replaced or moved.
pub fn compute_fingerprint(
    volume_id: &VolumeId,
    absolute_path: &std::path::Path,
    mtime: DateTime<Utc>,
    size_bytes: u64,
) -> Fingerprint {
    let mtime_ns = mtime.timestamp_nanos_opt().unwrap_or(mtime.timestamp() * 1_000_000_000);

    let mut hasher = Sha256::new();
    hasher.update(volume_id.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(absolute_path.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(mtime_ns.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(size_bytes.to_string().as_bytes());

    Fingerprint(format!("{:x}", hasher.finalize()))
}
