//! Error and diagnostic types for scans.

use thiserror::Error;

/// Conditions that abort a scan of a single volume outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("volume unavailable: {reason}")]
    VolumeUnavailable { reason: String },
    #[error("permission denied reading {path}")]
    PermissionDenied { path: String },
}

/// Non-fatal condition surfaced alongside a (possibly partial) result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDiagnostic {
    /// The volume's mount point did not exist, wasn't readable, or the scan
    /// exceeded `scan_timeout`. The scan still completes with an empty result
    /// rather than failing the caller.
    VolumeUnavailable { reason: String },
}
