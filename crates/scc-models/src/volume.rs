//! Storage volume configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::VolumeId;

/// Immutable configuration for a flex storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StorageVolume {
    /// Unique identifier, e.g. `flex-1`..`flex-9`.
    pub id: VolumeId,
    /// Absolute mount path.
    pub mount_path: PathBuf,
    /// Human-readable city/municipality label.
    pub label: String,
    /// Whether this volume participates in scheduled scans.
    pub enabled: bool,
}

impl StorageVolume {
    pub fn new(id: impl Into<VolumeId>, mount_path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mount_path: mount_path.into(),
            label: label.into(),
            enabled: true,
        }
    }
}
