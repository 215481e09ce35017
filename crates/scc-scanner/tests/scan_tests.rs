use std::time::Duration;

use scc_models::StorageVolume;
use scc_scanner::{scan, ScanDiagnostic, ScanPolicy};
use tempfile::tempdir;

async fn write_file(path: &std::path::Path, size: usize) {
    tokio::fs::write(path, vec![0u8; size]).await.unwrap();
}

#[tokio::test]
async fn scan_returns_empty_with_diagnostic_for_missing_mount() {
    let volume = StorageVolume::new("flex-1", "/nonexistent/mount/path", "Nowhere");
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();
    assert!(outcome.recordings.is_empty());
    assert!(matches!(outcome.diagnostic, Some(ScanDiagnostic::VolumeUnavailable { .. })));
}

#[tokio::test]
async fn scan_returns_empty_with_diagnostic_for_disabled_volume() {
    let dir = tempdir().unwrap();
    let mut volume = StorageVolume::new("flex-1", dir.path(), "Nowhere");
    volume.enabled = false;
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();
    assert!(outcome.recordings.is_empty());
    assert!(matches!(outcome.diagnostic, Some(ScanDiagnostic::VolumeUnavailable { .. })));
}

#[tokio::test]
async fn scan_filters_by_extension_and_min_size() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("small.mp4"), 1024).await;
    write_file(&dir.path().join("big.txt"), 20 * 1024 * 1024).await;
    write_file(&dir.path().join("big.mp4"), 20 * 1024 * 1024).await;

    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();

    assert_eq!(outcome.recordings.len(), 1);
    assert_eq!(outcome.recordings[0].filename, "big.mp4");
}

#[tokio::test]
async fn scan_skips_files_with_nonempty_caption_sidecar() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("captioned.mp4"), 20 * 1024 * 1024).await;
    write_file(&dir.path().join("captioned.scc"), 100).await;
    write_file(&dir.path().join("uncaptioned.mp4"), 20 * 1024 * 1024).await;

    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();

    assert_eq!(outcome.recordings.len(), 1);
    assert_eq!(outcome.recordings[0].filename, "uncaptioned.mp4");
}

#[tokio::test]
async fn scan_does_not_skip_when_caption_sidecar_is_empty() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.mp4"), 20 * 1024 * 1024).await;
    write_file(&dir.path().join("a.scc"), 0).await;

    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();

    assert_eq!(outcome.recordings.len(), 1);
}

#[tokio::test]
async fn scan_prefers_recordings_subtree_over_volume_root() {
    let dir = tempdir().unwrap();
    let recordings = dir.path().join("recordings");
    tokio::fs::create_dir_all(&recordings).await.unwrap();

    write_file(&dir.path().join("root_loose.mp4"), 20 * 1024 * 1024).await;
    write_file(&recordings.join("priority.mp4"), 20 * 1024 * 1024).await;

    let mut policy = ScanPolicy::default();
    policy.recent_n = 1;
    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &policy).await.unwrap();

    assert_eq!(outcome.recordings.len(), 1);
    assert_eq!(outcome.recordings[0].filename, "priority.mp4");
}

#[tokio::test]
async fn scan_orders_by_mtime_descending_then_path() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("first.mp4"), 20 * 1024 * 1024).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    write_file(&dir.path().join("second.mp4"), 20 * 1024 * 1024).await;

    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &ScanPolicy::default()).await.unwrap();

    assert_eq!(outcome.recordings.len(), 2);
    assert_eq!(outcome.recordings[0].filename, "second.mp4");
    assert_eq!(outcome.recordings[1].filename, "first.mp4");
}

#[tokio::test]
async fn scan_truncates_to_recent_n() {
    let dir = tempdir().unwrap();
    for i in 0..10 {
        write_file(&dir.path().join(format!("rec_{i}.mp4")), 20 * 1024 * 1024).await;
    }

    let mut policy = ScanPolicy::default();
    policy.recent_n = 3;
    let volume = StorageVolume::new("flex-1", dir.path(), "Springfield");
    let outcome = scan(&volume, &policy).await.unwrap();

    assert_eq!(outcome.recordings.len(), 3);
}
