//! The caption-check audit flow: a separate job type from the main VOD
//! pipeline, run over recordings that already have an SCC sidecar.

use scc_models::{Recording, SccDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionCheckOutcome {
    Ok,
    Missing,
    Malformed { reason: String },
}

/// Check that `recording`'s sidecar `.scc` file exists, is non-empty, and is
/// timestamp-monotonic.
pub async fn check(recording: &Recording) -> CaptionCheckOutcome {
    let sidecar = recording.sidecar_scc_path();

    let contents = match tokio::fs::read_to_string(&sidecar).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CaptionCheckOutcome::Missing,
        Err(e) => return CaptionCheckOutcome::Malformed { reason: e.to_string() },
    };

    if contents.trim().is_empty() {
        return CaptionCheckOutcome::Missing;
    }

    match SccDocument::parse(&contents) {
        Ok(doc) => match doc.validate_monotonic() {
            Ok(()) => CaptionCheckOutcome::Ok,
            Err(e) => CaptionCheckOutcome::Malformed { reason: e.to_string() },
        },
        Err(e) => CaptionCheckOutcome::Malformed { reason: e.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scc_models::VolumeId;
    use tempfile::tempdir;

    async fn recording_at(dir: &std::path::Path, name: &str) -> Recording {
        let path = dir.join(name);
        tokio::fs::write(&path, b"video bytes").await.unwrap();
        Recording::new(VolumeId::from("flex-1"), path, 11, chrono::Utc::now())
    }

    #[tokio::test]
    async fn missing_sidecar_is_reported_missing() {
        let dir = tempdir().unwrap();
        let rec = recording_at(dir.path(), "a.mp4").await;
        assert_eq!(check(&rec).await, CaptionCheckOutcome::Missing);
    }

    #[tokio::test]
    async fn empty_sidecar_is_reported_missing() {
        let dir = tempdir().unwrap();
        let rec = recording_at(dir.path(), "a.mp4").await;
        tokio::fs::write(rec.sidecar_scc_path(), b"").await.unwrap();
        assert_eq!(check(&rec).await, CaptionCheckOutcome::Missing);
    }

    #[tokio::test]
    async fn well_formed_sidecar_is_ok() {
        let dir = tempdir().unwrap();
        let rec = recording_at(dir.path(), "a.mp4").await;
        let doc = SccDocument::new(vec![scc_models::CaptionSegment::new(
            "00:00:00:00".parse().unwrap(),
            "00:00:02:00".parse().unwrap(),
            "hello".to_string(),
        )]);
        tokio::fs::write(rec.sidecar_scc_path(), doc.render()).await.unwrap();
        assert_eq!(check(&rec).await, CaptionCheckOutcome::Ok);
    }

    #[tokio::test]
    async fn non_monotonic_sidecar_is_malformed() {
        let dir = tempdir().unwrap();
        let rec = recording_at(dir.path(), "a.mp4").await;
        tokio::fs::write(rec.sidecar_scc_path(), "Scenarist_SCC V1.0\n00:00:05:00\t00:00:02:00\t68656c6c6f\n").await.unwrap();
        assert!(matches!(check(&rec).await, CaptionCheckOutcome::Malformed { .. }));
    }
}
