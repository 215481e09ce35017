//! PipelineRun: the per-Recording state machine record.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::ids::{CablecastShowId, CablecastVodId, JobId, RunId};
use crate::recording::Recording;

/// Stage of the VOD pipeline. Ordered; each stage's artifact, once recorded,
/// is frozen (append-only within a run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Discovered,
    Transcribed,
    Captioned,
    Remuxed,
    Uploaded,
    Validated,
    Cleaned,
    Failed,
}

impl PipelineStage {
    /// The stage that must complete before this one may begin.
    pub fn precondition(&self) -> Option<PipelineStage> {
        use PipelineStage::*;
        match self {
            Discovered => None,
            Transcribed => Some(Discovered),
            Captioned => Some(Transcribed),
            Remuxed => Some(Captioned),
            Uploaded => Some(Remuxed),
            Validated => Some(Uploaded),
            Cleaned => Some(Validated),
            Failed => None,
        }
    }

    /// Stable key used to look up this stage's artifact in `PipelineRun::artifacts`.
    pub fn artifact_key(&self) -> &'static str {
        use PipelineStage::*;
        match self {
            Discovered => "fp",
            Transcribed => "fp.segments",
            Captioned => "fp.scc",
            Remuxed => "fp.captioned",
            Uploaded => "fp.uploaded",
            Validated => "fp.validated",
            Cleaned => "fp.cleaned",
            Failed => "fp.failed",
        }
    }
}

/// A single frozen artifact produced by a completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    pub path: PathBuf,
    pub checksum: String,
    pub bytes: u64,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, checksum: impl Into<String>, bytes: u64) -> Self {
        Self {
            path: path.into(),
            checksum: checksum.into(),
            bytes,
        }
    }
}

/// One run of the VOD pipeline against exactly one Recording.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub job_id: JobId,
    pub recording: Recording,
    pub stage: PipelineStage,
    /// Append-only map of completed-stage artifact key to its frozen record.
    pub artifacts: BTreeMap<String, Artifact>,
    pub cablecast_show_id: Option<CablecastShowId>,
    pub cablecast_vod_id: Option<CablecastVodId>,
    /// Set when Upload succeeded without a matched Cablecast show.
    pub needs_review: bool,
}

impl PipelineRun {
    pub fn new(job_id: JobId, recording: Recording) -> Self {
        Self {
            run_id: RunId::new(),
            job_id,
            recording,
            stage: PipelineStage::Discovered,
            artifacts: BTreeMap::new(),
            cablecast_show_id: None,
            cablecast_vod_id: None,
            needs_review: false,
        }
    }

    /// Record a stage's artifact and advance `stage`. Panics (a contract
    /// violation, not a runtime error) if the artifact is already present,
    /// since artifacts are append-only within a run.
    pub fn complete_stage(&mut self, stage: PipelineStage, artifact: Option<Artifact>) {
        let key = stage.artifact_key();
        if let Some(artifact) = artifact {
            assert!(
                !self.artifacts.contains_key(key),
                "artifact for stage {:?} already frozen",
                stage
            );
            self.artifacts.insert(key.to_string(), artifact);
        }
        self.stage = stage;
    }

    /// First stage whose artifact is absent — where a resumed run should start.
    pub fn resume_point(&self) -> PipelineStage {
        use PipelineStage::*;
        for stage in [Discovered, Transcribed, Captioned, Remuxed, Uploaded, Validated, Cleaned] {
            if !self.artifacts.contains_key(stage.artifact_key()) {
                return stage;
            }
        }
        Cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::VolumeId;
    use chrono::Utc;

    fn sample_recording() -> Recording {
        Recording::new(VolumeId::from("flex-1"), PathBuf::from("/mnt/flex-1/a.mp4"), 100, Utc::now())
    }

    #[test]
    fn resume_point_is_discovered_for_fresh_run() {
        let run = PipelineRun::new(JobId::new(), sample_recording());
        assert_eq!(run.resume_point(), PipelineStage::Discovered);
    }

    #[test]
    fn resume_point_skips_completed_stages() {
        let mut run = PipelineRun::new(JobId::new(), sample_recording());
        run.complete_stage(PipelineStage::Discovered, None);
        run.complete_stage(
            PipelineStage::Transcribed,
            Some(Artifact::new("/tmp/a.segments.json", "abc123", 10)),
        );
        assert_eq!(run.resume_point(), PipelineStage::Captioned);
    }

    #[test]
    #[should_panic(expected = "already frozen")]
    fn completing_same_stage_twice_panics() {
        let mut run = PipelineRun::new(JobId::new(), sample_recording());
        run.complete_stage(PipelineStage::Transcribed, Some(Artifact::new("/tmp/a", "x", 1)));
        run.complete_stage(PipelineStage::Transcribed, Some(Artifact::new("/tmp/a", "x", 1)));
    }
}
