//! The per-stage dispatch loop: each stage takes a context and the in-progress run,
//! does its work, and returns once its artifact is frozen. Resume is driven
//! by `PipelineRun::resume_point()` — a stage whose artifact is already
//! present and whose checksum still verifies is skipped entirely.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, warn};

use scc_clients::{AsrClient, AsrParams, CablecastClient};
use scc_models::{Artifact, CablecastShowId, CablecastVodId, PipelineRun, PipelineStage, SccDocument, StorageVolume};
use scc_store::PipelineRunRepository;

use crate::error::{PipelineError, PipelineResult};
use crate::remux::{probe_duration_seconds, remux};
use crate::show_matching::{match_show, ShowMatch};
use crate::temp_dir::ScopedTempDir;
use crate::validate::validate;

/// Shared handles a dispatcher hands to every concurrently-driven run; `Arc`
/// so one daemon-wide client and store connection pool backs every job.
pub struct PipelineContext {
    pub cablecast: Arc<CablecastClient>,
    pub asr: Arc<AsrClient>,
    pub runs: Arc<PipelineRunRepository>,
    pub temp_root: PathBuf,
}

/// Drive `run` forward from its resume point to `Cleaned`, persisting after
/// every stage so a crash mid-run loses at most the in-flight stage.
pub async fn drive(
    ctx: &PipelineContext,
    run: &mut PipelineRun,
    volume: &StorageVolume,
    show_override: Option<CablecastShowId>,
    cancel: &mut watch::Receiver<bool>,
) -> PipelineResult<()> {
    let guard = ScopedTempDir::acquire(&ctx.temp_root, run.recording.fingerprint.as_str())
        .await
        .map_err(|e| PipelineError::InfraTransient(e.to_string()))?;

    loop {
        if *cancel.borrow() {
            return Err(PipelineError::Cancelled);
        }

        let stage = run.resume_point();
        info!(run_id = %run.run_id, ?stage, "entering stage");

        match stage {
            PipelineStage::Discovered => run_discover(run),
            PipelineStage::Transcribed => run_transcribe(ctx, run, guard.path()).await?,
            PipelineStage::Captioned => run_caption_format(run, guard.path()).await?,
            PipelineStage::Remuxed => run_remux(run, guard.path()).await?,
            PipelineStage::Uploaded => run_upload(ctx, run, volume, show_override.clone()).await?,
            PipelineStage::Validated => run_validate(ctx, run, cancel).await?,
            PipelineStage::Cleaned => {
                run_cleanup(run, guard.path()).await?;
                break;
            }
            PipelineStage::Failed => return Err(PipelineError::ContractViolation("resume_point returned Failed".to_string())),
        }

        ctx.runs.upsert(run).await?;
    }

    Ok(())
}

fn checksum_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

async fn write_atomic(final_path: &Path, contents: &[u8]) -> PipelineResult<()> {
    let tmp_path = final_path.with_extension(format!(
        "{}.part",
        final_path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    tokio::fs::write(&tmp_path, contents).await.map_err(|e| PipelineError::InfraTransient(e.to_string()))?;
    scc_clients::fs_capability::atomic_rename(&tmp_path, final_path).await?;
    Ok(())
}

fn run_discover(run: &mut PipelineRun) {
    // Discovery already happened in the Scanner; this stage exists so the
    // state machine has a uniform first artifact to resume against.
    run.complete_stage(PipelineStage::Discovered, Some(Artifact::new(run.recording.absolute_path.clone(), run.recording.fingerprint.as_str(), run.recording.size_bytes)));
}

async fn run_transcribe(ctx: &PipelineContext, run: &mut PipelineRun, temp_dir: &Path) -> PipelineResult<()> {
    let segments = ctx.asr.transcribe(&run.recording.absolute_path, AsrParams::default()).await?;

    let segments_path = temp_dir.join(format!("{}.segments.json", run.recording.fingerprint.as_str()));
    let payload = serde_json::to_vec_pretty(&segments).map_err(|e| PipelineError::InfraPermanent(e.to_string()))?;
    write_atomic(&segments_path, &payload).await?;

    let checksum = checksum_file(&segments_path).map_err(|e| PipelineError::InfraTransient(e.to_string()))?;
    let bytes = payload.len() as u64;
    run.complete_stage(PipelineStage::Transcribed, Some(Artifact::new(segments_path, checksum, bytes)));
    Ok(())
}

async fn run_caption_format(run: &mut PipelineRun, temp_dir: &Path) -> PipelineResult<()> {
    let segments_artifact = run
        .artifacts
        .get(PipelineStage::Transcribed.artifact_key())
        .ok_or_else(|| PipelineError::ContractViolation("Transcribed artifact missing entering CaptionFormat".to_string()))?;

    let raw = tokio::fs::read(&segments_artifact.path).await.map_err(|e| PipelineError::InfraTransient(e.to_string()))?;
    let segments: Vec<scc_clients::Segment> = serde_json::from_slice(&raw).map_err(|e| PipelineError::InfraPermanent(e.to_string()))?;

    let caption_segments = segments
        .into_iter()
        .map(|s| scc_models::CaptionSegment::new(scc_models::Timecode::from_seconds(s.start_s), scc_models::Timecode::from_seconds(s.end_s), s.text))
        .collect();
    let doc = SccDocument::new(caption_segments);
    doc.validate_monotonic()?;

    let scc_path = temp_dir.join(format!("{}.scc", run.recording.fingerprint.as_str()));
    let rendered = doc.render();
    write_atomic(&scc_path, rendered.as_bytes()).await?;

    let checksum = checksum_file(&scc_path).map_err(|e| PipelineError::InfraTransient(e.to_string()))?;
    run.complete_stage(PipelineStage::Captioned, Some(Artifact::new(scc_path, checksum, rendered.len() as u64)));
    Ok(())
}

async fn run_remux(run: &mut PipelineRun, temp_dir: &Path) -> PipelineResult<()> {
    let scc_artifact = run
        .artifacts
        .get(PipelineStage::Captioned.artifact_key())
        .ok_or_else(|| PipelineError::ContractViolation("Captioned artifact missing entering Remux".to_string()))?;

    let output_path = temp_dir.join(format!("{}.captioned.{}", run.recording.fingerprint.as_str(), run.recording.ext));
    remux(&run.recording.absolute_path, &scc_artifact.path, &output_path).await?;

    let checksum = checksum_file(&output_path).map_err(|e| PipelineError::InfraTransient(e.to_string()))?;
    let bytes = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
    run.complete_stage(PipelineStage::Remuxed, Some(Artifact::new(output_path, checksum, bytes)));
    Ok(())
}

async fn run_upload(ctx: &PipelineContext, run: &mut PipelineRun, volume: &StorageVolume, show_override: Option<CablecastShowId>) -> PipelineResult<()> {
    let remuxed = run
        .artifacts
        .get(PipelineStage::Remuxed.artifact_key())
        .ok_or_else(|| PipelineError::ContractViolation("Remuxed artifact missing entering Upload".to_string()))?
        .clone();

    let show_id = match show_override {
        Some(id) => Some(id),
        None => {
            let shows = ctx.cablecast.list_shows().await?;
            match match_show(&volume.label, &run.recording, &shows) {
                ShowMatch::Matched(id) => Some(id),
                ShowMatch::Unattached => None,
            }
        }
    };

    let title = run.recording.filename.clone();
    // An upload with no matched show still succeeds; it is flagged for a
    // human to attach the right show later rather than failed outright.
    let placeholder_show = show_id.clone().unwrap_or_else(|| CablecastShowId::from("unattached"));
    let vod = ctx.cablecast.create_vod(&placeholder_show, &remuxed.path, &title, None).await?;

    run.cablecast_show_id = show_id.clone();
    run.cablecast_vod_id = Some(vod.id.clone());
    run.needs_review = show_id.is_none();

    if run.needs_review {
        warn!(run_id = %run.run_id, recording = %run.recording.filename, "uploaded unattached; flagged for manual review");
    }

    run.complete_stage(PipelineStage::Uploaded, Some(Artifact::new(remuxed.path.clone(), vod.id.as_str(), remuxed.bytes)));
    Ok(())
}

async fn run_validate(ctx: &PipelineContext, run: &mut PipelineRun, cancel: &mut watch::Receiver<bool>) -> PipelineResult<()> {
    let vod_id: CablecastVodId = run
        .cablecast_vod_id
        .clone()
        .ok_or_else(|| PipelineError::ContractViolation("cablecast_vod_id missing entering Validate".to_string()))?;

    let remuxed = run
        .artifacts
        .get(PipelineStage::Remuxed.artifact_key())
        .ok_or_else(|| PipelineError::ContractViolation("Remuxed artifact missing entering Validate".to_string()))?
        .clone();
    let source_duration_s = probe_duration_seconds(&remuxed.path).await?;

    let report = validate(&ctx.cablecast, &vod_id, source_duration_s, cancel).await?;

    run.complete_stage(
        PipelineStage::Validated,
        Some(Artifact::new(remuxed.path.clone(), format!("{:.3}", report.published_duration_s), remuxed.bytes)),
    );
    Ok(())
}

async fn run_cleanup(run: &mut PipelineRun, temp_dir: &Path) -> PipelineResult<()> {
    for artifact in run.artifacts.values() {
        if artifact.path.starts_with(temp_dir) {
            let _ = scc_clients::fs_capability::remove(&artifact.path).await;
        }
    }
    run.complete_stage(PipelineStage::Cleaned, None);
    Ok(())
}
