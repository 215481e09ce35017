//! Remux stage: mux the SCC sidecar into the source video as a closed
//! caption track. Builds the ffmpeg invocation the same way as the rest of
//! this codebase locates and shells out to media binaries, cut down to the
//! one invocation this pipeline needs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

fn locate_ffmpeg() -> PipelineResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| PipelineError::InfraPermanent("ffmpeg binary not found on PATH".to_string()))
}

fn locate_ffprobe() -> PipelineResult<PathBuf> {
    which::which("ffprobe").map_err(|_| PipelineError::InfraPermanent("ffprobe binary not found on PATH".to_string()))
}

#[derive(serde::Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

/// Probe a video's duration in seconds, used by Validate to compare against
/// the published Cablecast asset.
pub async fn probe_duration_seconds(path: &Path) -> PipelineResult<f64> {
    let ffprobe = locate_ffprobe()?;

    let output = Command::new(&ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PipelineError::InfraTransient(format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::InfraPermanent(format!("ffprobe exited with {}: {}", output.status, stderr)));
    }

    let parsed: FfprobeOutput =
        serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::InfraPermanent(format!("malformed ffprobe output: {e}")))?;

    parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| PipelineError::InfraPermanent("ffprobe reported no duration".to_string()))
}

/// Mux `scc_path` into `source_video` as a CEA-608 closed caption track,
/// writing the result to `output_path`. Re-encodes nothing: `-c copy` plus a
/// caption mux, so this is fast and lossless for the video/audio streams.
pub async fn remux(source_video: &Path, scc_path: &Path, output_path: &Path) -> PipelineResult<()> {
    let ffmpeg = locate_ffmpeg()?;

    let args = [
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        source_video.display().to_string(),
        "-i".to_string(),
        scc_path.display().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "0:a".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-c:s".to_string(),
        "mov_text".to_string(),
        output_path.display().to_string(),
    ];

    debug!(?args, "running ffmpeg remux");

    let output = Command::new(&ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PipelineError::InfraTransient(format!("failed to spawn ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::InfraPermanent(format!("ffmpeg exited with {}: {}", output.status, stderr)));
    }

    Ok(())
}
