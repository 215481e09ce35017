//! Validate stage: poll Cablecast for VOD readiness with exponential
//! backoff (15s -> 5min) up to a 30-minute timeout, then check the
//! published duration against the source within a 10% tolerance. Checks
//! Cablecast's reported duration rather than running a local ffprobe pass,
//! since Cablecast is authoritative for the published asset.

use std::time::Duration;

use tokio::sync::watch;

use scc_clients::{CablecastClient, Vod};
use scc_models::CablecastVodId;

use crate::error::{PipelineError, PipelineResult};

const POLL_FLOOR: Duration = Duration::from_secs(15);
const POLL_CEILING: Duration = Duration::from_secs(300);
const VALIDATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DURATION_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub source_duration_s: f64,
    pub published_duration_s: f64,
}

/// Poll until the VOD is complete or `VALIDATION_TIMEOUT` elapses. Checks
/// `cancel` between polls, consistent with the pipeline's cooperative
/// cancellation contract for long-running stages.
pub async fn validate(
    client: &CablecastClient,
    vod_id: &CablecastVodId,
    source_duration_s: f64,
    cancel: &mut watch::Receiver<bool>,
) -> PipelineResult<QualityReport> {
    let deadline = tokio::time::Instant::now() + VALIDATION_TIMEOUT;
    let mut interval = POLL_FLOOR;

    loop {
        if *cancel.borrow() {
            return Err(PipelineError::Cancelled);
        }

        let vod = client.get_vod(vod_id).await?;
        if let Some(report) = check_complete(&vod, source_duration_s)? {
            return Ok(report);
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(PipelineError::InfraPermanent(format!(
                "VOD {} did not become valid within {:?}",
                vod_id, VALIDATION_TIMEOUT
            )));
        }

        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return Err(PipelineError::Cancelled);
                }
            }
            _ = tokio::time::sleep(interval) => {}
        }
        interval = (interval * 2).min(POLL_CEILING);
    }
}

/// `Ok(None)` means "still processing, keep polling". `Err` means the VOD
/// reached a terminal state this pipeline rejects (e.g. a duration mismatch).
fn check_complete(vod: &Vod, source_duration_s: f64) -> PipelineResult<Option<QualityReport>> {
    if vod.state != "complete" {
        return Ok(None);
    }

    let published = vod.duration_seconds.unwrap_or(0.0);
    if published <= 0.0 {
        return Err(PipelineError::Business(format!("VOD {} reported zero duration", vod.id)));
    }

    let delta = (published - source_duration_s).abs();
    let tolerance = source_duration_s * DURATION_TOLERANCE;
    if delta > tolerance {
        return Err(PipelineError::Business(format!(
            "VOD {} duration {published:.1}s is outside 10% tolerance of source {source_duration_s:.1}s",
            vod.id
        )));
    }

    Ok(Some(QualityReport { source_duration_s, published_duration_s: published }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vod(state: &str, duration: Option<f64>) -> Vod {
        Vod {
            id: CablecastVodId::from("vod-1"),
            show_id: scc_models::CablecastShowId::from("show-1"),
            state: state.to_string(),
            duration_seconds: duration,
        }
    }

    #[test]
    fn incomplete_vod_is_not_yet_decided() {
        assert_eq!(check_complete(&vod("processing", None), 100.0).unwrap(), None);
    }

    #[test]
    fn complete_vod_within_tolerance_succeeds() {
        let report = check_complete(&vod("complete", Some(103.0)), 100.0).unwrap().unwrap();
        assert_eq!(report.published_duration_s, 103.0);
    }

    #[test]
    fn complete_vod_outside_tolerance_fails() {
        let err = check_complete(&vod("complete", Some(150.0)), 100.0).unwrap_err();
        assert!(matches!(err, PipelineError::Business(_)));
    }

    #[test]
    fn complete_vod_with_zero_duration_fails() {
        let err = check_complete(&vod("complete", Some(0.0)), 100.0).unwrap_err();
        assert!(matches!(err, PipelineError::Business(_)));
    }
}
