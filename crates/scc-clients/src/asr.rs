//! Thin client for the ASR sidecar. The spec treats transcription as an
//! opaque capability; this is grounded on the same typed-`reqwest`-client
//! shape as the Cablecast client, with no auth since the sidecar runs
//! alongside the daemon.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AsrError, AsrResult};

#[derive(Debug, Clone)]
pub struct AsrConfig {
    pub base_url: url::Url,
    pub call_timeout: Duration,
}

impl AsrConfig {
    pub fn from_env() -> Result<Self, url::ParseError> {
        let base_url = std::env::var("SCC_ASR_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8088".to_string());
        Ok(Self {
            base_url: url::Url::parse(&base_url)?,
            call_timeout: Duration::from_secs(3600),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AsrParams {
    pub language_hint: Option<String>,
}

/// One transcribed span. `start_s`/`end_s` are seconds from the start of
/// the source audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
}

pub struct AsrClient {
    http: Client,
    config: AsrConfig,
}

impl AsrClient {
    pub fn new(config: AsrConfig) -> AsrResult<Self> {
        let http = Client::builder().timeout(config.call_timeout).build()?;
        Ok(Self { http, config })
    }

    /// Transcribe `audio_source`, checking the post-condition that every
    /// segment has `end_s > start_s` and that `start_s` is non-decreasing
    /// before handing the result to the pipeline.
    pub async fn transcribe(&self, audio_source: &Path, params: AsrParams) -> AsrResult<Vec<Segment>> {
        let url = self.config.base_url.join("/transcribe").expect("static path");

        let form = reqwest::multipart::Part::file(audio_source)
            .await
            .map_err(|e| AsrError::RequestFailed { status: 0, body: e.to_string() })?;
        let mut multipart = reqwest::multipart::Form::new().part("audio", form);
        if let Some(lang) = &params.language_hint {
            multipart = multipart.text("language_hint", lang.clone());
        }

        let response = self.http.post(url).multipart(multipart).send().await?;

        let segments: Vec<Segment> = match response.status() {
            StatusCode::OK => response.json().await?,
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(AsrError::RequestFailed { status: status.as_u16(), body });
            }
        };

        validate_segments(&segments)?;
        Ok(segments)
    }
}

fn validate_segments(segments: &[Segment]) -> AsrResult<()> {
    if segments.is_empty() {
        return Err(AsrError::EmptyTranscript);
    }

    let mut prev_start = f64::NEG_INFINITY;
    for (i, seg) in segments.iter().enumerate() {
        if seg.end_s <= seg.start_s {
            return Err(AsrError::MalformedSegments(format!("segment {i}: end_s ({}) <= start_s ({})", seg.end_s, seg.start_s)));
        }
        if seg.start_s < prev_start {
            return Err(AsrError::MalformedSegments(format!("segment {i}: start_s ({}) is out of order", seg.start_s)));
        }
        prev_start = seg.start_s;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64) -> Segment {
        Segment { start_s: start, end_s: end, text: "hello".to_string() }
    }

    #[test]
    fn empty_transcript_is_a_business_error() {
        let err = validate_segments(&[]).unwrap_err();
        assert!(matches!(err, AsrError::EmptyTranscript));
    }

    #[test]
    fn rejects_inverted_segment() {
        let err = validate_segments(&[seg(5.0, 4.0)]).unwrap_err();
        assert!(matches!(err, AsrError::MalformedSegments(_)));
    }

    #[test]
    fn rejects_out_of_order_starts() {
        let err = validate_segments(&[seg(0.0, 1.0), seg(0.5, 2.0)]).unwrap_err();
        assert!(matches!(err, AsrError::MalformedSegments(_)));
    }

    #[test]
    fn accepts_well_formed_segments() {
        assert!(validate_segments(&[seg(0.0, 1.0), seg(1.0, 2.5)]).is_ok());
    }
}
