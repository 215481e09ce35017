//! Scenarist Closed Caption (SCC) document model.
//!
//! SCC is a line-based timed caption format: each line carries a broadcast
//! timecode followed by hex-encoded control/text codes. We don't attempt full
//! CEA-608 character-set fidelity here — captions are encoded as plain ASCII
//! payloads wrapped in the standard line framing, which is what downstream
//! broadcast chains in this system expect. Each line also carries its end
//! timecode so a document round-trips through `render`/`parse` without an
//! external duration reference.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Broadcast frame-accurate timecode, `HH:MM:SS:FF` at a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Timecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

/// Standard broadcast frame rate used for SCC timecodes (drop-frame NTSC).
pub const FRAMES_PER_SECOND: u8 = 30;

impl Timecode {
    pub fn new(hours: u8, minutes: u8, seconds: u8, frames: u8) -> Self {
        Self { hours, minutes, seconds, frames }
    }

    /// Build a timecode from a fractional-seconds offset.
    pub fn from_seconds(total_seconds: f64) -> Self {
        let total_seconds = total_seconds.max(0.0);
        let whole_seconds = total_seconds.floor() as u64;
        let frames = ((total_seconds - whole_seconds as f64) * FRAMES_PER_SECOND as f64).round() as u8;
        let hours = (whole_seconds / 3600) % 100;
        let minutes = (whole_seconds / 60) % 60;
        let seconds = whole_seconds % 60;
        Self {
            hours: hours as u8,
            minutes: minutes as u8,
            seconds: seconds as u8,
            frames: frames.min(FRAMES_PER_SECOND - 1),
        }
    }

    pub fn to_seconds(self) -> f64 {
        self.hours as f64 * 3600.0
            + self.minutes as f64 * 60.0
            + self.seconds as f64
            + self.frames as f64 / FRAMES_PER_SECOND as f64
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds, self.frames)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimecodeParseError {
    #[error("expected HH:MM:SS:FF, got '{0}'")]
    BadFormat(String),
}

impl FromStr for Timecode {
    type Err = TimecodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(TimecodeParseError::BadFormat(s.to_string()));
        }
        let parse = |p: &str| p.parse::<u8>().map_err(|_| TimecodeParseError::BadFormat(s.to_string()));
        Ok(Timecode {
            hours: parse(parts[0])?,
            minutes: parse(parts[1])?,
            seconds: parse(parts[2])?,
            frames: parse(parts[3])?,
        })
    }
}

/// One timed caption line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    pub start: Timecode,
    pub end: Timecode,
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start: Timecode, end: Timecode, text: impl Into<String>) -> Self {
        Self { start, end, text: text.into() }
    }
}

/// A parsed or to-be-written SCC caption file: an ordered sequence of segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SccDocument {
    pub segments: Vec<CaptionSegment>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SccError {
    #[error("empty document: no caption segments")]
    Empty,
    #[error("segment {index} has non-monotonic or zero-length timing: start {start}, end {end}")]
    NonMonotonic { index: usize, start: Timecode, end: Timecode },
    #[error("malformed SCC line {line_no}: {reason}")]
    MalformedLine { line_no: usize, reason: String },
}

const SCC_HEADER: &str = "Scenarist_SCC V1.0";

impl SccDocument {
    pub fn new(segments: Vec<CaptionSegment>) -> Self {
        Self { segments }
    }

    /// Validate timestamp monotonicity: each segment's end strictly follows
    /// its start, and starts are non-decreasing across the document. Used
    /// both before writing (CaptionFormat stage) and by the caption-check
    /// audit on an existing sidecar.
    pub fn validate_monotonic(&self) -> Result<(), SccError> {
        if self.segments.is_empty() {
            return Err(SccError::Empty);
        }
        let mut last_start: Option<Timecode> = None;
        for (index, seg) in self.segments.iter().enumerate() {
            if seg.end <= seg.start {
                return Err(SccError::NonMonotonic { index, start: seg.start, end: seg.end });
            }
            if let Some(prev) = last_start {
                if seg.start < prev {
                    return Err(SccError::NonMonotonic { index, start: seg.start, end: seg.end });
                }
            }
            last_start = Some(seg.start);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render as an SCC text document: one line per segment, `start<TAB>end<TAB>hex-payload`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(SCC_HEADER);
        out.push_str("\n\n");
        for seg in &self.segments {
            out.push_str(&seg.start.to_string());
            out.push('\t');
            out.push_str(&seg.end.to_string());
            out.push('\t');
            out.push_str(&encode_text_codes(&seg.text));
            out.push_str("\n\n");
        }
        out
    }

    /// Parse an SCC text document previously written by [`SccDocument::render`].
    pub fn parse(contents: &str) -> Result<Self, SccError> {
        let mut segments = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line == SCC_HEADER {
                continue;
            }
            segments.push(parse_caption_line(line_no, line)?);
        }
        Ok(Self { segments })
    }
}

fn parse_caption_line(line_no: usize, line: &str) -> Result<CaptionSegment, SccError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [start_str, end_str, payload] = fields.as_slice() else {
        return Err(SccError::MalformedLine {
            line_no,
            reason: "expected start, end, and payload fields".to_string(),
        });
    };

    let start = Timecode::from_str(start_str.trim()).map_err(|e| SccError::MalformedLine {
        line_no,
        reason: e.to_string(),
    })?;
    let end = Timecode::from_str(end_str.trim()).map_err(|e| SccError::MalformedLine {
        line_no,
        reason: e.to_string(),
    })?;
    let text = decode_text_codes(payload.trim());

    Ok(CaptionSegment { start, end, text })
}

fn encode_text_codes(text: &str) -> String {
    text.bytes().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join("")
}

fn decode_text_codes(payload: &str) -> String {
    let bytes: Vec<u8> = payload
        .as_bytes()
        .chunks(2)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok().and_then(|s| u8::from_str_radix(s, 16).ok()))
        .collect();
    String::from_utf8_lossy(&bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(h: u8, m: u8, s: u8, f: u8) -> Timecode {
        Timecode::new(h, m, s, f)
    }

    #[test]
    fn timecode_from_seconds_round_trips_to_seconds() {
        let t = Timecode::from_seconds(3725.5);
        assert_eq!(t.hours, 1);
        assert_eq!(t.minutes, 2);
        assert_eq!(t.seconds, 5);
        assert!((t.to_seconds() - 3725.5).abs() < 0.05);
    }

    #[test]
    fn timecode_parses_and_displays_symmetrically() {
        let t = tc(1, 2, 3, 4);
        let parsed: Timecode = t.to_string().parse().unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn timecode_rejects_malformed_string() {
        assert!(Timecode::from_str("01:02:03").is_err());
        assert!(Timecode::from_str("aa:02:03:04").is_err());
    }

    #[test]
    fn validate_monotonic_rejects_empty_document() {
        let doc = SccDocument::default();
        assert_eq!(doc.validate_monotonic(), Err(SccError::Empty));
    }

    #[test]
    fn validate_monotonic_rejects_reversed_segment() {
        let doc = SccDocument::new(vec![CaptionSegment::new(tc(0, 0, 5, 0), tc(0, 0, 2, 0), "hi")]);
        assert!(doc.validate_monotonic().is_err());
    }

    #[test]
    fn validate_monotonic_rejects_out_of_order_starts() {
        let doc = SccDocument::new(vec![
            CaptionSegment::new(tc(0, 0, 5, 0), tc(0, 0, 6, 0), "b"),
            CaptionSegment::new(tc(0, 0, 1, 0), tc(0, 0, 2, 0), "a"),
        ]);
        assert!(doc.validate_monotonic().is_err());
    }

    #[test]
    fn validate_monotonic_accepts_well_formed_document() {
        let doc = SccDocument::new(vec![
            CaptionSegment::new(tc(0, 0, 1, 0), tc(0, 0, 3, 0), "a"),
            CaptionSegment::new(tc(0, 0, 3, 0), tc(0, 0, 6, 0), "b"),
        ]);
        assert!(doc.validate_monotonic().is_ok());
    }

    #[test]
    fn render_then_parse_round_trips() {
        let doc = SccDocument::new(vec![
            CaptionSegment::new(tc(0, 0, 1, 0), tc(0, 0, 3, 0), "hello council"),
            CaptionSegment::new(tc(0, 0, 3, 0), tc(0, 0, 6, 15), "meeting begins"),
        ]);
        let rendered = doc.render();
        assert!(rendered.starts_with(SCC_HEADER));
        let parsed = SccDocument::parse(&rendered).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn parse_rejects_line_missing_fields() {
        let contents = format!("{SCC_HEADER}\n\n00:00:01:00\tmissing_end_and_payload\n");
        assert!(SccDocument::parse(&contents).is_err());
    }
}
