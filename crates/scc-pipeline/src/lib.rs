//! The per-Recording VOD pipeline: a seven-stage state machine driven by
//! `PipelineRun::resume_point()`, plus the caption-check audit flow that
//! runs independently of it.

pub mod caption_check;
pub mod error;
pub mod remux;
pub mod show_matching;
pub mod stages;
pub mod temp_dir;
pub mod validate;

pub use caption_check::{check as check_captions, CaptionCheckOutcome};
pub use error::{PipelineError, PipelineResult};
pub use show_matching::{match_show, recording_year, ShowMatch};
pub use stages::{drive, PipelineContext};
pub use temp_dir::ScopedTempDir;
pub use validate::QualityReport;
