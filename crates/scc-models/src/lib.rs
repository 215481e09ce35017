//! Shared data model for the closed-captioning core: storage volumes,
//! discovered recordings, schedulable job templates, dispatched jobs,
//! per-recording pipeline runs, SCC caption documents, and derived queue
//! state. No behavior lives here beyond small, pure invariants on these
//! types — I/O, scheduling, and dispatch logic live in the crates that
//! depend on this one.

pub mod caption;
pub mod ids;
pub mod job;
pub mod job_template;
pub mod pipeline_run;
pub mod queue_state;
pub mod recording;
pub mod volume;

pub use caption::{CaptionSegment, SccDocument, SccError, Timecode, TimecodeParseError};
pub use ids::{CablecastShowId, CablecastVodId, Fingerprint, JobId, QueueName, RunId, TemplateName, VolumeId};
pub use job::{Job, JobPayload, JobState, StructuredError};
pub use job_template::JobTemplate;
pub use pipeline_run::{Artifact, PipelineRun, PipelineStage};
pub use queue_state::QueueState;
pub use recording::{compute_fingerprint, Recording};
pub use volume::StorageVolume;
