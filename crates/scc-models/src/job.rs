//! Job definitions: the authoritative scheduled/dispatched unit of work.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{Fingerprint, JobId, QueueName, TemplateName};

/// Job state in the durable store.
///
/// Transitions are monotonic per attempt; see the state diagram in
/// the Work Queue & Dispatcher design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Queued,
    Leased,
    Running,
    Succeeded,
    Failed,
    Retrying,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Leased => "leased",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Retrying => "retrying",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }

    /// Non-terminal states participate in the at-most-one-active-per-fingerprint invariant.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Only Queued, Leased, or Retrying jobs can be cancelled outright; a Running
    /// job can only be cooperatively signalled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Leased | JobState::Retrying)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single structured diagnostic attached to a Job or PipelineRun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredError {
    /// Short machine-readable cause, e.g. "empty_transcript", "volume_unavailable".
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl StructuredError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Parameters carried by a Job, shaped per template.
///
/// Kept as an untyped JSON value at the store boundary but exposed here as
/// a small closed set of known shapes plus an escape hatch for
/// forward-compatible/operator-supplied payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    /// Fan out over N most recent recordings per enabled volume.
    ProcessRecentVods { recent_n: Option<usize> },
    /// Process exactly one recording snapshot.
    ProcessSingleVod {
        volume_id: crate::ids::VolumeId,
        recording: crate::recording::Recording,
        cablecast_show_id: Option<crate::ids::CablecastShowId>,
    },
    /// Audit existing SCC sidecars across all volumes.
    CaptionCheck,
    /// Re-run the full pipeline for one previously audited recording.
    CaptionCheckRepair {
        volume_id: crate::ids::VolumeId,
        recording: crate::recording::Recording,
    },
    /// Remove stale temp files and expired leases.
    Cleanup,
}

/// A scheduled or manually submitted task instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: JobId,
    pub template_name: TemplateName,
    pub queue: QueueName,
    /// Dedup key; `None` for fan-out parents, which have no single recording identity.
    pub fingerprint: Option<Fingerprint>,
    pub state: JobState,
    pub attempt: u32,
    pub max_attempts: u32,
    pub earliest_start: DateTime<Utc>,
    pub lease_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<StructuredError>,
    pub parent_job_id: Option<JobId>,
    pub payload: JobPayload,
}

impl Job {
    pub fn new(
        template_name: impl Into<TemplateName>,
        queue: impl Into<QueueName>,
        payload: JobPayload,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            template_name: template_name.into(),
            queue: queue.into(),
            fingerprint: None,
            state: JobState::Queued,
            attempt: 1,
            max_attempts,
            earliest_start: now,
            lease_deadline: None,
            created_at: now,
            updated_at: now,
            last_error: None,
            parent_job_id: None,
            payload,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_parent(mut self, parent_job_id: JobId) -> Self {
        self.parent_job_id = Some(parent_job_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_queued_at_attempt_one() {
        let job = Job::new("cleanup", "default", JobPayload::Cleanup, 3);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt, 1);
        assert!(job.state.is_active());
    }

    #[test]
    fn cancellability_matches_state() {
        assert!(JobState::Queued.is_cancellable());
        assert!(JobState::Retrying.is_cancellable());
        assert!(!JobState::Running.is_cancellable());
        assert!(!JobState::Succeeded.is_cancellable());
    }

    #[test]
    fn terminal_states_are_not_active() {
        for s in [JobState::Succeeded, JobState::Failed, JobState::Cancelled] {
            assert!(s.is_terminal());
            assert!(!s.is_active());
        }
        for s in [JobState::Queued, JobState::Leased, JobState::Running, JobState::Retrying] {
            assert!(!s.is_terminal());
            assert!(s.is_active());
        }
    }
}
