//! QueueState: a derived, point-in-time view over Jobs, used for operator
//! visibility and for the dispatcher's per-queue concurrency decisions.
//! Never written directly — always recomputed from the store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::QueueName;
use crate::job::{Job, JobState};

/// Counts of jobs by state within a single queue, at the moment it was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueState {
    pub queue: QueueName,
    pub counts: BTreeMap<String, u64>,
}

impl QueueState {
    pub fn new(queue: QueueName) -> Self {
        Self { queue, counts: BTreeMap::new() }
    }

    /// Tally a slice of jobs belonging to a single queue into state counts.
    ///
    /// Jobs for other queues are ignored rather than rejected, since callers
    /// typically fold a mixed-queue snapshot one queue at a time.
    pub fn tally(queue: QueueName, jobs: &[Job]) -> Self {
        let mut state = Self::new(queue.clone());
        for job in jobs.iter().filter(|j| j.queue == queue) {
            *state.counts.entry(job.state.as_str().to_string()).or_insert(0) += 1;
        }
        state
    }

    pub fn count(&self, state: JobState) -> u64 {
        self.counts.get(state.as_str()).copied().unwrap_or(0)
    }

    pub fn active_count(&self) -> u64 {
        [JobState::Queued, JobState::Leased, JobState::Running, JobState::Retrying]
            .iter()
            .map(|s| self.count(*s))
            .sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobPayload;

    #[test]
    fn tally_counts_only_matching_queue_jobs() {
        let default_q = QueueName::from("default");
        let other_q = QueueName::from("other");
        let jobs = vec![
            Job::new("cleanup", default_q.clone(), JobPayload::Cleanup, 3),
            Job::new("cleanup", default_q.clone(), JobPayload::Cleanup, 3),
            Job::new("cleanup", other_q.clone(), JobPayload::Cleanup, 3),
        ];
        let state = QueueState::tally(default_q, &jobs);
        assert_eq!(state.count(JobState::Queued), 2);
        assert_eq!(state.total(), 2);
    }

    #[test]
    fn active_count_excludes_terminal_states() {
        let q = QueueName::from("default");
        let mut jobs = vec![Job::new("cleanup", q.clone(), JobPayload::Cleanup, 3)];
        jobs[0].state = JobState::Succeeded;
        let state = QueueState::tally(q, &jobs);
        assert_eq!(state.active_count(), 0);
        assert_eq!(state.total(), 1);
    }
}
