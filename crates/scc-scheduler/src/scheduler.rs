//! The scheduler loop: wakes every 30 seconds, decides which configured
//! templates are due, and hands firings off to the durable store. The
//! authoritative queue dispatch (lease, run, retry) lives downstream in
//! `scc-store`/`scc-queue`; this crate only ever inserts `Job` rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use scc_models::{Job, JobTemplate};
use scc_store::{JobRepository, SchedulerRepository};

use crate::cron_spec::ScheduleEntry;
use crate::error::SchedulerResult;

/// Wakes every 30 seconds, matching the grounding source's cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How long a missed firing is still considered worth catching up on.
/// Beyond this, a missed tick is recorded as a skip rather than fired.
pub const DEFAULT_CATCHUP_WINDOW: Duration = Duration::from_secs(3600);

/// Safety bound on how many missed ticks a single decision pass will walk
/// through before giving up and advancing to `now`. Guards against a cron
/// expression that fires far more often than the poll interval after a long
/// outage turning into an unbounded loop.
const MAX_TICKS_PER_DECISION: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No scheduled tick has come due since the last decision.
    NotDue,
    /// A tick fired: a new Job was enqueued.
    Fired { job_id: scc_models::JobId },
    /// A tick was due but its fingerprint was already active; suppressed.
    DuplicateSuppressed,
    /// One or more ticks were missed by more than the catch-up window and
    /// were skipped without firing.
    Skipped { skipped_ticks: usize },
}

struct Entry {
    schedule: ScheduleEntry,
    template: JobTemplate,
}

pub struct Scheduler {
    entries: Vec<Entry>,
    scheduler_repo: SchedulerRepository,
    job_repo: JobRepository,
    catchup_window: chrono::Duration,
}

impl Scheduler {
    pub fn new(
        templates: Vec<JobTemplate>,
        scheduler_repo: SchedulerRepository,
        job_repo: JobRepository,
    ) -> SchedulerResult<Self> {
        Self::with_catchup_window(templates, scheduler_repo, job_repo, DEFAULT_CATCHUP_WINDOW)
    }

    pub fn with_catchup_window(
        templates: Vec<JobTemplate>,
        scheduler_repo: SchedulerRepository,
        job_repo: JobRepository,
        catchup_window: Duration,
    ) -> SchedulerResult<Self> {
        let mut entries = Vec::with_capacity(templates.len());
        for template in templates {
            let mut schedule = ScheduleEntry::new(template.name.clone(), &template.cron)?;
            if let Some(tz) = &template.timezone {
                schedule = schedule.with_timezone(tz)?;
            }
            entries.push(Entry { schedule, template });
        }
        Ok(Self {
            entries,
            scheduler_repo,
            job_repo,
            catchup_window: chrono::Duration::from_std(catchup_window).unwrap_or(chrono::Duration::zero()),
        })
    }

    /// Evaluate every configured entry once against `now`, persisting any
    /// firing or skip decision. Never blocks on a suppressed duplicate.
    pub async fn tick_once(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<(String, TickOutcome)>> {
        let mut outcomes = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let outcome = self.evaluate_entry(entry, now).await?;
            outcomes.push((entry.template.name.as_str().to_string(), outcome));
        }
        Ok(outcomes)
    }

    async fn evaluate_entry(&self, entry: &Entry, now: DateTime<Utc>) -> SchedulerResult<TickOutcome> {
        let last_fired_at = self.scheduler_repo.last_fired_at(&entry.template.name).await?;

        // A template that has never fired waits for its next natural tick
        // rather than catching up on everything since the epoch.
        let mut reference = last_fired_at.unwrap_or(now);
        let mut skipped_ticks = 0usize;

        for _ in 0..MAX_TICKS_PER_DECISION {
            let Some(due) = entry.schedule.next_fire_after(reference) else {
                break;
            };
            if due > now {
                break;
            }

            let missed_by = now - due;
            if missed_by <= self.catchup_window {
                return self.fire(entry, now, skipped_ticks).await;
            }

            debug!(template = %entry.template.name, %due, "missed tick outside catch-up window, skipping");
            skipped_ticks += 1;
            reference = due;
        }

        if skipped_ticks > 0 {
            self.scheduler_repo.record_fired(&entry.template.name, now).await?;
            warn!(template = %entry.template.name, skipped_ticks, "advanced past missed ticks without firing");
            return Ok(TickOutcome::Skipped { skipped_ticks });
        }

        Ok(TickOutcome::NotDue)
    }

    async fn fire(&self, entry: &Entry, now: DateTime<Utc>, skipped_ticks: usize) -> SchedulerResult<TickOutcome> {
        if skipped_ticks > 0 {
            warn!(template = %entry.template.name, skipped_ticks, "firing after catching up on missed ticks");
        }

        let mut job = Job::new(entry.template.name.clone(), entry.template.queue.clone(), entry.template.payload.clone(), 3);
        if let Some(fingerprint) = fingerprint_of(&job.payload) {
            job = job.with_fingerprint(fingerprint);
        }

        match self.job_repo.insert(&job).await {
            Ok(()) => {
                self.scheduler_repo.record_fired(&entry.template.name, now).await?;
                info!(template = %entry.template.name, job_id = %job.job_id, "fired scheduled template");
                Ok(TickOutcome::Fired { job_id: job.job_id })
            }
            Err(scc_store::StoreError::DuplicateActiveFingerprint(_)) => {
                self.scheduler_repo.record_fired(&entry.template.name, now).await?;
                info!(template = %entry.template.name, event = "duplicate_suppressed", "suppressed duplicate firing");
                Ok(TickOutcome::DuplicateSuppressed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run the poll loop until `shutdown` is signalled. Wakes every 30s.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutting down");
                        return;
                    }
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            let now = Utc::now();
            match self.tick_once(now).await {
                Ok(outcomes) => {
                    for (name, outcome) in outcomes {
                        if !matches!(outcome, TickOutcome::NotDue) {
                            debug!(template = %name, ?outcome, "tick decision");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "scheduler tick failed"),
            }
        }
    }
}

/// Templates that carry a single recording's identity dedup against it;
/// fan-out templates (`ProcessRecentVods`, `CaptionCheck`, `Cleanup`) have no
/// single fingerprint and are never suppressed by this mechanism.
fn fingerprint_of(payload: &scc_models::JobPayload) -> Option<scc_models::Fingerprint> {
    use scc_models::JobPayload;
    match payload {
        JobPayload::ProcessSingleVod { recording, .. } => Some(recording.fingerprint.clone()),
        JobPayload::CaptionCheckRepair { recording, .. } => Some(recording.fingerprint.clone()),
        JobPayload::ProcessRecentVods { .. } | JobPayload::CaptionCheck | JobPayload::Cleanup => None,
    }
}
