//! `CoreContext`: every capability the dispatcher, scheduler task, and
//! operator-facing calls need, built once from a `CoreConfig` snapshot.
//! Clients are constructed fallibly at startup and shared behind `Arc`
//! across spawned tasks.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use scc_clients::{AsrClient, CablecastClient};
use scc_models::{Fingerprint, Job, JobId, JobPayload, JobTemplate, QueueName, StorageVolume};
use scc_queue::{QueueConfig, QueueMessage, RedisQueue};
use scc_scanner::ScanPolicy;
use scc_store::{JobFilter, JobRepository, PipelineRunRepository, SchedulerRepository};
use sqlx::SqlitePool;

use crate::config::{CoreConfig, FanoutSuccessPolicy};
use crate::error::DaemonResult;
use crate::metrics;

pub struct CoreContext {
    /// Kept alongside the repositories above so callers needing their own
    /// repository instance (the scheduler, which owns rather than shares
    /// its store handles) can open one against the same database.
    pub pool: SqlitePool,
    pub jobs: Arc<JobRepository>,
    pub runs: Arc<PipelineRunRepository>,
    pub scheduler_repo: Arc<SchedulerRepository>,
    pub redis: Arc<RedisQueue>,
    pub cablecast: Arc<CablecastClient>,
    pub asr: Arc<AsrClient>,
    pub volumes: Vec<StorageVolume>,
    pub scan_policy: ScanPolicy,
    pub temp_root: PathBuf,
    pub queue_config: QueueConfig,
    pub fanout_success_policy: FanoutSuccessPolicy,
}

#[derive(Debug, Clone)]
pub struct QueueSummary {
    pub queue: QueueName,
    pub depth: u64,
    pub dlq_depth: u64,
}

impl CoreContext {
    pub async fn new(config: CoreConfig) -> DaemonResult<Self> {
        let pool = scc_store::connect(&config.database_path).await?;
        let jobs = Arc::new(JobRepository::new(pool.clone()));
        let runs = Arc::new(PipelineRunRepository::new(pool.clone()));
        let scheduler_repo = Arc::new(SchedulerRepository::new(pool.clone()));
        let redis = Arc::new(RedisQueue::new(config.queue.clone())?);
        let cablecast = Arc::new(CablecastClient::new(config.cablecast.clone())?);
        let asr = Arc::new(AsrClient::new(config.asr.clone())?);

        for def in &config.queue.queues {
            redis.ensure_group(&def.name).await?;
        }

        Ok(Self {
            pool,
            jobs,
            runs,
            scheduler_repo,
            redis,
            cablecast,
            asr,
            volumes: config.volumes,
            scan_policy: config.scan_policy,
            temp_root: config.temp_root,
            queue_config: config.queue,
            fanout_success_policy: config.fanout_success_policy,
        })
    }

    /// Persist `job` and hand it to its queue's stream in one call: the
    /// authoritative row always exists before anything can dequeue it.
    pub async fn enqueue(&self, job: &Job) -> DaemonResult<()> {
        self.jobs.insert(job).await?;
        self.redis.enqueue(&job.queue, &QueueMessage::new(job.job_id.clone(), job.attempt)).await?;
        metrics::record_job_enqueued(job.template_name.as_str());
        Ok(())
    }

    pub async fn cancel(&self, job_id: &JobId) -> DaemonResult<()> {
        Ok(self.jobs.cancel(job_id).await?)
    }

    pub async fn get_job(&self, job_id: &JobId) -> DaemonResult<Job> {
        Ok(self.jobs.get(job_id).await?)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> DaemonResult<Vec<Job>> {
        Ok(self.jobs.list(filter).await?)
    }

    /// Depth and DLQ depth of every configured queue, also recorded as gauges.
    pub async fn queue_summary(&self) -> DaemonResult<Vec<QueueSummary>> {
        let mut out = Vec::with_capacity(self.queue_config.queues.len());
        for def in &self.queue_config.queues {
            let depth = self.redis.len(&def.name).await?;
            let dlq_depth = self.redis.dlq_len(&def.name).await?;
            metrics::set_queue_length(def.name.as_str(), depth);
            metrics::set_dlq_length(def.name.as_str(), dlq_depth);
            out.push(QueueSummary { queue: def.name.clone(), depth, dlq_depth });
        }
        Ok(out)
    }

    /// Fire `template` immediately, outside its cron schedule — an operator
    /// "run now" action. Subject to the same fingerprint dedup as a
    /// scheduler-driven firing.
    pub async fn trigger_template(&self, template: &JobTemplate) -> DaemonResult<JobId> {
        let mut job = Job::new(template.name.clone(), template.queue.clone(), template.payload.clone(), 3);
        if let Some(fp) = fingerprint_of(&job.payload) {
            job = job.with_fingerprint(fp);
        }
        let job_id = job.job_id.clone();
        self.enqueue(&job).await?;
        Ok(job_id)
    }

    pub async fn reclaim_expired(&self, now: DateTime<Utc>) -> DaemonResult<Vec<JobId>> {
        Ok(self.jobs.reclaim_expired(now).await?)
    }
}

fn fingerprint_of(payload: &JobPayload) -> Option<Fingerprint> {
    match payload {
        JobPayload::ProcessSingleVod { recording, .. } => Some(recording.fingerprint.clone()),
        JobPayload::CaptionCheckRepair { recording, .. } => Some(recording.fingerprint.clone()),
        JobPayload::ProcessRecentVods { .. } | JobPayload::CaptionCheck | JobPayload::Cleanup => None,
    }
}
