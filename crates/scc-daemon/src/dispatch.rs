//! The job dispatcher: one worker pool per configured queue, each with its
//! own stale-delivery reclaim task. The authoritative Job record always
//! lives in `scc-store`; this only owns getting it in front of a handler
//! at least once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scc_models::{CablecastShowId, Job, JobId, JobPayload, JobState, QueueName, Recording, StructuredError, VolumeId};
use scc_pipeline::PipelineContext;
use scc_queue::QueueMessage;

use crate::context::CoreContext;
use crate::error::{DaemonError, DaemonResult};
use crate::metrics;

/// How long a claimed delivery may sit un-acked before another consumer is
/// allowed to claim it: generously above the slowest single pipeline stage.
const CLAIM_MIN_IDLE_MS: u64 = 1_800_000;
const CLAIM_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Temp-dir entries untouched for this long are considered abandoned
/// (crashed run whose job was already dead-lettered) and swept by Cleanup.
const STALE_TEMP_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

pub struct Dispatcher {
    ctx: Arc<CoreContext>,
    consumer_name: String,
    shutdown: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("scc-daemon-{}", Uuid::new_v4());
        Self { ctx, consumer_name, shutdown }
    }

    pub fn shutdown_sender(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run one queue's consume loop plus its stale-claim task until shutdown.
    /// `concurrency` is that queue's own configured worker cap, not shared
    /// with any other queue's pool.
    pub async fn run_queue(&self, queue: QueueName, concurrency: usize) {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut shutdown_rx = self.shutdown.subscribe();

        let claim_task = self.spawn_claim_task(queue.clone(), Arc::clone(&semaphore));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(queue = %queue, "dispatcher shutting down");
                        break;
                    }
                }
                result = self.consume_once(&queue, &semaphore) => {
                    if let Err(e) = result {
                        error!(queue = %queue, error = %e, "error consuming jobs");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();
        wait_for_drain(&semaphore, concurrency).await;
        info!(queue = %queue, "dispatcher stopped");
    }

    fn spawn_claim_task(&self, queue: QueueName, semaphore: Arc<Semaphore>) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(&self.ctx);
        let consumer_name = self.consumer_name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLAIM_POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = ctx.reclaim_expired(chrono::Utc::now()).await {
                            warn!(error = %e, "reclaim_expired failed");
                        }

                        match ctx.redis.claim_expired(&queue, &consumer_name, CLAIM_MIN_IDLE_MS, 5).await {
                            Ok(claimed) if !claimed.is_empty() => {
                                info!(queue = %queue, count = claimed.len(), "claimed stale deliveries");
                                for (message_id, msg) in claimed {
                                    let ctx = Arc::clone(&ctx);
                                    let queue = queue.clone();
                                    let cancel = shutdown_rx.clone();
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else { break };
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        execute(&ctx, &queue, &message_id, msg, cancel).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(queue = %queue, error = %e, "claim_expired failed"),
                        }
                    }
                }
            }
        })
    }

    async fn consume_once(&self, queue: &QueueName, semaphore: &Arc<Semaphore>) -> DaemonResult<()> {
        let available = semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let messages = self.ctx.redis.consume(queue, &self.consumer_name, 1000, available.min(5)).await?;
        if messages.is_empty() {
            return Ok(());
        }

        debug!(queue = %queue, count = messages.len(), "consumed messages");

        for (message_id, msg) in messages {
            let ctx = Arc::clone(&self.ctx);
            let queue = queue.clone();
            let cancel = self.shutdown.subscribe();
            let permit = Arc::clone(semaphore)
                .acquire_owned()
                .await
                .map_err(|_| DaemonError::Config("dispatcher semaphore closed".to_string()))?;
            tokio::spawn(async move {
                let _permit = permit;
                execute(&ctx, &queue, &message_id, msg, cancel).await;
            });
        }

        Ok(())
    }
}

async fn wait_for_drain(semaphore: &Arc<Semaphore>, max_permits: usize) {
    loop {
        if semaphore.available_permits() == max_permits {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Execute one delivery end to end: look up the authoritative Job, run its
/// handler, and resolve the outcome against both the store and the stream.
async fn execute(ctx: &Arc<CoreContext>, queue: &QueueName, message_id: &str, msg: QueueMessage, mut cancel: watch::Receiver<bool>) {
    let job_id = msg.job_id.clone();

    let job = match ctx.jobs.get(&job_id).await {
        Ok(job) => job,
        Err(e) => {
            warn!(%job_id, error = %e, "job missing from store, acking to drop delivery");
            ctx.redis.ack(queue, message_id).await.ok();
            return;
        }
    };

    if job.state.is_terminal() {
        debug!(%job_id, state = %job.state, "delivery for already-terminal job, acking");
        ctx.redis.ack(queue, message_id).await.ok();
        return;
    }

    if let Err(e) = ctx.jobs.transition(&job_id, JobState::Running, None).await {
        warn!(%job_id, error = %e, "failed to mark job running");
    }

    info!(%job_id, template = %job.template_name, attempt = job.attempt, "executing job");
    let result = run_handler(ctx, &job, &mut cancel).await;

    match result {
        Ok(()) => {
            if let Err(e) = ctx.jobs.transition(&job_id, JobState::Succeeded, None).await {
                warn!(%job_id, error = %e, "failed to mark job succeeded");
            }
            metrics::record_job_completed(job.template_name.as_str());
            ctx.redis.ack(queue, message_id).await.ok();
        }
        Err(DaemonError::Pipeline(scc_pipeline::PipelineError::Cancelled)) => {
            info!(%job_id, "job cancelled cooperatively, leaving queued for a future attempt");
            ctx.redis.ack(queue, message_id).await.ok();
        }
        Err(err) => handle_failure(ctx, queue, message_id, &job, err).await,
    }
}

async fn handle_failure(ctx: &Arc<CoreContext>, queue: &QueueName, message_id: &str, job: &Job, err: DaemonError) {
    error!(job_id = %job.job_id, error = %err, "job failed");
    let structured = StructuredError::new(err.code(), err.to_string());

    if err.is_retryable() && job.attempt < job.max_attempts {
        let delay = retry_delay(job.attempt);
        if let Err(e) = ctx.jobs.retry(&job.job_id, chrono::Utc::now() + delay, structured).await {
            warn!(job_id = %job.job_id, error = %e, "failed to schedule retry");
        }
        metrics::record_job_retried(job.template_name.as_str());

        ctx.redis.ack(queue, message_id).await.ok();
        let next = QueueMessage::new(job.job_id.clone(), job.attempt + 1);
        if let Err(e) = ctx.redis.enqueue(queue, &next).await {
            error!(job_id = %job.job_id, error = %e, "failed to re-enqueue retrying job");
        }
        return;
    }

    if let Err(e) = ctx.jobs.transition(&job.job_id, JobState::Failed, Some(structured)).await {
        warn!(job_id = %job.job_id, error = %e, "failed to mark job failed");
    }
    metrics::record_job_failed(job.template_name.as_str());

    let message = QueueMessage::new(job.job_id.clone(), job.attempt);
    if let Err(e) = ctx.redis.dead_letter(queue, message_id, &message, &err.to_string()).await {
        error!(job_id = %job.job_id, error = %e, "failed to dead-letter job");
    } else {
        metrics::record_job_dead_lettered(job.template_name.as_str());
    }
}

fn retry_delay(attempt: u32) -> chrono::Duration {
    let secs = 30u64.saturating_mul(1u64 << attempt.min(8));
    chrono::Duration::seconds(secs.min(3600) as i64)
}

async fn run_handler(ctx: &CoreContext, job: &Job, cancel: &mut watch::Receiver<bool>) -> DaemonResult<()> {
    match &job.payload {
        JobPayload::ProcessRecentVods { recent_n } => handle_process_recent_vods(ctx, &job.job_id, *recent_n).await,
        JobPayload::ProcessSingleVod { volume_id, recording, cablecast_show_id } => {
            handle_process_single_vod(ctx, job, volume_id, recording, cablecast_show_id.clone(), cancel).await
        }
        JobPayload::CaptionCheck => handle_caption_check(ctx, &job.job_id).await,
        JobPayload::CaptionCheckRepair { volume_id, recording } => {
            handle_process_single_vod(ctx, job, volume_id, recording, None, cancel).await
        }
        JobPayload::Cleanup => handle_cleanup(ctx).await,
    }
}

/// Fan out over the N most recent recordings of every enabled volume,
/// enqueueing one `ProcessSingleVod` child per candidate. The parent job
/// succeeds once fan-out dispatch completes; it does not block on children
/// finishing (`fanout_success_policy` governs only how an operator should
/// read the set of child outcomes, not this job's own state transition).
async fn handle_process_recent_vods(ctx: &CoreContext, parent: &JobId, recent_n: Option<usize>) -> DaemonResult<()> {
    let mut policy = ctx.scan_policy.clone();
    if let Some(n) = recent_n {
        policy.recent_n = n;
    }

    for volume in ctx.volumes.iter().filter(|v| v.enabled) {
        let outcome = scc_scanner::scan(volume, &policy).await?;
        if let Some(diag) = outcome.diagnostic {
            warn!(volume = %volume.id, ?diag, "volume unavailable during fan-out scan");
            metrics::record_volume_unavailable(volume.id.as_str());
            continue;
        }

        metrics::record_recordings_discovered(volume.id.as_str(), outcome.recordings.len() as u64);

        for recording in outcome.recordings {
            let payload = JobPayload::ProcessSingleVod {
                volume_id: volume.id.clone(),
                recording: recording.clone(),
                cablecast_show_id: None,
            };
            let child = Job::new("process-single-vod", "vod_processing", payload, 3)
                .with_fingerprint(recording.fingerprint.clone())
                .with_parent(parent.clone());

            match ctx.enqueue(&child).await {
                Ok(()) => {}
                Err(DaemonError::Store(scc_store::StoreError::DuplicateActiveFingerprint(_))) => {
                    debug!(recording = %recording.filename, "skipping fan-out child, already active");
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

/// Audit every enabled volume's existing SCC sidecars, enqueueing a
/// single-attempt repair job for anything missing or malformed.
async fn handle_caption_check(ctx: &CoreContext, parent: &JobId) -> DaemonResult<()> {
    let mut policy = ctx.scan_policy.clone();
    policy.skip_if_caption_exists = false;

    for volume in ctx.volumes.iter().filter(|v| v.enabled) {
        let outcome = scc_scanner::scan(volume, &policy).await?;
        if let Some(diag) = outcome.diagnostic {
            warn!(volume = %volume.id, ?diag, "volume unavailable during caption check");
            metrics::record_volume_unavailable(volume.id.as_str());
            continue;
        }

        for recording in outcome.recordings {
            let check = scc_pipeline::check_captions(&recording).await;
            if check == scc_pipeline::CaptionCheckOutcome::Ok {
                continue;
            }

            info!(volume = %volume.id, recording = %recording.filename, ?check, "caption check repair candidate");
            metrics::record_caption_check_repair(volume.id.as_str());

            let payload = JobPayload::CaptionCheckRepair { volume_id: volume.id.clone(), recording: recording.clone() };
            let child = Job::new("caption-check-repair", "default", payload, 1)
                .with_fingerprint(recording.fingerprint.clone())
                .with_parent(parent.clone());

            match ctx.enqueue(&child).await {
                Ok(()) => {}
                Err(DaemonError::Store(scc_store::StoreError::DuplicateActiveFingerprint(_))) => {
                    debug!(recording = %recording.filename, "skipping repair, already active");
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

/// Drive (or resume) the seven-stage pipeline for one recording. Used by
/// both `ProcessSingleVod` and `CaptionCheckRepair`, which differ only in
/// whether an operator has already picked a Cablecast show.
async fn handle_process_single_vod(
    ctx: &CoreContext,
    job: &Job,
    volume_id: &VolumeId,
    recording: &Recording,
    cablecast_show_id: Option<CablecastShowId>,
    cancel: &mut watch::Receiver<bool>,
) -> DaemonResult<()> {
    let volume = ctx
        .volumes
        .iter()
        .find(|v| &v.id == volume_id)
        .ok_or_else(|| DaemonError::Config(format!("job references unknown volume {volume_id}")))?;

    let mut run = ctx
        .runs
        .get_by_job(&job.job_id)
        .await?
        .unwrap_or_else(|| scc_models::PipelineRun::new(job.job_id.clone(), recording.clone()));

    let pipeline_ctx = PipelineContext {
        cablecast: Arc::clone(&ctx.cablecast),
        asr: Arc::clone(&ctx.asr),
        runs: Arc::clone(&ctx.runs),
        temp_root: ctx.temp_root.clone(),
    };

    scc_pipeline::drive(&pipeline_ctx, &mut run, volume, cablecast_show_id, cancel).await?;

    if run.needs_review {
        metrics::record_vod_needs_review(volume_id.as_str());
    }

    Ok(())
}

/// Reclaim expired leases and sweep temp-dir entries abandoned long enough
/// that whatever job owned them is already resolved one way or another.
async fn handle_cleanup(ctx: &CoreContext) -> DaemonResult<()> {
    let reclaimed = ctx.reclaim_expired(chrono::Utc::now()).await?;
    if !reclaimed.is_empty() {
        info!(count = reclaimed.len(), "reclaimed expired leases");
    }

    let entries = match scc_clients::fs_capability::read_dir(&ctx.temp_root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "cleanup could not list temp root");
            return Ok(());
        }
    };

    let cutoff = std::time::SystemTime::now() - STALE_TEMP_AGE;
    for path in entries {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => continue,
        };
        let modified = metadata.modified().unwrap_or_else(|_| std::time::SystemTime::now());
        if modified >= cutoff {
            continue;
        }

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to remove stale temp entry");
        } else {
            debug!(path = %path.display(), "removed stale temp entry");
        }
    }

    Ok(())
}
