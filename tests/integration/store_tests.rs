//! Durable store integration tests. Unlike the Redis and scheduler suites,
//! these run unconditionally: an in-memory SQLite database needs no external
//! service, so there is no reason to gate them behind `#[ignore]`.

use scc_models::{Fingerprint, Job, JobPayload, JobState, Recording, StructuredError, VolumeId};
use scc_store::{JobFilter, JobRepository, PipelineRunRepository};

async fn test_pool() -> sqlx::SqlitePool {
    scc_store::connect(":memory:").await.expect("failed to open in-memory store")
}

fn sample_job(fingerprint: Option<&str>) -> Job {
    let mut job = Job::new("process-single-vod", "vod_processing", JobPayload::CaptionCheck, 3);
    if let Some(fp) = fingerprint {
        job = job.with_fingerprint(Fingerprint::from(fp));
    }
    job
}

#[tokio::test]
async fn test_job_repository_crud() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool);

    let job = sample_job(None);
    repo.insert(&job).await.expect("insert failed");

    let fetched = repo.get(&job.job_id).await.expect("get failed");
    assert_eq!(fetched.job_id, job.job_id);
    assert_eq!(fetched.state, JobState::Queued);

    repo.transition(&job.job_id, JobState::Running, None).await.expect("transition failed");
    let running = repo.get(&job.job_id).await.expect("get failed");
    assert_eq!(running.state, JobState::Running);

    let err = StructuredError::new("infra_transient", "ASR timed out");
    repo.retry(&job.job_id, chrono::Utc::now(), err).await.expect("retry failed");
    let retried = repo.get(&job.job_id).await.expect("get failed");
    assert_eq!(retried.state, JobState::Retrying);
    assert_eq!(retried.attempt, 2);
    assert!(retried.last_error.is_some());
}

#[tokio::test]
async fn test_job_repository_list_and_filter() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool);

    for _ in 0..3 {
        repo.insert(&sample_job(None)).await.expect("insert failed");
    }
    let mut other = Job::new("cleanup", "default", JobPayload::Cleanup, 1);
    other.job_id = scc_models::JobId::new();
    repo.insert(&other).await.expect("insert failed");

    let vod_processing = repo
        .list(&JobFilter { queue: Some("vod_processing".into()), ..Default::default() })
        .await
        .expect("list failed");
    assert_eq!(vod_processing.len(), 3);

    let default_queue = repo
        .list(&JobFilter { queue: Some("default".into()), ..Default::default() })
        .await
        .expect("list failed");
    assert_eq!(default_queue.len(), 1);
}

#[tokio::test]
async fn test_duplicate_fingerprint_rejected() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool);

    let fingerprint = "volume-a\0/rec/show.mp4\0123\0456";
    repo.insert(&sample_job(Some(fingerprint))).await.expect("first insert failed");

    let result = repo.insert(&sample_job(Some(fingerprint))).await;
    assert!(matches!(result, Err(scc_store::StoreError::DuplicateActiveFingerprint(_))));
}

#[tokio::test]
async fn test_cancel_only_applies_to_non_terminal_jobs() {
    let pool = test_pool().await;
    let repo = JobRepository::new(pool);

    let job = sample_job(None);
    repo.insert(&job).await.expect("insert failed");
    repo.cancel(&job.job_id).await.expect("cancel failed");

    let cancelled = repo.get(&job.job_id).await.expect("get failed");
    assert_eq!(cancelled.state, JobState::Cancelled);

    // A second cancel has nothing left to affect: zero rows match the
    // non-terminal state filter, which the repository reports as not found.
    let result = repo.cancel(&job.job_id).await;
    assert!(matches!(result, Err(scc_store::StoreError::JobNotFound(_))));
}

#[tokio::test]
async fn test_pipeline_run_repository_upsert_and_lookup() {
    let pool = test_pool().await;
    let runs = PipelineRunRepository::new(pool);

    let job_id = scc_models::JobId::new();
    let recording = Recording::new(
        VolumeId::from("flex-1"),
        std::path::PathBuf::from("/mnt/flex-1/recordings/show.mp4"),
        1_048_576,
        chrono::Utc::now(),
    );
    let mut run = scc_models::PipelineRun::new(job_id.clone(), recording.clone());

    runs.upsert(&run).await.expect("upsert failed");

    let by_job = runs.get_by_job(&job_id).await.expect("get_by_job failed");
    assert!(by_job.is_some());
    assert_eq!(by_job.unwrap().run_id, run.run_id);

    run.complete_stage(
        scc_models::PipelineStage::Discovered,
        Some(scc_models::Artifact::new(recording.absolute_path.clone(), recording.fingerprint.as_str(), recording.size_bytes)),
    );
    runs.upsert(&run).await.expect("second upsert failed");

    let reloaded = runs.get(&run.run_id).await.expect("get failed");
    assert_eq!(reloaded.stage, scc_models::PipelineStage::Discovered);
    assert_eq!(reloaded.resume_point(), scc_models::PipelineStage::Transcribed);
}
