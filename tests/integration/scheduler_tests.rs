//! Scheduler integration tests: a real `Scheduler` driven against an
//! in-memory store, the same way `store_tests.rs` exercises the repositories
//! directly. No external service is required, so these run unconditionally.

use scc_models::{JobPayload, JobTemplate};
use scc_scheduler::{Scheduler, TickOutcome};
use scc_store::{JobFilter, JobRepository, SchedulerRepository};

async fn test_pool() -> sqlx::SqlitePool {
    scc_store::connect(":memory:").await.expect("failed to open in-memory store")
}

#[tokio::test]
async fn test_tick_fires_a_due_template() {
    let pool = test_pool().await;
    let scheduler_repo = SchedulerRepository::new(pool.clone());
    let job_repo = JobRepository::new(pool.clone());

    let template = JobTemplate::new("every-minute-cleanup", "* * * * *", "default", JobPayload::Cleanup);
    let name = template.name.clone();

    let now = chrono::Utc::now();
    scheduler_repo.record_fired(&name, now - chrono::Duration::minutes(2)).await.expect("seed record_fired failed");

    let scheduler = Scheduler::new(vec![template], scheduler_repo, job_repo).expect("failed to build scheduler");
    let outcomes = scheduler.tick_once(now).await.expect("tick_once failed");

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].1, TickOutcome::Fired { .. }));

    let jobs = JobRepository::new(pool).list(&JobFilter { queue: Some("default".into()), ..Default::default() }).await.expect("list failed");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].template_name, name);
}

#[tokio::test]
async fn test_tick_is_not_due_before_first_natural_fire() {
    let pool = test_pool().await;
    let scheduler_repo = SchedulerRepository::new(pool.clone());
    let job_repo = JobRepository::new(pool.clone());

    // A template that has never fired waits for its next natural tick rather
    // than firing immediately on the first poll.
    let template = JobTemplate::new("daily-midnight", "0 0 * * *", "default", JobPayload::Cleanup);
    let scheduler = Scheduler::new(vec![template], scheduler_repo, job_repo).expect("failed to build scheduler");

    let now = chrono::Utc::now();
    let outcomes = scheduler.tick_once(now).await.expect("tick_once failed");

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1, TickOutcome::NotDue);
}

#[tokio::test]
async fn test_repeated_tick_does_not_refire_the_same_minute() {
    let pool = test_pool().await;
    let scheduler_repo = SchedulerRepository::new(pool.clone());
    let job_repo = JobRepository::new(pool.clone());

    let template = JobTemplate::new("every-minute-check", "* * * * *", "default", JobPayload::CaptionCheck);
    let name = template.name.clone();

    let now = chrono::Utc::now();
    scheduler_repo.record_fired(&name, now - chrono::Duration::minutes(2)).await.expect("seed record_fired failed");

    let scheduler = Scheduler::new(vec![template], scheduler_repo, job_repo).expect("failed to build scheduler");

    let first = scheduler.tick_once(now).await.expect("first tick_once failed");
    assert!(matches!(first[0].1, TickOutcome::Fired { .. }));

    let second = scheduler.tick_once(now).await.expect("second tick_once failed");
    assert_eq!(second[0].1, TickOutcome::NotDue);
}
