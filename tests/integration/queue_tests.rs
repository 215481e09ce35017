//! Redis Streams queue integration tests.

use scc_models::{JobId, QueueName};
use scc_queue::{QueueConfig, QueueMessage, RedisQueue};

fn test_config(queue: &str) -> QueueConfig {
    let mut config = QueueConfig::from_env();
    // Keep this test run's stream names from colliding with a daemon's own.
    config.stream_prefix = format!("scc:test:{queue}");
    config
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    dotenvy::dotenv().ok();

    let queue = RedisQueue::new(test_config("conn")).expect("failed to build RedisQueue");
    let name = QueueName::from("default");
    queue.ensure_group(&name).await.expect("ensure_group failed");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_dequeue() {
    dotenvy::dotenv().ok();

    let queue = RedisQueue::new(test_config("enqueue-dequeue")).expect("failed to build RedisQueue");
    let name = QueueName::from("vod_processing");
    queue.ensure_group(&name).await.expect("ensure_group failed");

    let job_id = JobId::new();
    let message = QueueMessage::new(job_id.clone(), 1);
    queue.enqueue(&name, &message).await.expect("enqueue failed");

    let consumer = "test-consumer-1";
    let delivered = queue.consume(&name, consumer, 1000, 10).await.expect("consume failed");
    assert_eq!(delivered.len(), 1);

    let (message_id, received) = &delivered[0];
    assert_eq!(received.job_id, job_id);
    assert_eq!(received.attempt, 1);

    queue.ack(&name, message_id).await.expect("ack failed");
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dlq() {
    dotenvy::dotenv().ok();

    let queue = RedisQueue::new(test_config("dlq")).expect("failed to build RedisQueue");
    let name = QueueName::from("default");
    queue.ensure_group(&name).await.expect("ensure_group failed");

    let job_id = JobId::new();
    let message = QueueMessage::new(job_id.clone(), 3);
    queue.enqueue(&name, &message).await.expect("enqueue failed");

    let delivered = queue.consume(&name, "test-consumer-dlq", 1000, 1).await.expect("consume failed");
    let (message_id, _) = &delivered[0];

    queue
        .dead_letter(&name, message_id, &message, "max attempts exceeded")
        .await
        .expect("dead_letter failed");

    assert_eq!(queue.len(&name).await.expect("len failed"), 0);
    assert_eq!(queue.dlq_len(&name).await.expect("dlq_len failed"), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_expired() {
    dotenvy::dotenv().ok();

    let queue = RedisQueue::new(test_config("claim-expired")).expect("failed to build RedisQueue");
    let name = QueueName::from("default");
    queue.ensure_group(&name).await.expect("ensure_group failed");

    let job_id = JobId::new();
    queue.enqueue(&name, &QueueMessage::new(job_id.clone(), 1)).await.expect("enqueue failed");

    // Deliver to one consumer but never ack, simulating a worker that died
    // mid-job; a second consumer should be able to claim it once idle long
    // enough (min_idle_ms = 0 here since there's no crashed worker to wait out).
    queue.consume(&name, "dead-consumer", 1000, 10).await.expect("consume failed");

    let claimed = queue
        .claim_expired(&name, "recovery-consumer", 0, 10)
        .await
        .expect("claim_expired failed");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].1.job_id, job_id);
}
