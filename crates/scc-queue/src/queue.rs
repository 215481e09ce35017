//! Redis Streams consumer-group mechanics: enqueue, consume, ack, claim
//! expired, and a dead-letter stream. Owns lease/visibility semantics only —
//! the authoritative Job record lives in `scc-store`.

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use scc_models::QueueName;

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::message::QueueMessage;

pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisQueue {
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Idempotently create the consumer group for `queue` (and its stream).
    pub async fn ensure_group(&self, queue: &QueueName) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(queue);

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!(%stream, "created consumer group"),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(%stream, "consumer group already exists");
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Push `message` onto `queue`'s stream. Returns the stream message ID.
    pub async fn enqueue(&self, queue: &QueueName, message: &QueueMessage) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(queue);
        let payload = serde_json::to_string(message)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("msg")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        debug!(%stream, job_id = %message.job_id, %message_id, "enqueued");
        Ok(message_id)
    }

    /// Read up to `count` new messages from `queue` as `consumer_name`,
    /// blocking up to `block_ms` if the stream is empty.
    pub async fn consume(
        &self,
        queue: &QueueName,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueMessage)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(queue);

        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut out = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();
                match extract_message(&entry) {
                    Ok(Some(msg)) => out.push((message_id, msg)),
                    Ok(None) => {
                        warn!(%message_id, "message missing payload field, acking to drop");
                        self.ack(queue, &message_id).await.ok();
                    }
                    Err(e) => {
                        warn!(%message_id, error = %e, "malformed message payload, acking to drop");
                        self.ack(queue, &message_id).await.ok();
                    }
                }
            }
        }
        Ok(out)
    }

    /// Claim pending entries idle for at least `min_idle_ms`: the worker that
    /// originally claimed them is presumed dead.
    pub async fn claim_expired(
        &self,
        queue: &QueueName,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueMessage)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(queue);

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let stale_ids: Vec<String> = pending
            .ids
            .into_iter()
            .filter(|entry| entry.time_since_delivered >= min_idle_ms as usize)
            .map(|entry| entry.id)
            .collect();

        if stale_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&stream).arg(&self.config.consumer_group).arg(consumer_name).arg(min_idle_ms);
        for id in &stale_ids {
            cmd.arg(id);
        }
        let claimed: Vec<redis::streams::StreamId> = cmd.query_async(&mut conn).await?;

        let mut out = Vec::new();
        for entry in &claimed {
            match extract_message(entry) {
                Ok(Some(msg)) => out.push((entry.id.clone(), msg)),
                _ => {
                    self.ack(queue, &entry.id).await.ok();
                }
            }
        }
        Ok(out)
    }

    /// Acknowledge and remove a message once its job has reached a terminal
    /// outcome for this delivery (success, or handed to the DLQ).
    pub async fn ack(&self, queue: &QueueName, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let stream = self.config.stream_name(queue);

        redis::cmd("XACK")
            .arg(&stream)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("XDEL").arg(&stream).arg(message_id).query_async::<()>(&mut conn).await?;

        Ok(())
    }

    /// Move a message to the dead-letter stream after retries are exhausted.
    pub async fn dead_letter(&self, queue: &QueueName, message_id: &str, message: &QueueMessage, reason: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let dlq_stream = self.config.dlq_stream_name(queue);
        let payload = serde_json::to_string(message)?;

        redis::cmd("XADD")
            .arg(&dlq_stream)
            .arg("*")
            .arg("msg")
            .arg(&payload)
            .arg("reason")
            .arg(reason)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(queue, message_id).await?;
        warn!(job_id = %message.job_id, %reason, "moved job to dead-letter stream");
        Ok(())
    }

    pub async fn len(&self, queue: &QueueName) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.config.stream_name(queue)).await?;
        Ok(len)
    }

    pub async fn dlq_len(&self, queue: &QueueName) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(self.config.dlq_stream_name(queue)).await?;
        Ok(len)
    }
}

fn extract_message(entry: &redis::streams::StreamId) -> QueueResult<Option<QueueMessage>> {
    match entry.map.get("msg") {
        Some(redis::Value::BulkString(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            let message = serde_json::from_str(&text).map_err(|e| QueueError::MalformedMessage(e.to_string()))?;
            Ok(Some(message))
        }
        _ => Ok(None),
    }
}
