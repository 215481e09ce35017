//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error("message {0} could not be parsed, acked to avoid a poison-pill loop")]
    MalformedMessage(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    /// Transport-level failures are retryable by the caller; a malformed
    /// message is not (it has already been dropped from the pending list).
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::Redis(_) | QueueError::ConnectionFailed(_))
    }
}
