//! Redis Streams lease/visibility mechanics for the dispatcher. The
//! authoritative Job and PipelineRun records live in `scc-store`; this crate
//! only owns getting a job's identity in front of a free worker, at least
//! once, with a bounded-retry dead-letter path when it never succeeds.

pub mod backoff;
pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod retry;

pub use backoff::BackoffPolicy;
pub use config::{QueueConfig, QueueDef};
pub use error::{QueueError, QueueResult};
pub use message::QueueMessage;
pub use queue::RedisQueue;
pub use retry::{retry_async, RetryConfig};
