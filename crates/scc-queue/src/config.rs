//! Queue configuration, loaded once at startup.

use std::time::Duration;

use scc_models::QueueName;

/// One configured queue: a name, its worker concurrency cap, and an optional
/// bound on pending depth (used only for operator alerting, never enforced
/// as backpressure against enqueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDef {
    pub name: QueueName,
    pub concurrency: usize,
    pub max_queue_depth: Option<usize>,
}

impl QueueDef {
    pub fn new(name: impl Into<QueueName>, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            concurrency,
            max_queue_depth: None,
        }
    }
}

/// Redis Streams connection and naming configuration for the queue layer.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    pub stream_prefix: String,
    pub consumer_group: String,
    pub dlq_suffix: String,
    pub queues: Vec<QueueDef>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_prefix: "scc:queue".to_string(),
            consumer_group: "scc:workers".to_string(),
            dlq_suffix: "dlq".to_string(),
            queues: vec![
                QueueDef::new("vod_processing", 3),
                QueueDef::new("default", 4),
                QueueDef::new("transcription", 2),
            ],
            backoff_base: Duration::from_secs(60),
            backoff_cap: Duration::from_secs(30 * 60),
        }
    }
}

impl QueueConfig {
    /// Overlay environment variables onto the default configuration. Matches
    /// the `*Config::from_env()` convention used throughout this codebase;
    /// per-queue definitions are expected to come from the layered
    /// `config`-crate settings file, not individual env vars.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("SCC_REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(base_secs) = std::env::var("SCC_RETRY_BACKOFF_BASE_SECS").ok().and_then(|s| s.parse().ok()) {
            config.backoff_base = Duration::from_secs(base_secs);
        }
        if let Some(cap_secs) = std::env::var("SCC_RETRY_BACKOFF_CAP_SECS").ok().and_then(|s| s.parse().ok()) {
            config.backoff_cap = Duration::from_secs(cap_secs);
        }
        config
    }

    pub fn stream_name(&self, queue: &QueueName) -> String {
        format!("{}:{}", self.stream_prefix, queue.as_str())
    }

    pub fn dlq_stream_name(&self, queue: &QueueName) -> String {
        format!("{}:{}:{}", self.stream_prefix, queue.as_str(), self.dlq_suffix)
    }

    pub fn queue_def(&self, queue: &QueueName) -> Option<&QueueDef> {
        self.queues.iter().find(|q| &q.name == queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queues_match_the_documented_minimum() {
        let config = QueueConfig::default();
        assert!(config.queue_def(&QueueName::from("vod_processing")).is_some());
        assert!(config.queue_def(&QueueName::from("default")).is_some());
        assert!(config.queue_def(&QueueName::from("transcription")).is_some());
    }

    #[test]
    fn stream_name_is_namespaced_by_queue() {
        let config = QueueConfig::default();
        let name = config.stream_name(&QueueName::from("default"));
        assert_eq!(name, "scc:queue:default");
    }
}
