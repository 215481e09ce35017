//! Schedulable job template definitions, loaded at startup from configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{QueueName, TemplateName};
use crate::job::JobPayload;

/// A schedulable unit: a name, a cron expression, a default payload shape,
/// and the queue it dispatches to. Immutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobTemplate {
    pub name: TemplateName,
    /// Standard 5-field cron expression.
    pub cron: String,
    /// Timezone name (IANA), e.g. "America/New_York". Defaults to UTC when absent.
    pub timezone: Option<String>,
    pub payload: JobPayload,
    pub queue: QueueName,
    pub concurrency_hint: Option<usize>,
}

impl JobTemplate {
    pub fn new(
        name: impl Into<TemplateName>,
        cron: impl Into<String>,
        queue: impl Into<QueueName>,
        payload: JobPayload,
    ) -> Self {
        Self {
            name: name.into(),
            cron: cron.into(),
            timezone: None,
            payload,
            queue: queue.into(),
            concurrency_hint: None,
        }
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timezone_is_none_meaning_utc() {
        let t = JobTemplate::new("cleanup", "0 5 * * *", "default", JobPayload::Cleanup);
        assert!(t.timezone.is_none());
    }
}
