//! Errors specific to cron parsing and scheduling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),

    #[error(transparent)]
    Store(#[from] scc_store::StoreError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
