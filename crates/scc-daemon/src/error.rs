//! Daemon-level error type: the union of every subsystem error this binary
//! touches, collapsed to what `main` and the dispatch loop need to decide
//! between "log and keep going" and "exit".

use thiserror::Error;

pub type DaemonResult<T> = Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] scc_store::StoreError),

    #[error(transparent)]
    Queue(#[from] scc_queue::QueueError),

    #[error(transparent)]
    Scheduler(#[from] scc_scheduler::SchedulerError),

    #[error(transparent)]
    Cablecast(#[from] scc_clients::CablecastError),

    #[error(transparent)]
    Pipeline(#[from] scc_pipeline::PipelineError),

    #[error(transparent)]
    Scan(#[from] scc_scanner::ScanError),
}

impl DaemonError {
    /// Short machine-readable cause, stored on the Job row's `last_error`.
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::Config(_) => "config_error",
            DaemonError::Store(_) => "store_error",
            DaemonError::Queue(_) => "queue_error",
            DaemonError::Scheduler(_) => "scheduler_error",
            DaemonError::Cablecast(_) => "cablecast_error",
            DaemonError::Pipeline(e) if e.is_retryable() => "pipeline_transient_error",
            DaemonError::Pipeline(_) => "pipeline_error",
            DaemonError::Scan(_) => "scan_error",
        }
    }

    /// Whether the dispatcher should retry the job that produced this error
    /// (subject to its remaining attempt budget) rather than fail it outright.
    pub fn is_retryable(&self) -> bool {
        match self {
            DaemonError::Config(_) => false,
            DaemonError::Store(e) => e.is_retryable(),
            DaemonError::Queue(e) => e.is_retryable(),
            DaemonError::Scheduler(_) => true,
            DaemonError::Cablecast(_) => true,
            DaemonError::Pipeline(e) => e.is_retryable(),
            DaemonError::Scan(_) => true,
        }
    }
}
