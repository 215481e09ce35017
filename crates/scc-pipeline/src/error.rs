//! Pipeline error taxonomy: transient infra failures are retried by the
//! dispatcher, permanent/contract failures are not, business failures are a
//! distinct concept from crashes, and cancellation is cooperative rather
//! than an error the caller should alarm on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retryable: network blips, timeouts, transient filesystem errors.
    #[error("transient infrastructure error: {0}")]
    InfraTransient(String),

    /// Not retryable without operator intervention: missing binary, schema
    /// mismatch, disk full.
    #[error("permanent infrastructure error: {0}")]
    InfraPermanent(String),

    /// The operation completed but produced a result the domain rejects
    /// (empty transcript, malformed caption file, duration mismatch).
    #[error("business rule violation: {0}")]
    Business(String),

    /// An invariant the code assumes was violated; a bug, not an operational event.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Cooperative cancellation observed between stages.
    #[error("pipeline run cancelled")]
    Cancelled,
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::InfraTransient(_))
    }
}

impl From<scc_clients::AsrError> for PipelineError {
    fn from(e: scc_clients::AsrError) -> Self {
        match e {
            scc_clients::AsrError::EmptyTranscript => PipelineError::Business("empty transcript".to_string()),
            scc_clients::AsrError::MalformedSegments(reason) => PipelineError::Business(reason),
            other => PipelineError::InfraTransient(other.to_string()),
        }
    }
}

impl From<scc_clients::CablecastError> for PipelineError {
    fn from(e: scc_clients::CablecastError) -> Self {
        match &e {
            scc_clients::CablecastError::ShowNotFound(_) | scc_clients::CablecastError::VodNotFound(_) => {
                PipelineError::Business(e.to_string())
            }
            _ => PipelineError::InfraTransient(e.to_string()),
        }
    }
}

impl From<scc_clients::FsCapabilityError> for PipelineError {
    fn from(e: scc_clients::FsCapabilityError) -> Self {
        PipelineError::InfraTransient(e.to_string())
    }
}

impl From<scc_store::StoreError> for PipelineError {
    fn from(e: scc_store::StoreError) -> Self {
        if e.is_retryable() {
            PipelineError::InfraTransient(e.to_string())
        } else {
            PipelineError::InfraPermanent(e.to_string())
        }
    }
}

impl From<scc_models::caption::SccError> for PipelineError {
    fn from(e: scc_models::caption::SccError) -> Self {
        PipelineError::Business(e.to_string())
    }
}
