//! Error types shared by the Cablecast client, ASR client, and filesystem
//! capability.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CablecastError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request to {url} failed with {status}: {body}")]
    RequestFailed { url: String, status: u16, body: String },

    #[error("show not found: {0}")]
    ShowNotFound(String),

    #[error("vod not found: {0}")]
    VodNotFound(String),

    #[error("rate limiter refused to admit the request")]
    RateLimited,
}

pub type CablecastResult<T> = Result<T, CablecastError>;

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("ASR service returned {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// Business error: a zero-segment transcript is not a crash, but it is
    /// never an acceptable result for the pipeline to accept.
    #[error("transcript contained zero segments")]
    EmptyTranscript,

    #[error("segments are not well-formed: {0}")]
    MalformedSegments(String),
}

pub type AsrResult<T> = Result<T, AsrError>;

#[derive(Debug, Error)]
pub enum FsCapabilityError {
    #[error("io error on {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

pub type FsCapabilityResult<T> = Result<T, FsCapabilityError>;
