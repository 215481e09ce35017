//! The lightweight message carried on the stream. The authoritative Job row
//! lives in `scc-store`; this is only enough to look it up and know which
//! attempt the worker is about to run.

use serde::{Deserialize, Serialize};

use scc_models::JobId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub job_id: JobId,
    pub attempt: u32,
}

impl QueueMessage {
    pub fn new(job_id: JobId, attempt: u32) -> Self {
        Self { job_id, attempt }
    }
}
