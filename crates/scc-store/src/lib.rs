//! Authoritative durable store for Jobs, PipelineRuns, and scheduler firing
//! state. SQLite via `sqlx`'s runtime query API, schema-versioned with
//! forward-only migrations under `migrations/`.

pub mod error;
pub mod job_repo;
pub mod pipeline_run_repo;
pub mod pool;
pub mod scheduler_repo;

pub use error::{StoreError, StoreResult};
pub use job_repo::{JobFilter, JobRepository};
pub use pipeline_run_repo::PipelineRunRepository;
pub use pool::connect;
pub use scheduler_repo::SchedulerRepository;
