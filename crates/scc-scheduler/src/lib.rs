//! Cron-driven firing of JobTemplates into the durable store. Wakes every 30
//! seconds, decides which templates are due given their persisted
//! `last_fired_at`, and inserts new `Job` rows — duplicate suppression and
//! the at-most-one-active-job-per-fingerprint invariant are enforced by
//! `scc-store`, not duplicated here.

pub mod cron_spec;
pub mod error;
pub mod scheduler;
pub mod templates;

pub use cron_spec::{CronSpec, ScheduleEntry};
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{Scheduler, TickOutcome, DEFAULT_CATCHUP_WINDOW, POLL_INTERVAL};
pub use templates::default_templates;
