//! Core daemon: a scheduler task and a per-queue dispatcher built from one
//! `CoreConfig` snapshot, plus the binary entrypoint that wires them together.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod metrics;

pub use config::{CoreConfig, FanoutSuccessPolicy};
pub use context::{CoreContext, QueueSummary};
pub use dispatch::Dispatcher;
pub use error::{DaemonError, DaemonResult};
