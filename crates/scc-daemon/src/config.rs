//! Single configuration snapshot for the daemon, loaded once at startup.
//! Layers one `config::Config` over `dotenvy`-loaded environment variables,
//! so the whole process starts from one consistent view of its settings
//! instead of every subsystem re-reading the environment independently.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use scc_clients::{AsrConfig, CablecastConfig};
use scc_models::{StorageVolume, VolumeId};
use scc_queue::QueueConfig;
use scc_scanner::ScanPolicy;

use crate::error::{DaemonError, DaemonResult};

/// How a fan-out parent job resolves once its children finish. `Any` (the
/// default) succeeds the parent as soon as one child succeeds; `All` requires
/// every child to succeed. This is a process-wide default, not a per-template
/// override — operators needing all-or-nothing set it through `JobPayload`
/// on the template instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutSuccessPolicy {
    Any,
    All,
}

impl Default for FanoutSuccessPolicy {
    fn default() -> Self {
        Self::Any
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeSetting {
    pub id: String,
    pub mount_path: PathBuf,
    pub label: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    database_path: Option<String>,
    temp_root: Option<PathBuf>,
    volumes: Option<Vec<VolumeSetting>>,
    scan_recent_n: Option<usize>,
    scan_min_size_bytes: Option<u64>,
    scheduler_catchup_secs: Option<i64>,
    fanout_success_policy: Option<FanoutSuccessPolicy>,
    metrics_port: Option<u16>,
}

/// The fully resolved configuration snapshot handed to `CoreContext::new`.
/// Every field here is resolved once, together, before anything else in the
/// process starts, rather than each subsystem calling its own `from_env()`
/// independently.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_path: String,
    pub temp_root: PathBuf,
    pub volumes: Vec<StorageVolume>,
    pub scan_policy: ScanPolicy,
    pub scheduler_catchup: Duration,
    pub fanout_success_policy: FanoutSuccessPolicy,
    pub metrics_port: u16,
    pub queue: QueueConfig,
    pub cablecast: CablecastConfig,
    pub asr: AsrConfig,
}

const DEFAULT_DATABASE_PATH: &str = "scc.sqlite3";
const DEFAULT_TEMP_ROOT: &str = "/tmp/scc-pipeline";
const DEFAULT_METRICS_PORT: u16 = 9184;
const DEFAULT_SCHEDULER_CATCHUP_SECS: i64 = 300;

impl CoreConfig {
    /// Load from (in ascending priority) built-in defaults, an optional file
    /// named by `SCC_CONFIG_FILE`, and `SCC__`-prefixed environment
    /// variables. Call `dotenvy::dotenv()` before this so `.env` entries are
    /// already in the process environment by the time it runs.
    pub fn load() -> DaemonResult<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var("SCC_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("SCC").separator("__").try_parsing(true));

        let raw: RawConfig = builder
            .build()
            .map_err(|e| DaemonError::Config(e.to_string()))?
            .try_deserialize()
            .unwrap_or_default();

        let volumes = raw
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| {
                let mut volume = StorageVolume::new(VolumeId::from(v.id), v.mount_path, v.label);
                volume.enabled = v.enabled;
                volume
            })
            .collect();

        let mut scan_policy = ScanPolicy::default();
        if let Some(n) = raw.scan_recent_n {
            scan_policy.recent_n = n;
        }
        if let Some(bytes) = raw.scan_min_size_bytes {
            scan_policy.min_size_bytes = bytes;
        }

        let cablecast = CablecastConfig::from_env().map_err(|e| DaemonError::Config(e.to_string()))?;
        let asr = AsrConfig::from_env().map_err(|e| DaemonError::Config(e.to_string()))?;
        let queue = QueueConfig::from_env();

        Ok(Self {
            database_path: raw.database_path.unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            temp_root: raw.temp_root.unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_ROOT)),
            volumes,
            scan_policy,
            scheduler_catchup: Duration::from_secs(raw.scheduler_catchup_secs.unwrap_or(DEFAULT_SCHEDULER_CATCHUP_SECS).max(0) as u64),
            fanout_success_policy: raw.fanout_success_policy.unwrap_or_default(),
            metrics_port: raw.metrics_port.unwrap_or(DEFAULT_METRICS_PORT),
            queue,
            cablecast,
            asr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_success_policy_defaults_to_any() {
        assert_eq!(FanoutSuccessPolicy::default(), FanoutSuccessPolicy::Any);
    }
}
