//! Node configuration

use crate::sync::SyncConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PUSH_INTERVAL_SECS: u64 = 10;

/// One decay period: a day without purchases
pub const DEFAULT_DECAY_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Returns the default catalog path: ~/.local/share/price_sync/items.json
pub fn default_catalog_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("price_sync")
        .join("items.json")
}

/// Everything the daemon loop needs to run one node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub catalog_path: PathBuf,
    /// Seed file imported into the catalog at startup
    pub baseline_path: Option<PathBuf>,
    /// Refresh seed prices from the statistics API before import
    pub fetch_baseline: bool,
    /// `None` runs the node without a peer
    pub sync: Option<SyncConfig>,
    pub push_interval: Duration,
    pub decay_interval: Duration,
    pub web_port: Option<u16>,
    pub stdin_scans: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            baseline_path: None,
            fetch_baseline: false,
            sync: None,
            push_interval: Duration::from_secs(DEFAULT_PUSH_INTERVAL_SECS),
            decay_interval: Duration::from_secs(DEFAULT_DECAY_INTERVAL_SECS),
            web_port: None,
            stdin_scans: false,
        }
    }
}

impl NodeConfig {
    /// Decay period as a chrono duration, for computing cutoffs
    pub fn decay_period(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.decay_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_DECAY_INTERVAL_SECS as i64))
    }
}
