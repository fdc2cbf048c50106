//! Configuration data structures for Pylon.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files.
//! They are serde-friendly and carry defaults so minimal configs stay small.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::adapters::file_manager::FileManagerConfig;

/// Top-level gateway configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Filter source discovery settings.
    pub filter_scan: FilterScanConfig,
    /// Default debug flags applied to every request context.
    pub debug: DebugConfig,
}

/// Where filter sources live and how often they are rescanned.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FilterScanConfig {
    /// Directories scanned for filter sources, typically one per stage
    /// (pre/route/post) plus optional custom kinds.
    pub directories: Vec<String>,
    /// Seconds between directory scans.
    pub poll_interval_secs: u64,
    /// Filename suffix a file must carry to be picked up.
    pub script_suffix: String,
}

impl Default for FilterScanConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            poll_interval_secs: 5,
            script_suffix: ".rhai".to_string(),
        }
    }
}

impl From<&FilterScanConfig> for FileManagerConfig {
    fn from(config: &FilterScanConfig) -> Self {
        Self {
            directories: config.directories.iter().map(PathBuf::from).collect(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            suffix: config.script_suffix.clone(),
        }
    }
}

/// Request-tracing opt-ins applied as per-request defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Record the routing-debug trail for every request.
    pub routing: bool,
    /// Record request debug information for every request.
    pub request: bool,
}
