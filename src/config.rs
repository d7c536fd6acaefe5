//! Runtime configuration for the utility organ and daemon

use crate::clock::ClockMode;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/rcp_utils.sock";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilsConfig {
    /// Unix socket the daemon listens on
    pub socket_path: PathBuf,
    /// Clock mode of the organ's time source
    pub clock_mode: ClockMode,
    /// Fixed generator seed; wall-clock seconds when unset
    pub seed: Option<u64>,
}

impl Default for UtilsConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            clock_mode: ClockMode::Live,
            seed: None,
        }
    }
}

impl UtilsConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
