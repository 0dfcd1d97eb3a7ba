//! Application configuration
//!
//! Every field has a default, so a config file only needs the values it wants
//! to change. Command line flags are applied on top in `main`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::simulation::SimulationConfig;
use crate::sync::SyncConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Pacing of the live loop
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Simulation ticks per second
    pub tick_rate: f32,
    /// How often the status line is logged
    pub status_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            status_interval_ms: 5000,
        }
    }
}

impl RuntimeConfig {
    /// Seconds of simulated time per tick
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1.0)
    }

    /// Wall-clock period of the tick timer, never shorter than 1 ms
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(self.tick_delta()).max(MIN_TICK_INTERVAL)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(100))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub sync: SyncConfig,
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }
}
