//! Bridge configuration loading and parsing

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Main bridge configuration (loaded from bridge.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub can: CanConfig,
    #[serde(default)]
    pub wifi: WifiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Listen address for the snapshot server
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanConfig {
    /// Bus speed in bit/s
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,
    /// Optional decode-table override file (TOML)
    #[serde(default)]
    pub decode_table: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WifiConfig {
    /// Association status polls before giving up on a credential set
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Spacing between association polls in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Consecutive disassociated polls before falling back to provisioning
    #[serde(default = "default_link_loss_threshold")]
    pub link_loss_threshold: u32,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_bit_rate() -> u32 {
    j1939_decoder::DEFAULT_BIT_RATE
}

fn default_max_attempts() -> u32 {
    20
}

fn default_retry_interval_ms() -> u64 {
    1000
}

fn default_link_loss_threshold() -> u32 {
    5
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            bit_rate: default_bit_rate(),
            decode_table: None,
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_interval_ms: default_retry_interval_ms(),
            link_loss_threshold: default_link_loss_threshold(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {path:?}"))?;
        Ok(config)
    }

    /// Load the given file, or fall back to defaults when none is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                log::info!("no config file given, using defaults");
                Ok(Self::default())
            }
        }
    }
}
