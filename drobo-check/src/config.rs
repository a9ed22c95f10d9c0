//! Check configuration with file and CLI layering
//!
//! Precedence: command-line flags > optional TOML file > built-in defaults.
//! The config file lives in the OS config directory and only carries
//! connection tuning; the target host is always given on the command line.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::protocol::STATUS_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// TCP port of the status service.
    pub port: u16,
    /// Connect deadline in seconds.
    pub connect_timeout_secs: u64,
    /// Deadline for the whole frame read in seconds.
    pub read_timeout_secs: u64,
    /// Extra attempts after a transport failure. Zero keeps the
    /// single-attempt behavior.
    pub retries: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            port: STATUS_PORT,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            retries: 0,
        }
    }
}

impl CheckConfig {
    /// Loads the config file if one exists, otherwise the defaults. An
    /// explicitly requested file must exist.
    pub async fn load(path_override: Option<&Path>) -> Result<Self> {
        let path = match path_override {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let config = toml::from_str(&content)?;
            debug!("loaded config from {}", path.display());
            Ok(config)
        } else if path_override.is_some() {
            anyhow::bail!("config file {} does not exist", path.display())
        } else {
            Ok(Self::default())
        }
    }

    /// OS-specific config file location.
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not find config directory"))?;
        path.push("drobo-check");
        path.push("config.toml");
        Ok(path)
    }
}
