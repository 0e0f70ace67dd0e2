//! Per-user configuration file holding the address of the V2H unit.

use crate::error::{Result, V2hError};
use crate::protocol::ECHONET_PORT;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".v2h.config.json";
/// Written on first run; TEST-NET-1, so nothing is reachable until edited.
pub const PLACEHOLDER_CONFIG: &str = r#"{"ip":"192.0.2.0"}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Address of the V2H unit
    pub ip: Ipv4Addr,
    /// UDP port of the V2H unit
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    ECHONET_PORT
}

/// Outcome of [`Config::load_or_init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigState {
    Loaded(Config),
    /// No file existed; a placeholder was written at this path
    Created(PathBuf),
}

impl Config {
    /// `~/.v2h.config.json`, or the working directory if no home is known.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE_NAME)
    }

    /// Parse a config document.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| V2hError::Config(e.to_string()))
    }

    /// Load the config at `path`, or write the placeholder if it is missing.
    pub fn load_or_init(path: &Path) -> Result<ConfigState> {
        if !path.exists() {
            std::fs::write(path, PLACEHOLDER_CONFIG).map_err(|e| {
                V2hError::Config(format!("could not write {}: {}", path.display(), e))
            })?;
            info!("Created placeholder config at {}", path.display());
            return Ok(ConfigState::Created(path.to_path_buf()));
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)
            .map_err(|e| V2hError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(ConfigState::Loaded(config))
    }
}
