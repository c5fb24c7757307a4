//! Configuration loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

/// Default batch size for row extraction and insertion.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

fn default_mysql_port() -> u16 {
    3306
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_connections() -> usize {
    4
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MySQL server hosting both source and target databases.
    pub server: ServerConfig,

    /// Transfer behavior configuration.
    #[serde(default)]
    pub transfer: TransferSettings,
}

/// MySQL server connection configuration.
///
/// Databases on this server are selected by name at job submission time;
/// the server config carries no database of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

/// Transfer behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Rows per batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum connections per pool (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(TransferError::Config("server.host is required".into()));
        }
        if self.server.user.is_empty() {
            return Err(TransferError::Config("server.user is required".into()));
        }
        if self.transfer.batch_size == 0 {
            return Err(TransferError::Config(
                "transfer.batch_size must be at least 1".into(),
            ));
        }
        if self.transfer.max_connections == 0 {
            return Err(TransferError::Config(
                "transfer.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
