//! Configuration for the NIFCLOUD exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// RDB environments to scrape.
    #[serde(default)]
    pub rdb: Vec<RdbEnv>,
}

/// One account/region pair and the instances scraped through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdbEnv {
    /// Environment name, exposed as the `env` label.
    pub name: String,

    /// NIFCLOUD region, e.g. `jp-east-1`.
    pub region: String,

    /// API access key for this environment.
    pub access_key_id: String,

    /// API secret key for this environment.
    pub secret_access_key: String,

    /// Database instances to scrape.
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// One database instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Instance identifier, exposed as the `db_instance` label.
    pub name: String,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// An empty `rdb` list is allowed; the exporter then serves only its
    /// own health metrics.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, env) in self.rdb.iter().enumerate() {
            if env.name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rdb[{i}]: name must not be empty"
                )));
            }
            // Duplicate names would make samples indistinguishable.
            if self.rdb[..i].iter().any(|other| other.name == env.name) {
                return Err(ConfigError::Validation(format!(
                    "rdb[{i}]: duplicate environment name: {}",
                    env.name
                )));
            }
            if env.region.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rdb[{i}]: region must not be empty"
                )));
            }
            if env.access_key_id.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rdb[{i}]: accessKeyId must not be empty"
                )));
            }
            if env.secret_access_key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "rdb[{i}]: secretAccessKey must not be empty"
                )));
            }
            for (j, instance) in env.instances.iter().enumerate() {
                if instance.name.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "rdb[{i}].instances[{j}]: name must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Total number of instances across all environments.
    pub fn instance_count(&self) -> usize {
        self.rdb.iter().map(|env| env.instances.len()).sum()
    }
}
