//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./sapo.toml or ./.sapo/config.toml
//! 2. User config: ~/.sapo/config.toml
//! 3. System config: /etc/sapo/config.toml
//! 4. Built-in defaults
//!
//! Command line flags override whatever the active file sets.

use crate::deploy::HealthPollConfig;
use crate::deploy::lifecycle::{DEFAULT_HEALTH_INTERVAL, DEFAULT_HEALTH_TIMEOUT};
use crate::env::{self, stack};
use crate::volume::VolumeManagerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors loading or saving the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

/// Defaults applied to every command, overridable per invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SapoConfig {
    /// Artifactory version installed when `--version` is omitted
    pub version: String,
    pub port: u16,
    /// Data directory; `~/.jfrog/artifactory` when unset
    pub data_dir: Option<PathBuf>,
    pub volume_driver: Option<String>,
    pub volume_prefix: String,
    pub registry: String,
    pub utility_image: String,
    pub db_image: String,
    pub health_interval_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for SapoConfig {
    fn default() -> Self {
        Self {
            version: "7.111.4".to_string(),
            port: stack::APP_INTERNAL_PORT,
            data_dir: None,
            volume_driver: None,
            volume_prefix: env::DEFAULT_VOLUME_PREFIX.to_string(),
            registry: stack::DEFAULT_REGISTRY.to_string(),
            utility_image: stack::DEFAULT_UTILITY_IMAGE.to_string(),
            db_image: stack::DEFAULT_DB_IMAGE.to_string(),
            health_interval_secs: DEFAULT_HEALTH_INTERVAL.as_secs(),
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT.as_secs(),
        }
    }
}

impl SapoConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Volume manager settings derived from this config
    pub fn volume_manager_config(&self) -> VolumeManagerConfig {
        VolumeManagerConfig {
            volume_prefix: self.volume_prefix.clone(),
            utility_image: self.utility_image.clone(),
        }
    }

    /// Health polling settings derived from this config
    pub fn health_poll_config(&self) -> HealthPollConfig {
        HealthPollConfig {
            interval: Duration::from_secs(self.health_interval_secs.max(1)),
            timeout: Duration::from_secs(self.health_timeout_secs),
            ..Default::default()
        }
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `override_path` when given, otherwise discover through the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError`] when the selected file cannot be read or parsed.
    pub fn load(override_path: Option<&Path>) -> Result<SapoConfig, ConfigFileError> {
        if let Some(path) = override_path {
            info!("Loading configuration override from: {:?}", path);
            return SapoConfig::from_toml_file(path);
        }
        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<SapoConfig, ConfigFileError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return SapoConfig::from_toml_file(config_path);
        }

        debug!("No configuration file found, using defaults");
        Ok(SapoConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(&Self::config_candidates())
    }

    fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                return Some(candidate.clone());
            }
        }
        None
    }

    /// Configuration file candidates in priority order
    fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std::env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = env::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/sapo/config.toml"));

        #[cfg(windows)]
        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            candidates.push(PathBuf::from(program_data).join("sapo").join("config.toml"));
        }

        candidates
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf, ConfigFileError> {
        let home_dir = env::home_dir().ok_or(ConfigFileError::NoHomeDirectory)?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf, ConfigFileError> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigFileError::Io {
                path: config_dir.clone(),
                source,
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            SapoConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::first_existing(&candidates) {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
