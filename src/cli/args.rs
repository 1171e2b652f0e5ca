//! Command line argument parsing
//!
//! Subcommands:
//! - `install`: generate deployment files and optionally start the stack
//! - `volume`: list, create, delete, backup, restore, migrate, import, analyze, inspect
//! - `status`: show application and database container status
//! - `clean`: remove the stack's containers and network
//! - `show-config`: show configuration discovery information
//! - `init-config`: write the default user configuration file

use super::config::SapoConfig;
use crate::deploy::{
    ConfigError, DatabaseType, DeploymentConfig, HealthPollConfig, InstallMode, InstallOptions,
};
use crate::env;
use crate::volume::VolumeType;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "sapo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploys and maintains a containerized JFrog Artifactory with PostgreSQL")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
    /// Answer yes to every confirmation
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate deployment files and optionally start Artifactory
    Install(InstallArgs),
    /// Manage Docker volumes
    Volume {
        #[command(subcommand)]
        command: VolumeCommands,
    },
    /// Show application and database container status
    Status {
        /// Directory holding the generated compose files
        #[arg(short = 'o', long = "output-dir")]
        output_dir: Option<PathBuf>,
    },
    /// Remove Artifactory containers and network
    Clean {
        /// Directory holding the generated compose files
        #[arg(short = 'o', long = "output-dir")]
        output_dir: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write the default configuration to ~/.sapo/config.toml
    InitConfig,
}

#[derive(Debug, Clone, clap::Args)]
pub struct InstallArgs {
    /// Artifactory version
    #[arg(long = "version")]
    pub version: Option<String>,
    /// External HTTP port
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Data directory
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,
    /// Where to write .env and docker-compose.yml (default: <data-dir>/docker)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// How to start containers
    #[arg(long = "mode", value_enum, default_value_t = InstallMode::Compose)]
    pub mode: InstallMode,
    /// Use the embedded Derby database instead of PostgreSQL
    #[arg(long = "derby")]
    pub derby: bool,
    /// Join key to use instead of generating one
    #[arg(long = "join-key")]
    pub join_key: Option<String>,
    /// Start containers after generating files
    #[arg(long = "start")]
    pub start: bool,
    /// Store data in named Docker volumes instead of bind mounts
    #[arg(long = "named-volumes")]
    pub named_volumes: bool,
    /// Volume driver for named volumes
    #[arg(long = "volume-driver")]
    pub volume_driver: Option<String>,
    /// Size hint for a volume type, e.g. data=100G (repeatable)
    #[arg(long = "volume-size", value_name = "TYPE=SIZE", value_parser = parse_volume_size)]
    pub volume_size: Vec<(VolumeType, String)>,
    /// Bind a volume type to a host directory, e.g. data=/mnt/af (repeatable)
    #[arg(long = "host-path", value_name = "TYPE=PATH", value_parser = parse_host_path)]
    pub host_path: Vec<(VolumeType, PathBuf)>,
    /// Echo compose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Seconds to wait for healthy containers
    #[arg(long = "health-timeout")]
    pub health_timeout: Option<u64>,
    /// Seconds between health checks
    #[arg(long = "health-interval")]
    pub health_interval: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum VolumeCommands {
    /// List managed volumes with size and type
    List,
    /// Create a single volume
    Create {
        /// Volume type (data, logs, backup, postgresql, etc)
        #[arg(short = 't', long = "type", value_parser = parse_volume_type)]
        volume_type: VolumeType,
        /// Name suffix (default: timestamp)
        #[arg(short = 's', long = "suffix")]
        suffix: Option<String>,
        #[arg(long = "driver")]
        driver: Option<String>,
        /// Bind the volume to a host directory
        #[arg(long = "host-path")]
        host_path: Option<PathBuf>,
        /// Extra label (repeatable)
        #[arg(short = 'l', long = "label", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,
    },
    /// Delete a volume
    Delete {
        name: String,
        /// Remove even if in use
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
    /// Archive a volume's contents
    Backup {
        name: String,
        /// Directory receiving the archive
        #[arg(short = 'o', long = "output-dir", default_value = ".")]
        output_dir: PathBuf,
        /// Write a plain .tar instead of .tar.gz
        #[arg(long = "no-compress")]
        no_compress: bool,
    },
    /// Restore an archive into a new or existing volume
    Restore {
        archive: PathBuf,
        /// Existing volume to overwrite
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        /// Type of the new volume when no name is given
        #[arg(short = 't', long = "type", value_parser = parse_volume_type)]
        volume_type: Option<VolumeType>,
        #[arg(long = "host-path")]
        host_path: Option<PathBuf>,
    },
    /// Copy one volume's contents into another
    Migrate {
        source: String,
        target: String,
        /// Keep the intermediate archive in this directory
        #[arg(long = "backup-dir")]
        backup_dir: Option<PathBuf>,
    },
    /// Copy a host directory into a volume
    Import {
        host_path: PathBuf,
        target: String,
        /// Type label recorded for the import
        #[arg(short = 't', long = "type", value_parser = parse_volume_type)]
        volume_type: VolumeType,
    },
    /// Show disk usage of a volume's top-level entries
    Analyze { name: String },
    /// Show a volume's details and labels
    Inspect { name: String },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }
}

impl InstallArgs {
    /// Deployment config from flags, falling back to `defaults`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the combined values do not validate.
    pub fn deployment_config(&self, defaults: &SapoConfig) -> Result<DeploymentConfig, ConfigError> {
        let version = self.version.clone().unwrap_or_else(|| defaults.version.clone());
        let mut builder = DeploymentConfig::builder(version)
            .port(self.port.unwrap_or(defaults.port))
            .registry(defaults.registry.clone())
            .db_image(defaults.db_image.clone());

        if let Some(dir) = self.data_dir.clone().or_else(|| defaults.data_dir.clone()) {
            builder = builder.data_dir(dir);
        }
        if let Some(dir) = &self.output_dir {
            builder = builder.output_dir(dir.clone());
        }
        if self.derby {
            builder = builder.database_type(DatabaseType::Derby);
        }
        if let Some(key) = &self.join_key {
            builder = builder.join_key(key.clone());
        }
        builder.build()
    }

    /// Install options from flags, falling back to `defaults`
    pub fn install_options(&self, defaults: &SapoConfig, interactive: bool) -> InstallOptions {
        let file_health = defaults.health_poll_config();
        let health = HealthPollConfig {
            interval: self
                .health_interval
                .map(|s| Duration::from_secs(s.max(1)))
                .unwrap_or(file_health.interval),
            timeout: self
                .health_timeout
                .map(Duration::from_secs)
                .unwrap_or(file_health.timeout),
            ..file_health
        };

        InstallOptions {
            mode: self.mode,
            interactive,
            start: self.start,
            named_volumes: self.named_volumes,
            volume_driver: self
                .volume_driver
                .clone()
                .or_else(|| defaults.volume_driver.clone()),
            volume_sizes: self.volume_size.iter().cloned().collect::<HashMap<_, _>>(),
            host_paths: self.host_path.iter().cloned().collect::<HashMap<_, _>>(),
            volume_config: defaults.volume_manager_config(),
            health,
            verbose: self.verbose,
            ..Default::default()
        }
    }
}

/// Output directory for commands that operate on an existing deployment
pub fn resolve_output_dir(explicit: Option<&Path>, defaults: &SapoConfig) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    let data_dir = match &defaults.data_dir {
        Some(dir) => dir.clone(),
        None => env::default_data_dir(&env::home_dir()?),
    };
    Some(env::default_output_dir(&data_dir))
}

fn parse_volume_type(s: &str) -> Result<VolumeType, String> {
    s.parse().map_err(|e: crate::volume::VolumeError| e.to_string())
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = split_pair(s)?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_volume_size(s: &str) -> Result<(VolumeType, String), String> {
    let (key, value) = split_pair(s)?;
    Ok((parse_volume_type(key)?, value.to_string()))
}

fn parse_host_path(s: &str) -> Result<(VolumeType, PathBuf), String> {
    let (key, value) = split_pair(s)?;
    Ok((parse_volume_type(key)?, PathBuf::from(value)))
}
