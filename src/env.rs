//! Environment constants and path utilities for sapo.
//!
//! This module centralizes the container, network, label and file names shared
//! by the volume, file generation and lifecycle layers, so a renamed container
//! or label only has to change in one place.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const SAPO_DIR_NAME: &str = ".sapo";

/// Configuration file name inside [`SAPO_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "sapo.toml";

/// Container, network and image names used by the deployed stack
pub mod stack {
    /// Application container name
    pub const APP_CONTAINER: &str = "artifactory";

    /// Database container name
    pub const DB_CONTAINER: &str = "artifactory-postgres";

    /// Compose service name of the application
    pub const APP_SERVICE: &str = "artifactory";

    /// Compose service name of the database
    pub const DB_SERVICE: &str = "postgres";

    /// Bridge network shared by both containers
    pub const NETWORK: &str = "artifactory_network";

    /// Port the application listens on inside its container
    pub const APP_INTERNAL_PORT: u16 = 8082;

    /// Port the database listens on inside its container
    pub const DB_INTERNAL_PORT: u16 = 5432;

    /// Default image registry
    pub const DEFAULT_REGISTRY: &str = "releases-docker.jfrog.io";

    /// Default database image
    pub const DEFAULT_DB_IMAGE: &str = "postgres:15-alpine";

    /// Minimal image used for tar/cp/du utility containers
    pub const DEFAULT_UTILITY_IMAGE: &str = "alpine";

    /// Home of the application's data inside its container
    pub const APP_VAR_DIR: &str = "/var/opt/jfrog/artifactory";

    /// Data directory of the database inside its container
    pub const DB_DATA_DIR: &str = "/var/lib/postgresql/data";

    /// uid:gid of the application user inside its container
    pub const APP_OWNER: &str = "1030:1030";
}

/// Generated file names
pub mod files {
    /// Environment file consumed by compose
    pub const ENV_FILE: &str = ".env";

    /// Compose manifest
    pub const COMPOSE_FILE: &str = "docker-compose.yml";

    /// Server system configuration
    pub const SYSTEM_YAML: &str = "system.yaml";

    /// Subdirectory of the data directory holding `system.yaml`
    pub const ETC_DIR_NAME: &str = "etc";

    /// Default output subdirectory of the data directory
    pub const OUTPUT_DIR_NAME: &str = "docker";
}

/// Volume label keys
pub mod labels {
    pub const PREFIX: &str = "com.jfrog.artifactory";
    pub const MANAGED_BY: &str = "com.jfrog.artifactory.managed-by";
    pub const CREATED_AT: &str = "com.jfrog.artifactory.created-at";
    pub const VOLUME_TYPE: &str = "com.jfrog.artifactory.volume-type";
    pub const PURPOSE: &str = "com.jfrog.artifactory.purpose";
    pub const DISPLAY_NAME: &str = "com.jfrog.artifactory.display-name";
    pub const VERSION: &str = "com.jfrog.artifactory.version";
    pub const INSTALL_TIMESTAMP: &str = "com.jfrog.artifactory.install-timestamp";
    pub const RESTORED_FROM: &str = "com.jfrog.artifactory.restored-from";
    pub const RESTORED_AT: &str = "com.jfrog.artifactory.restored-at";
    pub const BACKUP_FILE: &str = "com.jfrog.artifactory.backup-file";
    pub const MIGRATED_FROM: &str = "com.jfrog.artifactory.migrated-from";
    pub const MIGRATED_AT: &str = "com.jfrog.artifactory.migrated-at";

    /// Value of [`MANAGED_BY`] on every volume this tool creates
    pub const MANAGED_BY_VALUE: &str = "sapo";
}

/// Default volume name prefix
pub const DEFAULT_VOLUME_PREFIX: &str = "artifactory";

/// Timestamp format used in volume name suffixes and archive names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Default data directory: `~/.jfrog/artifactory`
pub fn default_data_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".jfrog").join("artifactory")
}

/// Default output directory for a data directory: `<data_dir>/docker`
pub fn default_output_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(files::OUTPUT_DIR_NAME)
}

/// Authoritative `system.yaml` location: `<data_dir>/etc/system.yaml`
pub fn system_yaml_path(data_dir: &Path) -> PathBuf {
    data_dir.join(files::ETC_DIR_NAME).join(files::SYSTEM_YAML)
}

/// Compose manifest location inside an output directory
pub fn compose_file_path(output_dir: &Path) -> PathBuf {
    output_dir.join(files::COMPOSE_FILE)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(SAPO_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(SAPO_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Home directory from `HOME`/`USERPROFILE`
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}
