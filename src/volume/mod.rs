//! Named volume provisioning, backup, restore and migration.
//!
//! Volumes are opaque to the host: every operation that reads or writes a
//! volume's contents runs inside a disposable utility container that mounts
//! it, through the shared [`CommandRunner`](crate::runner::CommandRunner).
//!
//! ## Architecture
//!
//! - [`manager`]: creation (single and all-or-nothing sets), listing,
//!   inspection, sizing, labeling and deletion
//! - [`backup`]: archive snapshots with metadata sidecars, restore into new or
//!   existing volumes, volume-to-volume and host-path migration, usage analysis
//!
//! ## Naming
//!
//! Volume names are `<prefix>_<type>_<suffix>`, e.g. `artifactory_data_v7_9_2`.
//! The suffix defaults to a `%Y%m%d%H%M%S` timestamp.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sapo::runner::HostRunner;
//! use sapo::volume::{VolumeCreateOptions, VolumeManager, VolumeType};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = VolumeManager::new(Arc::new(HostRunner::new()));
//!
//!     let name = manager
//!         .create_volume(VolumeType::Data, &VolumeCreateOptions::default().suffix("demo"))
//!         .await?;
//!     let archive = manager
//!         .backup_volume(&name, std::path::Path::new("/tmp/backups"), true)
//!         .await?;
//!     println!("{} -> {}", name, archive.display());
//!     Ok(())
//! }
//! ```

mod backup;
mod manager;

pub use backup::{BackupMetadata, RestoreOptions, UsageAnalysis, UsageEntry, UsageReport};
pub use manager::{
    VolumeCreateOptions, VolumeManager, VolumeManagerConfig, VolumeRow, VolumeSetOptions,
    default_size_hint,
};

use crate::runner::RunnerError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of data a volume holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VolumeType {
    /// Artifact storage
    #[serde(rename = "data")]
    Data,
    /// Application logs
    #[serde(rename = "logs")]
    Logs,
    /// Application-level backups
    #[serde(rename = "backup")]
    Backup,
    /// Relational database files
    #[serde(rename = "postgresql")]
    Database,
    /// Server configuration (`etc`)
    #[serde(rename = "etc")]
    ConfigEtc,
}

impl VolumeType {
    /// Creation order of a full volume set
    pub const ALL: [VolumeType; 5] = [
        VolumeType::Data,
        VolumeType::Logs,
        VolumeType::Backup,
        VolumeType::Database,
        VolumeType::ConfigEtc,
    ];

    /// Name segment used in volume names and the `volume-type` label
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeType::Data => "data",
            VolumeType::Logs => "logs",
            VolumeType::Backup => "backup",
            VolumeType::Database => "postgresql",
            VolumeType::ConfigEtc => "etc",
        }
    }

    /// Human-readable purpose recorded in the `purpose` label
    pub fn purpose(&self) -> &'static str {
        match self {
            VolumeType::Data => "Artifactory data storage",
            VolumeType::Logs => "Artifactory logs",
            VolumeType::Backup => "Artifactory backup storage",
            VolumeType::Database => "PostgreSQL database storage",
            VolumeType::ConfigEtc => "Artifactory configuration",
        }
    }

    /// Mount point inside the application (or database) container
    pub fn container_path(&self) -> String {
        use crate::env::stack::{APP_VAR_DIR, DB_DATA_DIR};
        match self {
            VolumeType::Data => format!("{}/data", APP_VAR_DIR),
            VolumeType::Logs => format!("{}/log", APP_VAR_DIR),
            VolumeType::Backup => format!("{}/backup", APP_VAR_DIR),
            VolumeType::Database => DB_DATA_DIR.to_string(),
            VolumeType::ConfigEtc => format!("{}/etc", APP_VAR_DIR),
        }
    }
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeType {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(VolumeType::Data),
            "logs" | "log" => Ok(VolumeType::Logs),
            "backup" => Ok(VolumeType::Backup),
            "postgresql" | "postgres" | "database" | "db" => Ok(VolumeType::Database),
            "etc" | "config" | "config-etc" => Ok(VolumeType::ConfigEtc),
            other => Err(VolumeError::InvalidVolumeType(other.to_string())),
        }
    }
}

/// Volume state as reported by `docker volume inspect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeInfo {
    pub name: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub options: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl VolumeInfo {
    /// Value of the `volume-type` label, if tagged by this tool
    pub fn volume_type(&self) -> Option<&str> {
        self.labels
            .get(crate::env::labels::VOLUME_TYPE)
            .map(String::as_str)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One line of `docker volume ls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
}

/// Approximate volume usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSize {
    pub bytes: u64,
    pub human: String,
}

impl VolumeSize {
    pub fn from_bytes(bytes: u64) -> Self {
        Self {
            bytes,
            human: format_size(bytes),
        }
    }
}

/// Format a byte count as `12.34 MB`
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size > 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Volume operation errors.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    /// The container runtime cannot be reached
    #[error("Docker is not available. Please install Docker and try again.")]
    DockerUnavailable,

    /// `docker volume create` failed
    #[error("Failed to create volume {name}: {source}")]
    VolumeCreateFailed {
        name: String,
        #[source]
        source: RunnerError,
    },

    /// A volume with the generated name already exists
    #[error("Volume {0} already exists; delete it explicitly or choose another suffix")]
    VolumeExists(String),

    /// One member of a volume set failed; created siblings were rolled back
    #[error("Failed to create volume set at {volume_type} volume: {source}")]
    VolumeSetFailed {
        volume_type: VolumeType,
        #[source]
        source: Box<VolumeError>,
    },

    /// Archive creation failed
    #[error("Backup of volume {volume} failed: {reason}")]
    BackupFailed { volume: String, reason: String },

    /// Archive extraction failed
    #[error("Restore into volume {volume} failed: {reason}")]
    RestoreFailed { volume: String, reason: String },

    /// Archive file does not exist
    #[error("Backup file not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// Restore without a target name or a type to create one
    #[error("Either a volume name or a volume type must be provided")]
    MissingTarget,

    /// Migration source directory does not exist
    #[error("Source path does not exist: {0}")]
    SourceNotFound(PathBuf),

    /// Unrecognized volume type string
    #[error("Unknown volume type: {0:?} (expected data, logs, backup, postgresql or etc)")]
    InvalidVolumeType(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Runner error outside the cases above
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;

/// Current local time as a volume/archive suffix
pub(crate) fn timestamp_suffix() -> String {
    chrono::Local::now()
        .format(crate::env::TIMESTAMP_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_type_round_trip() {
        for volume_type in VolumeType::ALL {
            assert_eq!(
                volume_type.as_str().parse::<VolumeType>().unwrap(),
                volume_type
            );
        }
        assert_eq!("database".parse::<VolumeType>().unwrap(), VolumeType::Database);
        assert_eq!("config".parse::<VolumeType>().unwrap(), VolumeType::ConfigEtc);
        assert!("all".parse::<VolumeType>().is_err());
    }

    #[test]
    fn test_volume_info_parses_null_labels() {
        let json = r#"[{"CreatedAt":"2024-01-01T00:00:00Z","Driver":"local","Labels":null,
            "Mountpoint":"/var/lib/docker/volumes/x/_data","Name":"x","Options":null,"Scope":"local"}]"#;
        let infos: Vec<VolumeInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(infos[0].name, "x");
        assert!(infos[0].labels.is_empty());
        assert_eq!(infos[0].volume_type(), None);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1024), "1024.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_container_paths() {
        assert_eq!(
            VolumeType::Data.container_path(),
            "/var/opt/jfrog/artifactory/data"
        );
        assert_eq!(
            VolumeType::Database.container_path(),
            "/var/lib/postgresql/data"
        );
    }
}
