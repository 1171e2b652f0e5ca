//! # sapo
//!
//! Deploys a JFrog Artifactory server with a PostgreSQL database as Docker
//! containers, and maintains the named volumes that hold its state.
//!
//! ## Architecture Overview
//!
//! - **[`runner`]**: the single boundary through which every container runtime
//!   command is executed, with an allow-list and executable resolution
//! - **[`volume`]**: named volume provisioning, labeling, sizing, backup,
//!   restore and migration
//! - **[`deploy`]**: deployment configuration, credentials, file generation,
//!   container lifecycle and the install flow
//! - **[`fsutil`]**: safe file writes, directory layout and operator prompts
//! - **[`cli`]**: argument parsing and configuration discovery
//!
//! ## Features
//!
//! ### 📦 Volumes
//! - **All-or-nothing sets**: a failed volume rolls back the ones created before it
//! - **Labels**: type, purpose, version and provenance recorded on every volume
//! - **Backups**: `.tar`/`.tar.gz` archives with a JSON metadata sidecar
//!
//! ### 🚀 Deployment
//! - **Generated files**: `.env`, `docker-compose.yml` and `system.yaml`
//! - **Two start modes**: `docker compose` or individual containers
//! - **Health polling**: bounded, with a minimum number of checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sapo::deploy::{DeploymentConfig, FileGenerator};
//! use sapo::fsutil::WriteMode;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DeploymentConfig::builder("7.111.4").build()?;
//!     let report = FileGenerator::new(&config).generate_all(WriteMode::NonInteractive)?;
//!     for result in report.files.values() {
//!         println!("{}", result);
//!     }
//!     println!("Join key: {}", config.generate_join_key());
//!     Ok(())
//! }
//! ```

/// Container runtime command execution.
///
/// Every component that shells out goes through [`runner::CommandRunner`].
pub mod runner;

/// Named volume management.
pub mod volume;

/// Deployment configuration, file generation and container lifecycle.
pub mod deploy;

/// File system helpers shared by file generation and the CLI.
pub mod fsutil;

/// Environment constants and path utilities.
///
/// Centralizes container names, label keys and default paths used throughout
/// the application.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use deploy::{
    ContainerLifecycleManager, ContainerStatus, DeploymentConfig, FileGenerator, InstallMode,
    InstallOptions, Installer,
};
pub use runner::{CommandRunner, HostRunner, RunnerError, RuntimeCommand};
pub use volume::{VolumeError, VolumeInfo, VolumeManager, VolumeType};
