//! Deployment of an Artifactory + PostgreSQL stack.
//!
//! ## Architecture
//!
//! - [`config`]: validated deployment parameters owning their secrets
//! - [`credentials`]: per-configuration password and join-key generation
//! - [`templates`]: `.env`, compose manifest and `system.yaml` rendering
//! - [`files`]: directory layout and safe writing of the rendered files
//! - [`lifecycle`]: cleanup, startup (compose or direct) and health polling
//! - [`install`]: the end-to-end flow tying the above to volume provisioning
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sapo::deploy::{DeploymentConfig, InstallOptions, Installer};
//! use sapo::fsutil::AssumeYes;
//! use sapo::runner::HostRunner;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeploymentConfig::builder("7.111.4").port(8082).build()?;
//!     let installer = Installer::new(Arc::new(HostRunner::new()), Arc::new(AssumeYes));
//!
//!     let options = InstallOptions {
//!         start: true,
//!         ..Default::default()
//!     };
//!     let report = installer.install(&config, &options).await?;
//!     if let Some(url) = report.started.and_then(|s| s.access_url()) {
//!         println!("Artifactory is up at {}", url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod files;
pub mod install;
pub mod lifecycle;
pub mod templates;

pub use config::{ConfigError, DatabaseType, DeploymentConfig, DeploymentConfigBuilder};
pub use credentials::CredentialStore;
pub use files::{FileGenerationError, FileGenerator, FileType, GenerationReport};
pub use install::{InstallError, InstallMode, InstallOptions, InstallReport, Installer};
pub use lifecycle::{
    ContainerLifecycleManager, ContainerStatus, DirectStackSpec, HealthPollConfig,
    LifecycleConfig, LifecycleError, MIN_HEALTH_POLL_ATTEMPTS, StackStatus, StartOutcome,
};
pub use templates::TemplateContext;
