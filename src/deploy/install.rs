//! End-to-end installation: volumes, files, then optional startup.

use super::config::DeploymentConfig;
use super::files::{FileGenerationError, FileGenerator, GenerationReport};
use super::lifecycle::{
    ContainerLifecycleManager, DATABASE_GRACE_DELAY, DirectStackSpec, HealthPollConfig,
    LifecycleConfig, LifecycleError, StartOutcome,
};
use super::templates;
use crate::fsutil::{FileOperationResult, Prompter, WriteMode};
use crate::runner::CommandRunner;
use crate::volume::{
    VolumeError, VolumeManager, VolumeManagerConfig, VolumeSetOptions, VolumeType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How containers are brought up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// `docker compose up -d` on the generated manifest
    #[default]
    Compose,
    /// Individual `docker create`/`docker start`, database first
    Direct,
}

/// Installation switches
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub mode: InstallMode,
    /// Ask before destructive steps; otherwise assume the defaults
    pub interactive: bool,
    /// Start containers after generating files
    pub start: bool,
    /// Provision a named volume set instead of bind mounts
    pub named_volumes: bool,
    pub volume_driver: Option<String>,
    pub volume_sizes: HashMap<VolumeType, String>,
    pub host_paths: HashMap<VolumeType, PathBuf>,
    pub volume_config: VolumeManagerConfig,
    pub health: HealthPollConfig,
    /// Direct mode delay between database and application start
    pub database_grace: Duration,
    pub verbose: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            mode: InstallMode::default(),
            interactive: false,
            start: false,
            named_volumes: false,
            volume_driver: None,
            volume_sizes: HashMap::new(),
            host_paths: HashMap::new(),
            volume_config: VolumeManagerConfig::default(),
            health: HealthPollConfig::default(),
            database_grace: DATABASE_GRACE_DELAY,
            verbose: false,
        }
    }
}

/// What an installation produced
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub volumes: Option<BTreeMap<VolumeType, String>>,
    pub files: GenerationReport,
    pub started: Option<StartOutcome>,
}

/// Installation errors.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Installation cancelled")]
    Cancelled,

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Files(#[from] FileGenerationError),

    /// Some files could not be written; nothing was started
    #[error("{} file(s) could not be written", .0.len())]
    FilesIncomplete(Vec<FileOperationResult>),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Runs an installation against a container runtime
pub struct Installer {
    runner: Arc<dyn CommandRunner>,
    prompter: Arc<dyn Prompter>,
}

impl Installer {
    pub fn new(runner: Arc<dyn CommandRunner>, prompter: Arc<dyn Prompter>) -> Self {
        Self { runner, prompter }
    }

    fn confirm(&self, options: &InstallOptions, question: &str, default: bool) -> bool {
        if options.interactive {
            self.prompter.confirm(question, default)
        } else {
            default
        }
    }

    /// Install `config`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Cancelled`] when the operator declines, volume
    /// and file errors as they occur, [`InstallError::FilesIncomplete`] when a
    /// file could not be written, and lifecycle errors from startup.
    pub async fn install(
        &self,
        config: &DeploymentConfig,
        options: &InstallOptions,
    ) -> Result<InstallReport, InstallError> {
        let question = format!(
            "Install Artifactory {} into {}?",
            config.version,
            config.data_dir.display()
        );
        if !self.confirm(options, &question, true) {
            return Err(InstallError::Cancelled);
        }

        let volumes = if options.named_volumes {
            self.provision_volumes(config, options).await?
        } else {
            None
        };

        let mut generator = FileGenerator::new(config);
        if let Some(volumes) = &volumes {
            generator = generator.with_volumes(volumes);
        }
        let mode = if options.interactive {
            WriteMode::Interactive(self.prompter.as_ref())
        } else {
            WriteMode::NonInteractive
        };

        let files = generator.generate_all(mode)?;
        let failures = files.failures();
        if !failures.is_empty() {
            return Err(InstallError::FilesIncomplete(
                failures.into_iter().cloned().collect(),
            ));
        }

        let started = if options.start {
            let mut lifecycle_config = LifecycleConfig::for_deployment(config);
            lifecycle_config.health = options.health;
            lifecycle_config.verbose = options.verbose;
            lifecycle_config.database_grace = options.database_grace;
            let lifecycle = ContainerLifecycleManager::new(self.runner.clone(), lifecycle_config);

            if self.confirm(options, "Remove existing Artifactory containers first?", true)
                && !lifecycle.clean_environment().await
            {
                warn!("Cleanup did not complete; continuing with startup");
            }

            let outcome = match options.mode {
                InstallMode::Compose => lifecycle.start_containers().await?,
                InstallMode::Direct => {
                    let manifest = templates::compose_manifest(&generator.context());
                    let spec = DirectStackSpec::from_manifest(&manifest)?;
                    lifecycle.start_direct(&spec, true).await?
                }
            };
            Some(outcome)
        } else {
            None
        };

        info!("Installation of Artifactory {} complete", config.version);
        Ok(InstallReport {
            volumes,
            files,
            started,
        })
    }

    async fn provision_volumes(
        &self,
        config: &DeploymentConfig,
        options: &InstallOptions,
    ) -> Result<Option<BTreeMap<VolumeType, String>>, InstallError> {
        let manager = VolumeManager::with_config(self.runner.clone(), options.volume_config.clone());
        let set_options = VolumeSetOptions {
            suffix: Some(config.version_suffix()),
            driver: options.volume_driver.clone(),
            sizes: options.volume_sizes.clone(),
            host_paths: options.host_paths.clone(),
            version: Some(config.version.clone()),
            ..Default::default()
        };

        match manager.create_volume_set(&set_options).await {
            Ok(volumes) => Ok(Some(volumes)),
            Err(e) => {
                let question = format!("{}. Continue with bind mounts instead?", e);
                if options.interactive && self.prompter.confirm(&question, false) {
                    warn!("Falling back to bind mounts");
                    Ok(None)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::AssumeYes;
    use crate::runner::scripted::{Reply, ScriptedRunner};
    use tempfile::TempDir;

    struct Decline;

    impl Prompter for Decline {
        fn confirm(&self, _question: &str, _default: bool) -> bool {
            false
        }
    }

    const HEALTHY: &str = r#"[{"State":{"Status":"running","Health":{"Status":"healthy"}}}]"#;

    fn config(temp: &TempDir) -> DeploymentConfig {
        DeploymentConfig::builder("7.9.2")
            .data_dir(temp.path().join("data"))
            .build()
            .unwrap()
    }

    fn fast_health() -> HealthPollConfig {
        HealthPollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
            min_attempts: 3,
        }
    }

    #[tokio::test]
    async fn test_install_generates_files_without_starting() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let installer = Installer::new(runner.clone(), Arc::new(AssumeYes));

        let report = installer
            .install(&config(&temp), &InstallOptions::default())
            .await
            .unwrap();

        assert!(report.files.all_succeeded());
        assert!(report.volumes.is_none());
        assert!(report.started.is_none());
        assert!(runner.calls().is_empty());
        assert!(temp.path().join("data/docker/docker-compose.yml").is_file());
    }

    #[tokio::test]
    async fn test_install_declined() {
        let temp = TempDir::new().unwrap();
        let installer = Installer::new(Arc::new(ScriptedRunner::new()), Arc::new(Decline));
        let options = InstallOptions {
            interactive: true,
            ..Default::default()
        };

        let result = installer.install(&config(&temp), &options).await;
        assert!(matches!(result, Err(InstallError::Cancelled)));
        assert!(!temp.path().join("data").exists());
    }

    #[tokio::test]
    async fn test_install_named_volumes_and_start() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::fail(1, ""))
                .on(&["docker", "inspect"], Reply::ok(HEALTHY))
                .on(&["docker", "compose", "port"], Reply::ok("0.0.0.0:8082")),
        );
        let installer = Installer::new(runner.clone(), Arc::new(AssumeYes));
        let options = InstallOptions {
            start: true,
            named_volumes: true,
            health: fast_health(),
            ..Default::default()
        };

        let report = installer.install(&config(&temp), &options).await.unwrap();

        let volumes = report.volumes.unwrap();
        assert_eq!(volumes[&VolumeType::Data], "artifactory_data_v7_9_2");
        assert_eq!(report.started.unwrap().host_port, Some(8082));
        assert_eq!(runner.calls_matching(&["docker", "compose", "up"]).len(), 1);
        assert_eq!(runner.calls_matching(&["docker", "rm", "-f"]).len(), 2);
    }

    #[tokio::test]
    async fn test_install_volume_failure_non_interactive() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::fail(1, ""))
                .on(&["docker", "volume", "create"], Reply::fail(1, "permission denied")),
        );
        let installer = Installer::new(runner.clone(), Arc::new(AssumeYes));
        let options = InstallOptions {
            named_volumes: true,
            ..Default::default()
        };

        let result = installer.install(&config(&temp), &options).await;
        assert!(matches!(
            result,
            Err(InstallError::Volume(VolumeError::VolumeSetFailed {
                volume_type: VolumeType::Data,
                ..
            }))
        ));
        assert!(!temp.path().join("data/docker").exists());
    }

    #[tokio::test]
    async fn test_install_direct_mode() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new()
                .on(&["docker", "inspect"], Reply::ok(HEALTHY))
                .on(&["docker", "port"], Reply::ok("0.0.0.0:8082")),
        );
        let installer = Installer::new(runner.clone(), Arc::new(AssumeYes));
        let options = InstallOptions {
            mode: InstallMode::Direct,
            start: true,
            health: fast_health(),
            database_grace: Duration::ZERO,
            ..Default::default()
        };

        let report = installer.install(&config(&temp), &options).await.unwrap();
        assert!(report.started.is_some());
        assert!(runner.calls_matching(&["docker", "compose", "up"]).is_empty());
        assert_eq!(runner.calls_matching(&["docker", "create"]).len(), 2);
    }
}
