//! Writes the deployment's generated files to disk.
//!
//! `system.yaml` is written to `<data_dir>/etc/system.yaml`, the location the
//! container mounts, with a reference copy in the output directory. `.env` and
//! the compose manifest go to the output directory.

use super::config::DeploymentConfig;
use super::templates::{self, TemplateContext};
use crate::env::{self, files};
use crate::fsutil::{
    self, FileOperationResult, OperationStatus, Platform, WriteMode, safe_write_file,
};
use crate::volume::VolumeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Generated file kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Env,
    DockerCompose,
    SystemYaml,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Env => f.write_str(files::ENV_FILE),
            FileType::DockerCompose => f.write_str(files::COMPOSE_FILE),
            FileType::SystemYaml => f.write_str(files::SYSTEM_YAML),
        }
    }
}

/// File generation errors raised before any file is written
#[derive(Debug, thiserror::Error)]
pub enum FileGenerationError {
    /// Directory preparation failed
    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template rendering failed
    #[error("Failed to render {file}: {source}")]
    Render {
        file: FileType,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Per-file outcome of [`FileGenerator::generate_all`]
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub files: BTreeMap<FileType, FileOperationResult>,
    /// Extra results: reference copies, permission guidance
    pub notes: Vec<FileOperationResult>,
}

impl GenerationReport {
    pub fn all_succeeded(&self) -> bool {
        self.files.values().all(FileOperationResult::is_success)
    }

    /// Results with [`OperationStatus::Error`]
    pub fn failures(&self) -> Vec<&FileOperationResult> {
        self.files
            .values()
            .filter(|r| r.status == OperationStatus::Error)
            .collect()
    }
}

/// Renders and writes the deployment files for one config
pub struct FileGenerator<'a> {
    config: &'a DeploymentConfig,
    volumes: Option<&'a BTreeMap<VolumeType, String>>,
}

impl<'a> FileGenerator<'a> {
    /// Generator for bind-mount deployments
    pub fn new(config: &'a DeploymentConfig) -> Self {
        Self {
            config,
            volumes: None,
        }
    }

    /// Use named volumes instead of bind mounts
    pub fn with_volumes(mut self, volumes: &'a BTreeMap<VolumeType, String>) -> Self {
        self.volumes = Some(volumes);
        self
    }

    pub fn uses_named_volumes(&self) -> bool {
        self.volumes.is_some()
    }

    /// Template context for this generator
    pub fn context(&self) -> TemplateContext {
        TemplateContext::new(self.config, self.volumes)
    }

    /// Create the output directory and the host tree the mounts need.
    ///
    /// # Errors
    ///
    /// Returns [`FileGenerationError::Io`] naming the directory that failed.
    pub fn create_directories(&self) -> Result<Vec<PathBuf>, FileGenerationError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| FileGenerationError::Io { path, source }
        };

        let output_dir = self.config.output_dir();
        std::fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;
        let mut created = vec![output_dir.to_path_buf()];

        let data_dir = self.config.data_dir.as_path();
        if self.uses_named_volumes() {
            let etc = data_dir.join(files::ETC_DIR_NAME);
            std::fs::create_dir_all(&etc).map_err(io_err(&etc))?;
            created.push(etc);
        } else {
            created.extend(fsutil::create_artifactory_structure(data_dir).map_err(io_err(data_dir))?);
            if self.config.use_postgres() {
                created.push(fsutil::create_postgres_structure(data_dir).map_err(io_err(data_dir))?);
            }
        }

        debug!("Prepared {} directories", created.len());
        Ok(created)
    }

    /// Write `system.yaml` to its authoritative location and a reference copy.
    ///
    /// A directory at the target path (left behind by a container mounting a
    /// missing file) is removed first. A failed reference copy only warns.
    pub fn generate_system_yaml(
        &self,
        content: &str,
        mode: WriteMode<'_>,
    ) -> (FileOperationResult, Option<FileOperationResult>) {
        let target = env::system_yaml_path(&self.config.data_dir);

        if target.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&target) {
                return (
                    FileOperationResult::new(
                        OperationStatus::Error,
                        &target,
                        format!("a directory occupies this path and could not be removed: {}", e),
                    ),
                    None,
                );
            }
            warn!("Replaced directory at {} with a file", target.display());
        }

        let main = safe_write_file(&target, content, mode);
        if !main.is_success() {
            return (main, None);
        }

        let reference_path = self.config.output_dir().join(files::SYSTEM_YAML);
        let reference = safe_write_file(&reference_path, content, mode);
        let reference = if reference.is_success() {
            FileOperationResult::new(OperationStatus::Success, reference_path, "reference copy")
        } else {
            warn!("Reference copy of system.yaml not written: {}", reference.message);
            FileOperationResult::new(OperationStatus::Warning, reference_path, reference.message)
        };

        (main, Some(reference))
    }

    /// Render and write every file.
    ///
    /// Individual write failures are reported per file; the call itself only
    /// fails when directories cannot be prepared or a template cannot render.
    ///
    /// # Errors
    ///
    /// Returns [`FileGenerationError`] as described above.
    pub fn generate_all(&self, mode: WriteMode<'_>) -> Result<GenerationReport, FileGenerationError> {
        self.create_directories()?;

        let ctx = self.context();
        let env_content = templates::render_env(&ctx);
        let compose = templates::render_compose(&ctx).map_err(|source| FileGenerationError::Render {
            file: FileType::DockerCompose,
            source,
        })?;
        let system_yaml =
            templates::render_system_yaml(&ctx).map_err(|source| FileGenerationError::Render {
                file: FileType::SystemYaml,
                source,
            })?;

        let mut report = GenerationReport::default();
        let output_dir = self.config.output_dir();

        report.files.insert(
            FileType::Env,
            safe_write_file(&output_dir.join(files::ENV_FILE), &env_content, mode),
        );
        report.files.insert(
            FileType::DockerCompose,
            safe_write_file(&env::compose_file_path(output_dir), &compose, mode),
        );

        let (system, reference) = self.generate_system_yaml(&system_yaml, mode);
        report.files.insert(FileType::SystemYaml, system);
        report.notes.extend(reference);

        if let Some(guidance) = self.permission_guidance(ctx.platform) {
            report.notes.push(guidance);
        }

        for (file, result) in &report.files {
            if result.is_success() {
                info!("Generated {}: {}", file, result.path.display());
            } else {
                warn!("{} not generated: {}", file, result.message);
            }
        }

        Ok(report)
    }

    /// Ownership guidance for bind mounts; nothing is changed automatically.
    pub fn permission_guidance(&self, platform: Platform) -> Option<FileOperationResult> {
        if self.uses_named_volumes() {
            return None;
        }
        let steps = fsutil::permission_instructions(platform, &self.config.data_dir);
        Some(FileOperationResult::new(
            OperationStatus::Skipped,
            &self.config.data_dir,
            format!("set ownership manually:\n  {}", steps.join("\n  ")),
        ))
    }
}
