//! Volume snapshots, restore, migration and usage analysis.
//!
//! All of these mount the volume into a short-lived utility container. Only
//! restore and analysis need a shell inside that container; archive names
//! are quoted with `shell-escape` before they reach it.

use super::{
    Result, VolumeCreateOptions, VolumeError, VolumeInfo, VolumeManager, VolumeType,
    timestamp_suffix,
};
use crate::env::labels;
use crate::runner::RuntimeCommand;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sidecar written next to every archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Inspected state of the source volume
    pub volume: VolumeInfo,
    /// Archive file name
    pub archive: String,
    pub compressed: bool,
    pub created_at: DateTime<Local>,
    /// Tool version that wrote the archive
    pub tool_version: String,
}

impl BackupMetadata {
    /// Sidecar path for an archive: `<volume>_<timestamp>_metadata.json`
    /// beside `<volume>_<timestamp>.tar[.gz]`
    pub fn path_for(archive: &Path) -> PathBuf {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = [".tar.gz", ".tgz", ".tar"]
            .iter()
            .find_map(|ext| name.strip_suffix(ext))
            .unwrap_or(&name);
        archive.with_file_name(format!("{}_metadata.json", stem))
    }

    /// Load the sidecar of an archive
    pub async fn load(archive: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(Self::path_for(archive)).await?;
        serde_json::from_str(&content).map_err(|e| VolumeError::Io(e.into()))
    }
}

/// Where a restore should land
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Existing volume to overwrite
    pub volume_name: Option<String>,
    /// Type of a new volume to create when no name is given
    pub volume_type: Option<VolumeType>,
    /// Bind the new volume to this host directory
    pub host_path: Option<PathBuf>,
}

/// Disk usage of one top-level entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub name: String,
    pub size: String,
}

/// Usage report of a volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub volume: String,
    pub total_size: String,
    pub entries: Vec<UsageEntry>,
}

/// Result of [`VolumeManager::analyze_usage`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageAnalysis {
    Report(UsageReport),
    Failed { volume: String, error: String },
}

/// `.tar.gz` and `.tgz` archives are gzip-compressed
pub fn is_compressed_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".gz") || name.ends_with(".tgz")
}

/// Source volume recorded in an archive name: the text before the first `_`
fn restored_from(archive: &Path) -> String {
    archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn split_archive(archive: &Path) -> Result<(PathBuf, String)> {
    let absolute = std::path::absolute(archive)?;
    let file_name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| VolumeError::ArchiveNotFound(archive.to_path_buf()))?;
    let dir = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    Ok((dir, file_name))
}

impl VolumeManager {
    /// Snapshot a volume into `<dest_dir>/<volume>_<timestamp>.tar[.gz]`.
    ///
    /// A metadata sidecar is written next to the archive; failing to write it
    /// only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::DockerUnavailable`], or
    /// [`VolumeError::BackupFailed`] if the volume does not exist or the
    /// archive could not be produced. A missing volume is never mounted, so
    /// the runtime cannot create an empty one in its place.
    pub async fn backup_volume(
        &self,
        volume_name: &str,
        dest_dir: &Path,
        compress: bool,
    ) -> Result<PathBuf> {
        self.ensure_available().await?;

        let Some(volume) = self.inspect_volume(volume_name).await else {
            return Err(VolumeError::BackupFailed {
                volume: volume_name.to_string(),
                reason: "volume not found".to_string(),
            });
        };

        tokio::fs::create_dir_all(dest_dir).await?;
        let dest_dir = std::path::absolute(dest_dir)?;

        let extension = if compress { "tar.gz" } else { "tar" };
        let file_name = format!("{}_{}.{}", volume_name, timestamp_suffix(), extension);
        let archive = dest_dir.join(&file_name);
        let tar_flags = if compress { "-czf" } else { "-cf" };

        info!("Backing up volume {} to {}", volume_name, archive.display());

        let cmd = RuntimeCommand::docker([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/source:ro", volume_name),
            "-v".to_string(),
            format!("{}:/backup", dest_dir.display()),
            self.config.utility_image.clone(),
            "tar".to_string(),
            tar_flags.to_string(),
            format!("/backup/{}", file_name),
            "-C".to_string(),
            "/source".to_string(),
            ".".to_string(),
        ])
        .checked();

        self.runner
            .run(cmd)
            .await
            .map_err(|e| VolumeError::BackupFailed {
                volume: volume_name.to_string(),
                reason: e.to_string(),
            })?;

        let metadata = BackupMetadata {
            volume,
            archive: file_name,
            compressed: compress,
            created_at: Local::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        if let Err(e) = write_metadata(&archive, &metadata).await {
            warn!("Failed to write backup metadata: {}", e);
        }

        info!("Backup completed: {}", archive.display());
        Ok(archive)
    }

    /// Extract an archive into a volume, replacing its contents.
    ///
    /// With no target name, a new volume of the given type is created with
    /// suffix `restored_<timestamp>` and provenance labels. Compression is
    /// chosen from the archive's extension.
    ///
    /// # Errors
    ///
    /// [`VolumeError::ArchiveNotFound`] before anything runs,
    /// [`VolumeError::MissingTarget`] when neither name nor type is given,
    /// creation errors for the new volume, and [`VolumeError::RestoreFailed`]
    /// when extraction fails.
    pub async fn restore_volume(&self, archive: &Path, options: &RestoreOptions) -> Result<String> {
        if !archive.is_file() {
            return Err(VolumeError::ArchiveNotFound(archive.to_path_buf()));
        }
        if options.volume_name.is_none() && options.volume_type.is_none() {
            return Err(VolumeError::MissingTarget);
        }
        self.ensure_available().await?;

        let (archive_dir, file_name) = split_archive(archive)?;

        let target = match (&options.volume_name, options.volume_type) {
            (Some(name), _) => name.clone(),
            (None, Some(volume_type)) => {
                let timestamp = timestamp_suffix();
                let mut create = VolumeCreateOptions::default()
                    .suffix(format!("restored_{}", timestamp))
                    .display_name(format!("Restored {} ({})", volume_type, timestamp))
                    .label(labels::RESTORED_FROM, restored_from(archive))
                    .label(labels::RESTORED_AT, Local::now().to_rfc3339())
                    .label(labels::BACKUP_FILE, file_name.clone());
                create.host_path = options.host_path.clone();
                self.create_volume(volume_type, &create).await?
            }
            (None, None) => return Err(VolumeError::MissingTarget),
        };

        let tar_flags = if is_compressed_archive(archive) { "-xzf" } else { "-xf" };
        let escaped = shell_escape::escape(Cow::from(format!("/backup/{}", file_name)));
        let script = format!(
            "rm -rf /target/* /target/.[!.]* /target/..?* && tar {} {} -C /target",
            tar_flags, escaped
        );

        info!("Restoring {} into volume {}", archive.display(), target);

        let cmd = RuntimeCommand::docker([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/target", target),
            "-v".to_string(),
            format!("{}:/backup:ro", archive_dir.display()),
            self.config.utility_image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            script,
        ])
        .checked();

        self.runner
            .run(cmd)
            .await
            .map_err(|e| VolumeError::RestoreFailed {
                volume: target.clone(),
                reason: e.to_string(),
            })?;

        info!("Restore completed: {}", target);
        Ok(target)
    }

    /// Copy one volume into another through a temporary archive.
    ///
    /// The archive goes to `temp_dir` (a fresh temporary directory when
    /// `None`) and is removed afterwards.
    pub async fn migrate_data(
        &self,
        source_volume: &str,
        target_volume: &str,
        temp_dir: Option<&Path>,
    ) -> bool {
        let scratch;
        let temp_dir = match temp_dir {
            Some(dir) => dir.to_path_buf(),
            None => match tempfile::Builder::new().prefix("sapo-migrate-").tempdir() {
                Ok(dir) => {
                    scratch = dir;
                    scratch.path().to_path_buf()
                }
                Err(e) => {
                    warn!("Failed to create temporary directory: {}", e);
                    return false;
                }
            },
        };

        let archive = match self.backup_volume(source_volume, &temp_dir, true).await {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Migration of {} failed during backup: {}", source_volume, e);
                return false;
            }
        };

        let options = RestoreOptions {
            volume_name: Some(target_volume.to_string()),
            ..Default::default()
        };
        let restored = self.restore_volume(&archive, &options).await;

        for path in [BackupMetadata::path_for(&archive), archive] {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }

        match restored {
            Ok(_) => {
                info!("Migrated {} to {}", source_volume, target_volume);
                true
            }
            Err(e) => {
                warn!("Migration of {} failed during restore: {}", source_volume, e);
                false
            }
        }
    }

    /// Copy a host directory into a volume, preserving attributes.
    pub async fn migrate_from_host_path(
        &self,
        source_path: &Path,
        target_volume: &str,
        volume_type: VolumeType,
    ) -> bool {
        if !self.is_docker_available().await {
            return false;
        }
        if !source_path.is_dir() {
            warn!("{}", VolumeError::SourceNotFound(source_path.to_path_buf()));
            return false;
        }
        let source = match std::path::absolute(source_path) {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot resolve {}: {}", source_path.display(), e);
                return false;
            }
        };

        info!(
            "Importing {} data from {} into {}",
            volume_type,
            source.display(),
            target_volume
        );

        let cmd = RuntimeCommand::docker([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/source:ro", source.display()),
            "-v".to_string(),
            format!("{}:/target", target_volume),
            self.config.utility_image.clone(),
            "cp".to_string(),
            "-a".to_string(),
            "/source/.".to_string(),
            "/target/".to_string(),
        ])
        .checked();

        if let Err(e) = self.runner.run(cmd).await {
            warn!("Import into {} failed: {}", target_volume, e);
            return false;
        }

        self.add_migration_labels(target_volume, &source).await;
        info!("Imported {} into {}", source.display(), target_volume);
        true
    }

    /// Tag a volume with where its data came from. Runtimes without
    /// `volume label` support reject this; the import still stands.
    async fn add_migration_labels(&self, volume: &str, source: &Path) {
        let provenance = [
            (labels::MIGRATED_FROM, source.display().to_string()),
            (labels::MIGRATED_AT, Local::now().to_rfc3339()),
        ];

        for (key, value) in provenance {
            let cmd = RuntimeCommand::docker([
                "volume".to_string(),
                "label".to_string(),
                "add".to_string(),
                volume.to_string(),
                format!("{}={}", key, value),
            ]);
            match self.runner.run(cmd).await {
                Ok(output) if output.success() => debug!("Labeled {} with {}", volume, key),
                Ok(output) => debug!(
                    "Runtime declined label {} on {}: {}",
                    key,
                    volume,
                    output.stderr.trim()
                ),
                Err(e) => warn!("Could not label {} with {}: {}", volume, key, e),
            }
        }
    }

    /// Per-entry disk usage of a volume's top level.
    pub async fn analyze_usage(&self, volume_name: &str) -> UsageAnalysis {
        let failed = |error: String| UsageAnalysis::Failed {
            volume: volume_name.to_string(),
            error,
        };

        if self.inspect_volume(volume_name).await.is_none() {
            return failed(format!("Volume {} not found", volume_name));
        }

        let cmd = RuntimeCommand::docker([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/volume:ro", volume_name),
            self.config.utility_image.clone(),
            "sh".to_string(),
            "-c".to_string(),
            "du -sh /volume/* /volume/.[!.]* 2>/dev/null || true".to_string(),
        ])
        .checked();

        let output = match self.runner.run(cmd).await {
            Ok(output) => output,
            Err(e) => return failed(e.to_string()),
        };

        let total_size = self
            .volume_size(volume_name)
            .await
            .map(|size| size.human)
            .unwrap_or_else(|| "Unknown".to_string());

        UsageAnalysis::Report(UsageReport {
            volume: volume_name.to_string(),
            total_size,
            entries: parse_du_entries(&output.stdout),
        })
    }
}

async fn write_metadata(archive: &Path, metadata: &BackupMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata).map_err(std::io::Error::from)?;
    tokio::fs::write(BackupMetadata::path_for(archive), json).await?;
    Ok(())
}

fn parse_du_entries(stdout: &str) -> Vec<UsageEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let (size, path) = line.split_once(char::is_whitespace)?;
            let name = Path::new(path.trim()).file_name()?.to_string_lossy().to_string();
            Some(UsageEntry {
                name,
                size: size.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::scripted::{Reply, ScriptedRunner};
    use std::sync::Arc;
    use tempfile::TempDir;

    const INSPECT: &str = r#"[{"Name":"artifactory_data_t1","Driver":"local",
        "Mountpoint":"/var/lib/docker/volumes/artifactory_data_t1/_data",
        "Labels":{"com.jfrog.artifactory.volume-type":"data"},"Options":null}]"#;

    fn manager(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, VolumeManager) {
        let runner = Arc::new(runner);
        let manager = VolumeManager::new(runner.clone());
        (runner, manager)
    }

    #[test]
    fn test_compression_by_suffix() {
        assert!(is_compressed_archive(Path::new("/b/artifactory_data_1.tar.gz")));
        assert!(is_compressed_archive(Path::new("/b/x.TGZ")));
        assert!(!is_compressed_archive(Path::new("/b/artifactory_data_1.tar")));
    }

    #[test]
    fn test_restored_from_takes_first_segment() {
        assert_eq!(
            restored_from(Path::new("/b/artifactory_data_20240101.tar.gz")),
            "artifactory"
        );
    }

    #[tokio::test]
    async fn test_backup_compressed_writes_sidecar() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::ok(INSPECT)),
        );

        let archive = manager
            .backup_volume("artifactory_data_t1", temp.path(), true)
            .await
            .unwrap();

        let name = archive.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("artifactory_data_t1_"));
        assert!(name.ends_with(".tar.gz"));

        let run = &runner.calls_matching(&["docker", "run"])[0];
        assert!(run.contains(&"artifactory_data_t1:/source:ro".to_string()));
        assert!(run.contains(&"-czf".to_string()));
        assert!(run.contains(&format!("/backup/{}", name)));

        let metadata = BackupMetadata::load(&archive).await.unwrap();
        assert_eq!(metadata.volume.name, "artifactory_data_t1");
        assert!(metadata.compressed);
        assert_eq!(metadata.archive, name);

        let sidecar = BackupMetadata::path_for(&archive);
        let sidecar_name = sidecar.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(sidecar_name, name.replace(".tar.gz", "_metadata.json"));
        assert!(sidecar.is_file());
    }

    #[tokio::test]
    async fn test_backup_plain_tar() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::ok(INSPECT)),
        );

        let archive = manager
            .backup_volume("artifactory_logs_t1", &temp.path().join("out"), false)
            .await
            .unwrap();
        assert!(archive.to_string_lossy().ends_with(".tar"));
        assert!(temp.path().join("out").is_dir());
        assert!(runner.calls_matching(&["docker", "run"])[0].contains(&"-cf".to_string()));
    }

    #[tokio::test]
    async fn test_backup_failure() {
        let temp = TempDir::new().unwrap();
        let (_, manager) = manager(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::ok(INSPECT))
                .on(&["docker", "run"], Reply::fail(1, "tar: write error")),
        );

        let result = manager.backup_volume("artifactory_data_t1", temp.path(), true).await;
        assert!(matches!(
            result,
            Err(VolumeError::BackupFailed { volume, reason })
                if volume == "artifactory_data_t1" && reason.contains("write error")
        ));
    }

    #[tokio::test]
    async fn test_backup_of_unknown_volume_mounts_nothing() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(
            ScriptedRunner::new().on(
                &["docker", "volume", "inspect"],
                Reply::fail(1, "Error: No such volume: artifactory_dta_t1"),
            ),
        );

        let result = manager.backup_volume("artifactory_dta_t1", temp.path(), true).await;
        assert!(matches!(
            result,
            Err(VolumeError::BackupFailed { volume, reason })
                if volume == "artifactory_dta_t1" && reason == "volume not found"
        ));
        assert!(runner.calls_matching(&["docker", "run"]).is_empty());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_restore_missing_archive_runs_nothing() {
        let (runner, manager) = manager(ScriptedRunner::new());

        let options = RestoreOptions {
            volume_type: Some(VolumeType::Data),
            ..Default::default()
        };
        let result = manager
            .restore_volume(Path::new("/definitely/missing.tar.gz"), &options)
            .await;
        assert!(matches!(result, Err(VolumeError::ArchiveNotFound(_))));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_requires_target() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("artifactory_data_1.tar");
        std::fs::write(&archive, b"").unwrap();
        let (_, manager) = manager(ScriptedRunner::new());

        let result = manager.restore_volume(&archive, &RestoreOptions::default()).await;
        assert!(matches!(result, Err(VolumeError::MissingTarget)));
    }

    #[tokio::test]
    async fn test_restore_into_new_volume() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("artifactory_data_20240101.tar.gz");
        std::fs::write(&archive, b"").unwrap();
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "")),
        );

        let options = RestoreOptions {
            volume_type: Some(VolumeType::Data),
            ..Default::default()
        };
        let name = manager.restore_volume(&archive, &options).await.unwrap();
        assert!(name.starts_with("artifactory_data_restored_"));

        let create = runner.calls_matching(&["docker", "volume", "create"])[0].join(" ");
        assert!(create.contains(&format!("{}=artifactory", labels::RESTORED_FROM)));
        assert!(create.contains(&format!(
            "{}=artifactory_data_20240101.tar.gz",
            labels::BACKUP_FILE
        )));

        let run = &runner.calls_matching(&["docker", "run"])[0];
        let script = run.last().unwrap();
        assert!(script.starts_with("rm -rf /target/*"));
        assert!(script.contains("tar -xzf /backup/artifactory_data_20240101.tar.gz -C /target"));
    }

    #[tokio::test]
    async fn test_restore_escapes_archive_name() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("data; rm -rf x.tar");
        std::fs::write(&archive, b"").unwrap();
        let (runner, manager) = manager(ScriptedRunner::new());

        let options = RestoreOptions {
            volume_name: Some("artifactory_data_t1".to_string()),
            ..Default::default()
        };
        manager.restore_volume(&archive, &options).await.unwrap();

        let script = runner.calls_matching(&["docker", "run"])[0]
            .last()
            .unwrap()
            .clone();
        assert!(script.contains("tar -xf '/backup/data; rm -rf x.tar'"));
        assert!(runner.calls_matching(&["docker", "volume", "create"]).is_empty());
    }

    #[tokio::test]
    async fn test_restore_failure() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.tar");
        std::fs::write(&archive, b"").unwrap();
        let (_, manager) = manager(
            ScriptedRunner::new().on(&["docker", "run"], Reply::fail(2, "tar: invalid magic")),
        );

        let options = RestoreOptions {
            volume_name: Some("target".to_string()),
            ..Default::default()
        };
        let err = manager.restore_volume(&archive, &options).await.unwrap_err();
        assert!(matches!(err, VolumeError::RestoreFailed { ref volume, .. } if volume == "target"));
        assert!(err.to_string().contains("invalid magic"));
    }

    #[tokio::test]
    async fn test_migrate_data_cleans_up_archive() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::ok(INSPECT)),
        );

        // scripted tar writes nothing, so the restore half finds no archive
        assert!(
            !manager
                .migrate_data("artifactory_data_t1", "artifactory_data_t2", Some(temp.path()))
                .await
        );
        assert_eq!(runner.calls_matching(&["docker", "run"]).len(), 1);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_migrate_from_host_path() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(ScriptedRunner::new());

        assert!(
            manager
                .migrate_from_host_path(temp.path(), "artifactory_data_t1", VolumeType::Data)
                .await
        );
        let run = &runner.calls_matching(&["docker", "run"])[0];
        assert!(run.contains(&"artifactory_data_t1:/target".to_string()));
        assert!(run.ends_with(&["cp".to_string(), "-a".to_string(), "/source/.".to_string(), "/target/".to_string()]));

        let label_calls = runner.calls_matching(&["docker", "volume", "label", "add"]);
        assert_eq!(label_calls.len(), 2);
        assert_eq!(label_calls[0][4], "artifactory_data_t1");
        let source = std::path::absolute(temp.path()).unwrap();
        assert_eq!(
            label_calls[0][5],
            format!("{}={}", labels::MIGRATED_FROM, source.display())
        );
        assert!(label_calls[1][5].starts_with(&format!("{}=", labels::MIGRATED_AT)));

        assert!(
            !manager
                .migrate_from_host_path(&temp.path().join("missing"), "v", VolumeType::Data)
                .await
        );
    }

    #[tokio::test]
    async fn test_migrate_from_host_path_survives_label_rejection() {
        let temp = TempDir::new().unwrap();
        let (runner, manager) = manager(ScriptedRunner::new().on(
            &["docker", "volume", "label"],
            Reply::fail(125, "unknown command \"label\" for \"docker volume\""),
        ));

        assert!(
            manager
                .migrate_from_host_path(temp.path(), "artifactory_logs_t1", VolumeType::Logs)
                .await
        );
        assert_eq!(runner.calls_matching(&["docker", "volume", "label"]).len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_usage() {
        let (_, manager) = manager(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::ok(INSPECT))
                .on_arg(&["docker", "run"], "du -sh", Reply::ok("1.2G\t/volume/filestore\n4.0K\t/volume/.lock\n"))
                .on(&["docker", "run"], Reply::ok("1258291\t/volume\n")),
        );

        match manager.analyze_usage("artifactory_data_t1").await {
            UsageAnalysis::Report(report) => {
                assert_eq!(report.entries.len(), 2);
                assert_eq!(report.entries[0].name, "filestore");
                assert_eq!(report.entries[0].size, "1.2G");
                assert_eq!(report.total_size, "1.20 GB");
            }
            other => panic!("expected report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_usage_missing_volume() {
        let (_, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "")),
        );
        assert!(matches!(
            manager.analyze_usage("missing").await,
            UsageAnalysis::Failed { .. }
        ));
    }
}
