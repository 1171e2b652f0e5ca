//! Volume creation, listing, inspection and deletion.

use super::{
    Result, VolumeError, VolumeInfo, VolumeSize, VolumeSummary, VolumeType, timestamp_suffix,
};
use crate::env::{self, labels, stack};
use crate::runner::{CommandRunner, RuntimeCommand};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Volume manager configuration.
#[derive(Debug, Clone)]
pub struct VolumeManagerConfig {
    /// First segment of every volume name
    pub volume_prefix: String,
    /// Image used for tar, cp and du utility containers
    pub utility_image: String,
}

impl Default for VolumeManagerConfig {
    fn default() -> Self {
        Self {
            volume_prefix: env::DEFAULT_VOLUME_PREFIX.to_string(),
            utility_image: stack::DEFAULT_UTILITY_IMAGE.to_string(),
        }
    }
}

/// Options for a single volume.
#[derive(Debug, Clone, Default)]
pub struct VolumeCreateOptions {
    /// Name suffix; defaults to a timestamp
    pub suffix: Option<String>,
    /// Volume driver; `local` when a host path is given
    pub driver: Option<String>,
    /// Driver options (`--opt key=value`)
    pub driver_opts: BTreeMap<String, String>,
    /// Extra labels; cannot replace the type or purpose labels
    pub labels: BTreeMap<String, String>,
    /// Bind the volume to this host directory
    pub host_path: Option<PathBuf>,
    /// Value of the display-name label
    pub display_name: Option<String>,
}

impl VolumeCreateOptions {
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn driver_opt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.driver_opts.insert(key.into(), value.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn host_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_path = Some(path.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Options for a full volume set.
#[derive(Debug, Clone, Default)]
pub struct VolumeSetOptions {
    /// Suffix shared by every member, e.g. `v7_9_2`
    pub suffix: Option<String>,
    /// Driver for every member
    pub driver: Option<String>,
    /// Size hints per type; only honored for non-local drivers
    pub sizes: HashMap<VolumeType, String>,
    /// Host directories per type
    pub host_paths: HashMap<VolumeType, PathBuf>,
    /// Application version recorded in labels
    pub version: Option<String>,
    /// Extra labels for every member
    pub labels: BTreeMap<String, String>,
}

/// Default size hint per volume type
pub fn default_size_hint(volume_type: VolumeType) -> &'static str {
    match volume_type {
        VolumeType::Data => "50G",
        VolumeType::Logs => "10G",
        VolumeType::Backup => "20G",
        VolumeType::Database => "20G",
        VolumeType::ConfigEtc => "1G",
    }
}

/// One row of the volume table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRow {
    pub name: String,
    pub volume_type: String,
    pub driver: String,
    pub size: String,
    pub mountpoint: String,
}

/// Manages named volumes through the container runtime CLI.
pub struct VolumeManager {
    pub(super) runner: Arc<dyn CommandRunner>,
    pub(super) config: VolumeManagerConfig,
}

impl VolumeManager {
    /// Create a manager with default configuration.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_config(runner, VolumeManagerConfig::default())
    }

    /// Create a manager with custom configuration.
    pub fn with_config(runner: Arc<dyn CommandRunner>, config: VolumeManagerConfig) -> Self {
        Self { runner, config }
    }

    /// Get configuration
    pub fn config(&self) -> &VolumeManagerConfig {
        &self.config
    }

    /// Name for a volume of `volume_type` with `suffix`
    pub fn volume_name(&self, volume_type: VolumeType, suffix: &str) -> String {
        format!("{}_{}_{}", self.config.volume_prefix, volume_type, suffix)
    }

    /// Whether the runtime answers `docker --version`
    pub async fn is_docker_available(&self) -> bool {
        match self
            .runner
            .run(RuntimeCommand::docker(["--version"]).checked())
            .await
        {
            Ok(output) => {
                debug!("Docker available: {}", output.stdout_trimmed());
                true
            }
            Err(e) => {
                warn!("Docker not available: {}", e);
                false
            }
        }
    }

    pub(super) async fn ensure_available(&self) -> Result<()> {
        if self.is_docker_available().await {
            Ok(())
        } else {
            Err(VolumeError::DockerUnavailable)
        }
    }

    /// Create a named volume.
    ///
    /// A host path binds the volume to that directory (created if missing)
    /// with the local driver. The type and purpose labels are always set.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::DockerUnavailable`] when the runtime cannot be
    /// reached, [`VolumeError::VolumeExists`] if the name is taken, and
    /// [`VolumeError::VolumeCreateFailed`] when the runtime rejects the request.
    pub async fn create_volume(
        &self,
        volume_type: VolumeType,
        options: &VolumeCreateOptions,
    ) -> Result<String> {
        self.ensure_available().await?;

        let suffix = options.suffix.clone().unwrap_or_else(timestamp_suffix);
        let name = self.volume_name(volume_type, &suffix);

        if self.inspect_volume(&name).await.is_some() {
            return Err(VolumeError::VolumeExists(name));
        }

        let mut driver = options.driver.clone();
        let mut driver_opts = options.driver_opts.clone();

        if let Some(host_path) = &options.host_path {
            tokio::fs::create_dir_all(host_path).await?;
            let device = std::path::absolute(host_path)?;
            driver_opts.insert("type".to_string(), "none".to_string());
            driver_opts.insert("o".to_string(), "bind".to_string());
            driver_opts.insert("device".to_string(), device.display().to_string());

            match driver.as_deref() {
                None => driver = Some("local".to_string()),
                Some("local") => {}
                Some(other) => warn!(
                    "Driver {} with a host path; bind options are only understood by the local driver",
                    other
                ),
            }
        }

        let mut args = vec!["volume".to_string(), "create".to_string()];
        if let Some(driver) = driver {
            args.push("--driver".to_string());
            args.push(driver);
        }
        for (key, value) in &driver_opts {
            args.push("--opt".to_string());
            args.push(format!("{}={}", key, value));
        }
        for (key, value) in self.labels_for(volume_type, options) {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(name.clone());

        debug!("Creating volume: {}", name);
        self.runner
            .run(RuntimeCommand::docker(args).checked())
            .await
            .map_err(|source| VolumeError::VolumeCreateFailed {
                name: name.clone(),
                source,
            })?;

        info!("Created volume: {}", name);
        Ok(name)
    }

    fn labels_for(
        &self,
        volume_type: VolumeType,
        options: &VolumeCreateOptions,
    ) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        result.insert(
            labels::MANAGED_BY.to_string(),
            labels::MANAGED_BY_VALUE.to_string(),
        );
        result.insert(
            labels::CREATED_AT.to_string(),
            chrono::Local::now().to_rfc3339(),
        );
        if let Some(display_name) = &options.display_name {
            result.insert(labels::DISPLAY_NAME.to_string(), display_name.clone());
        }
        result.extend(options.labels.clone());
        result.insert(
            labels::VOLUME_TYPE.to_string(),
            volume_type.as_str().to_string(),
        );
        result.insert(
            labels::PURPOSE.to_string(),
            volume_type.purpose().to_string(),
        );
        result
    }

    /// Create one volume of every [`VolumeType`], all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::VolumeSetFailed`] naming the type that failed,
    /// after deleting every volume this call created. Volumes that existed
    /// before the call are never touched.
    pub async fn create_volume_set(
        &self,
        options: &VolumeSetOptions,
    ) -> Result<BTreeMap<VolumeType, String>> {
        self.ensure_available().await?;

        let suffix = options.suffix.clone().unwrap_or_else(timestamp_suffix);
        let install_timestamp = timestamp_suffix();
        let sized_driver = options
            .driver
            .as_deref()
            .is_some_and(|driver| driver != "local");

        let mut created = BTreeMap::new();

        for volume_type in VolumeType::ALL {
            let mut volume_options = VolumeCreateOptions {
                suffix: Some(suffix.clone()),
                driver: options.driver.clone(),
                labels: options.labels.clone(),
                host_path: options.host_paths.get(&volume_type).cloned(),
                ..Default::default()
            };
            volume_options
                .labels
                .insert(labels::INSTALL_TIMESTAMP.to_string(), install_timestamp.clone());

            match &options.version {
                Some(version) => {
                    volume_options
                        .labels
                        .insert(labels::VERSION.to_string(), version.clone());
                    volume_options.display_name =
                        Some(format!("Artifactory {} ({})", volume_type, version));
                }
                None => {
                    volume_options.display_name = Some(format!("Artifactory {}", volume_type));
                }
            }

            if sized_driver {
                let size = options
                    .sizes
                    .get(&volume_type)
                    .map(String::as_str)
                    .unwrap_or_else(|| default_size_hint(volume_type));
                volume_options
                    .driver_opts
                    .insert("size".to_string(), size.to_string());
            }

            match self.create_volume(volume_type, &volume_options).await {
                Ok(name) => {
                    created.insert(volume_type, name);
                }
                Err(e) => {
                    warn!(
                        "Failed to create {} volume, rolling back {} volume(s)",
                        volume_type,
                        created.len()
                    );
                    for name in created.values() {
                        if !self.delete_volume(name, true).await {
                            warn!("Rollback could not delete volume {}", name);
                        }
                    }
                    return Err(VolumeError::VolumeSetFailed {
                        volume_type,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("Created volume set with suffix {}", suffix);
        Ok(created)
    }

    /// List volumes whose name starts with the configured prefix.
    ///
    /// Tolerant: an unreachable runtime or a failed listing yields an empty
    /// list, and malformed lines are skipped.
    pub async fn list_volumes(&self) -> Vec<VolumeSummary> {
        if !self.is_docker_available().await {
            return Vec::new();
        }

        let cmd = RuntimeCommand::docker([
            "volume".to_string(),
            "ls".to_string(),
            "--filter".to_string(),
            format!("name={}", self.config.volume_prefix),
            "--format".to_string(),
            "{{.Name}},{{.Driver}},{{.Mountpoint}}".to_string(),
        ])
        .checked();

        let output = match self.runner.run(cmd).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to list volumes: {}", e);
                return Vec::new();
            }
        };

        parse_volume_list(&output.stdout, &self.config.volume_prefix)
    }

    /// Inspect a volume; `None` if it does not exist or cannot be read.
    pub async fn inspect_volume(&self, name: &str) -> Option<VolumeInfo> {
        let output = match self
            .runner
            .run(RuntimeCommand::docker(["volume", "inspect", name]))
            .await
        {
            Ok(output) if output.success() => output,
            Ok(_) => return None,
            Err(e) => {
                debug!("Inspect of {} failed: {}", name, e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<VolumeInfo>>(&output.stdout) {
            Ok(infos) => infos.into_iter().next(),
            Err(e) => {
                debug!("Unparseable inspect output for {}: {}", name, e);
                None
            }
        }
    }

    /// Labels of a volume; empty if it does not exist
    pub async fn volume_labels(&self, name: &str) -> HashMap<String, String> {
        self.inspect_volume(name)
            .await
            .map(|info| info.labels)
            .unwrap_or_default()
    }

    /// Approximate used bytes, measured inside a utility container.
    pub async fn volume_size(&self, name: &str) -> Option<VolumeSize> {
        self.inspect_volume(name).await?;

        let cmd = RuntimeCommand::docker([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/volume:ro", name),
            self.config.utility_image.clone(),
            "du".to_string(),
            "-sk".to_string(),
            "/volume".to_string(),
        ])
        .checked();

        match self.runner.run(cmd).await {
            Ok(output) => parse_du_kilobytes(&output.stdout).map(VolumeSize::from_bytes),
            Err(e) => {
                warn!("Failed to measure volume {}: {}", name, e);
                None
            }
        }
    }

    /// Delete a volume. Returns whether the runtime removed it.
    pub async fn delete_volume(&self, name: &str, force: bool) -> bool {
        let mut args = vec!["volume", "rm"];
        if force {
            args.push("-f");
        }
        args.push(name);

        match self.runner.run(RuntimeCommand::docker(args).checked()).await {
            Ok(_) => {
                info!("Deleted volume: {}", name);
                true
            }
            Err(e) => {
                warn!("Failed to delete volume {}: {}", name, e);
                false
            }
        }
    }

    /// Rows for the volume table, one per listed volume.
    pub async fn volume_rows(&self) -> Vec<VolumeRow> {
        let mut rows = Vec::new();
        for summary in self.list_volumes().await {
            let info = self.inspect_volume(&summary.name).await;
            let volume_type = info
                .as_ref()
                .and_then(|info| info.volume_type())
                .unwrap_or("unknown")
                .to_string();
            let size = self
                .volume_size(&summary.name)
                .await
                .map(|size| size.human)
                .unwrap_or_else(|| "Unknown".to_string());
            rows.push(VolumeRow {
                name: summary.name,
                volume_type,
                driver: summary.driver,
                size,
                mountpoint: summary.mountpoint,
            });
        }
        rows
    }
}

fn parse_volume_list(stdout: &str, prefix: &str) -> Vec<VolumeSummary> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(3, ',');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(driver), Some(mountpoint)) if !name.is_empty() => {
                    Some(VolumeSummary {
                        name: name.to_string(),
                        driver: driver.to_string(),
                        mountpoint: mountpoint.to_string(),
                    })
                }
                _ => None,
            }
        })
        .filter(|summary| summary.name.starts_with(prefix))
        .collect()
}

fn parse_du_kilobytes(stdout: &str) -> Option<u64> {
    stdout
        .split_whitespace()
        .next()?
        .parse::<u64>()
        .ok()
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::scripted::{Reply, ScriptedRunner};

    const INSPECT_DATA: &str = r#"[{"Name":"artifactory_data_t1","Driver":"local",
        "Mountpoint":"/var/lib/docker/volumes/artifactory_data_t1/_data",
        "Labels":{"com.jfrog.artifactory.volume-type":"data"},"Options":{}}]"#;

    fn manager(runner: ScriptedRunner) -> (Arc<ScriptedRunner>, VolumeManager) {
        let runner = Arc::new(runner);
        let manager = VolumeManager::new(runner.clone());
        (runner, manager)
    }

    fn label_args(args: &[String]) -> Vec<String> {
        args.windows(2)
            .filter(|pair| pair[0] == "--label")
            .map(|pair| pair[1].clone())
            .collect()
    }

    #[tokio::test]
    async fn test_create_volume_name_and_labels() {
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "no such volume")),
        );

        let name = manager
            .create_volume(
                VolumeType::Database,
                &VolumeCreateOptions::default()
                    .suffix("t1")
                    .label(labels::VOLUME_TYPE, "spoofed"),
            )
            .await
            .unwrap();
        assert_eq!(name, "artifactory_postgresql_t1");

        let creates = runner.calls_matching(&["docker", "volume", "create"]);
        assert_eq!(creates.len(), 1);
        let args = &creates[0];
        assert_eq!(args.last().unwrap(), "artifactory_postgresql_t1");

        let labels = label_args(args);
        assert!(labels.contains(&format!("{}=postgresql", labels::VOLUME_TYPE)));
        assert!(labels.contains(&format!("{}=PostgreSQL database storage", labels::PURPOSE)));
        assert!(labels.contains(&format!("{}=sapo", labels::MANAGED_BY)));
        assert!(!labels.iter().any(|l| l.ends_with("=spoofed")));
    }

    #[tokio::test]
    async fn test_create_volume_with_host_path_binds_locally() {
        let temp = tempfile::TempDir::new().unwrap();
        let host = temp.path().join("nested").join("data");
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "")),
        );

        manager
            .create_volume(
                VolumeType::Data,
                &VolumeCreateOptions::default().suffix("t1").host_path(&host),
            )
            .await
            .unwrap();

        assert!(host.is_dir());
        let args = &runner.calls_matching(&["docker", "volume", "create"])[0];
        let joined = args.join(" ");
        assert!(joined.contains("--driver local"));
        assert!(joined.contains("--opt type=none"));
        assert!(joined.contains("--opt o=bind"));
        assert!(joined.contains(&format!("--opt device={}", host.display())));
    }

    #[tokio::test]
    async fn test_create_volume_docker_unavailable() {
        let (runner, manager) =
            manager(ScriptedRunner::new().on(&["docker", "--version"], Reply::Missing));

        let result = manager
            .create_volume(VolumeType::Data, &VolumeCreateOptions::default())
            .await;
        assert!(matches!(result, Err(VolumeError::DockerUnavailable)));
        assert!(runner.calls_matching(&["docker", "volume", "create"]).is_empty());
    }

    #[tokio::test]
    async fn test_create_volume_refuses_existing_name() {
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::ok(INSPECT_DATA)),
        );

        let result = manager
            .create_volume(VolumeType::Data, &VolumeCreateOptions::default().suffix("t1"))
            .await;
        assert!(matches!(result, Err(VolumeError::VolumeExists(name)) if name == "artifactory_data_t1"));
        assert!(runner.calls_matching(&["docker", "volume", "create"]).is_empty());
    }

    #[tokio::test]
    async fn test_create_volume_failure_wraps_runner_error() {
        let (_, manager) = manager(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::fail(1, ""))
                .on(&["docker", "volume", "create"], Reply::fail(1, "driver not found")),
        );

        let err = manager
            .create_volume(VolumeType::Logs, &VolumeCreateOptions::default().suffix("t1"))
            .await
            .unwrap_err();
        match err {
            VolumeError::VolumeCreateFailed { name, source } => {
                assert_eq!(name, "artifactory_logs_t1");
                assert!(source.to_string().contains("driver not found"));
            }
            other => panic!("expected VolumeCreateFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_volume_set_success() {
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "")),
        );

        let options = VolumeSetOptions {
            suffix: Some("v7_9_2".to_string()),
            version: Some("7.9.2".to_string()),
            ..Default::default()
        };
        let volumes = manager.create_volume_set(&options).await.unwrap();

        assert_eq!(volumes.len(), 5);
        assert_eq!(volumes[&VolumeType::Data], "artifactory_data_v7_9_2");
        assert_eq!(volumes[&VolumeType::ConfigEtc], "artifactory_etc_v7_9_2");

        let creates = runner.calls_matching(&["docker", "volume", "create"]);
        let order: Vec<&str> = creates.iter().map(|a| a.last().unwrap().as_str()).collect();
        assert_eq!(
            order,
            vec![
                "artifactory_data_v7_9_2",
                "artifactory_logs_v7_9_2",
                "artifactory_backup_v7_9_2",
                "artifactory_postgresql_v7_9_2",
                "artifactory_etc_v7_9_2",
            ]
        );
        assert!(label_args(&creates[0]).contains(&format!("{}=7.9.2", labels::VERSION)));
        // local driver: no size hints
        assert!(!creates[0].join(" ").contains("size="));
    }

    #[tokio::test]
    async fn test_create_volume_set_rolls_back_on_database_failure() {
        let (runner, manager) = manager(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::fail(1, ""))
                .on_arg(
                    &["docker", "volume", "create"],
                    "artifactory_postgresql_",
                    Reply::fail(1, "no space left on device"),
                ),
        );

        let options = VolumeSetOptions {
            suffix: Some("t1".to_string()),
            driver: Some("rexray".to_string()),
            sizes: HashMap::from([(VolumeType::Data, "50G".to_string())]),
            ..Default::default()
        };
        let err = manager.create_volume_set(&options).await.unwrap_err();
        assert!(matches!(
            err,
            VolumeError::VolumeSetFailed {
                volume_type: VolumeType::Database,
                ..
            }
        ));

        let deleted: Vec<String> = runner
            .calls_matching(&["docker", "volume", "rm"])
            .into_iter()
            .map(|args| args.last().unwrap().clone())
            .collect();
        assert_eq!(deleted.len(), 3);
        for name in [
            "artifactory_data_t1",
            "artifactory_logs_t1",
            "artifactory_backup_t1",
        ] {
            assert!(deleted.contains(&name.to_string()), "{} not rolled back", name);
        }

        let creates = runner.calls_matching(&["docker", "volume", "create"]);
        assert!(creates[0].join(" ").contains("--opt size=50G"));
        assert!(creates[1].join(" ").contains("--opt size=10G"));
        // nothing created after the failure
        assert!(!creates.iter().any(|a| a.last().unwrap().contains("_etc_")));
    }

    #[tokio::test]
    async fn test_list_volumes_skips_malformed_lines() {
        let (_, manager) = manager(ScriptedRunner::new().on(
            &["docker", "volume", "ls"],
            Reply::ok(
                "artifactory_data_t1,local,/var/lib/docker/volumes/a/_data\n\
                 garbage-line\n\
                 other_volume,local,/x\n\
                 artifactory_logs_t1,local,/var/lib/docker/volumes/b/_data\n",
            ),
        ));

        let volumes = manager.list_volumes().await;
        let names: Vec<&str> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["artifactory_data_t1", "artifactory_logs_t1"]);
    }

    #[tokio::test]
    async fn test_list_volumes_when_docker_missing() {
        let (_, manager) =
            manager(ScriptedRunner::new().on(&["docker", "--version"], Reply::Missing));
        assert!(manager.list_volumes().await.is_empty());
    }

    #[tokio::test]
    async fn test_inspect_and_labels() {
        let (_, manager) = manager(
            ScriptedRunner::new()
                .on_arg(&["docker", "volume", "inspect"], "artifactory_data_t1", Reply::ok(INSPECT_DATA))
                .on(&["docker", "volume", "inspect"], Reply::fail(1, "no such volume")),
        );

        let info = manager.inspect_volume("artifactory_data_t1").await.unwrap();
        assert_eq!(info.volume_type(), Some("data"));
        assert!(manager.inspect_volume("missing").await.is_none());
        assert!(manager.volume_labels("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_volume_size() {
        let (_, manager) = manager(
            ScriptedRunner::new()
                .on(&["docker", "volume", "inspect"], Reply::ok(INSPECT_DATA))
                .on(&["docker", "run"], Reply::ok("2048\t/volume\n")),
        );

        let size = manager.volume_size("artifactory_data_t1").await.unwrap();
        assert_eq!(size.bytes, 2048 * 1024);
        assert_eq!(size.human, "2.00 MB");
    }

    #[tokio::test]
    async fn test_volume_size_missing_volume() {
        let (runner, manager) = manager(
            ScriptedRunner::new().on(&["docker", "volume", "inspect"], Reply::fail(1, "")),
        );
        assert!(manager.volume_size("missing").await.is_none());
        assert!(runner.calls_matching(&["docker", "run"]).is_empty());
    }

    #[tokio::test]
    async fn test_delete_volume() {
        let (runner, manager) = manager(
            ScriptedRunner::new()
                .on_arg(&["docker", "volume", "rm"], "in_use", Reply::fail(1, "volume is in use")),
        );

        assert!(manager.delete_volume("artifactory_data_t1", true).await);
        assert!(!manager.delete_volume("in_use", false).await);

        let calls = runner.calls_matching(&["docker", "volume", "rm"]);
        assert_eq!(calls[0], vec!["docker", "volume", "rm", "-f", "artifactory_data_t1"]);
        assert_eq!(calls[1], vec!["docker", "volume", "rm", "in_use"]);
    }

    #[test]
    fn test_parse_du() {
        assert_eq!(parse_du_kilobytes("4\t/volume\n"), Some(4096));
        assert_eq!(parse_du_kilobytes(""), None);
        assert_eq!(parse_du_kilobytes("du: cannot access"), None);
    }
}
