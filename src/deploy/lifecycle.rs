//! Container lifecycle: cleanup, startup and health polling.
//!
//! Startup runs in two shapes. Compose mode hands the generated manifest to
//! `docker compose up -d`. Direct mode creates the same services one by one
//! with `docker create`, starting the database first and giving it a grace
//! delay before the application starts. Both end in the same health poll.

use super::config::DeploymentConfig;
use super::templates::{ComposeManifest, ComposeService, Ulimit};
use crate::env::{self, stack};
use crate::runner::{CommandRunner, RunnerError, RuntimeCommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Health polls always performed before success is reported
pub const MIN_HEALTH_POLL_ATTEMPTS: u32 = 3;

/// Default delay between health polls
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Default overall health timeout
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Delay between starting the database and the application in direct mode
pub const DATABASE_GRACE_DELAY: Duration = Duration::from_secs(5);

/// Output lines kept for a failed `compose up`
const DIAGNOSTIC_TAIL_LINES: usize = 10;

/// Container state as seen by the health poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerStatus {
    Unknown,
    Running,
    Healthy,
    Unhealthy,
    Stopped,
}

impl ContainerStatus {
    /// Application counts as up when running or healthy
    pub fn app_ready(self) -> bool {
        matches!(self, ContainerStatus::Running | ContainerStatus::Healthy)
    }

    /// Database additionally tolerates stopped (restart in progress)
    pub fn database_ready(self) -> bool {
        matches!(
            self,
            ContainerStatus::Running | ContainerStatus::Healthy | ContainerStatus::Stopped
        )
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerStatus::Unknown => "UNKNOWN",
            ContainerStatus::Running => "RUNNING",
            ContainerStatus::Healthy => "HEALTHY",
            ContainerStatus::Unhealthy => "UNHEALTHY",
            ContainerStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedContainer {
    state: InspectedState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedState {
    #[serde(default)]
    status: String,
    #[serde(default)]
    health: Option<InspectedHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedHealth {
    status: String,
}

impl InspectedState {
    fn to_status(&self) -> ContainerStatus {
        match self.status.as_str() {
            "running" => match self.health.as_ref().map(|h| h.status.as_str()) {
                Some("healthy") => ContainerStatus::Healthy,
                Some("unhealthy") => ContainerStatus::Unhealthy,
                _ => ContainerStatus::Running,
            },
            "exited" => ContainerStatus::Stopped,
            _ => ContainerStatus::Unknown,
        }
    }
}

/// Parse `docker inspect` output: a JSON array, a bare state object, or a
/// plain status string such as `running` or `Up 3 minutes (healthy)`.
pub fn parse_container_status(output: &str) -> ContainerStatus {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return ContainerStatus::Unknown;
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<InspectedContainer>>(trimmed)
            .ok()
            .and_then(|containers| containers.into_iter().next())
            .map(|c| c.state.to_status())
            .unwrap_or(ContainerStatus::Unknown);
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str::<InspectedState>(trimmed)
            .map(|state| state.to_status())
            .unwrap_or(ContainerStatus::Unknown);
    }

    let lower = trimmed.trim_matches(['\'', '"']).to_ascii_lowercase();
    if lower.contains("unhealthy") {
        ContainerStatus::Unhealthy
    } else if lower.contains("healthy") {
        ContainerStatus::Healthy
    } else if lower.starts_with("running") || lower.starts_with("up") {
        ContainerStatus::Running
    } else if lower.starts_with("exited") || lower.starts_with("stopped") {
        ContainerStatus::Stopped
    } else {
        ContainerStatus::Unknown
    }
}

/// Health poll timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub min_attempts: u32,
}

impl Default for HealthPollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEALTH_INTERVAL,
            timeout: DEFAULT_HEALTH_TIMEOUT,
            min_attempts: MIN_HEALTH_POLL_ATTEMPTS,
        }
    }
}

impl HealthPollConfig {
    /// `timeout / interval`, never below one nor below the minimum attempts
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let by_time = u32::try_from(self.timeout.as_millis() / interval).unwrap_or(u32::MAX);
        by_time.max(1).max(self.min_attempts)
    }
}

/// Lifecycle manager configuration.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Directory holding the compose manifest and `.env`
    pub compose_dir: PathBuf,
    pub app_container: String,
    pub app_service: String,
    pub db_container: String,
    /// Whether the health poll waits for the database container
    pub database_required: bool,
    pub network: String,
    pub health: HealthPollConfig,
    /// Direct mode delay between database and application start
    pub database_grace: Duration,
    /// Log every compose output line at info level
    pub verbose: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            compose_dir: PathBuf::from("."),
            app_container: stack::APP_CONTAINER.to_string(),
            app_service: stack::APP_SERVICE.to_string(),
            db_container: stack::DB_CONTAINER.to_string(),
            database_required: true,
            network: stack::NETWORK.to_string(),
            health: HealthPollConfig::default(),
            database_grace: DATABASE_GRACE_DELAY,
            verbose: false,
        }
    }
}

impl LifecycleConfig {
    /// Configuration matching a deployment's output directory and database
    pub fn for_deployment(config: &DeploymentConfig) -> Self {
        Self {
            compose_dir: config.output_dir().to_path_buf(),
            database_required: config.use_postgres(),
            ..Default::default()
        }
    }
}

/// Lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Preflight `docker --version` failed
    #[error("Container runtime not available: {0}")]
    RuntimeUnavailable(String),

    /// `docker compose up` exited non-zero
    #[error(
        "docker compose up failed with exit code {code}; run `cd {} && docker compose up` to see the full output",
        .compose_dir.display()
    )]
    ComposeFailed {
        code: i32,
        compose_dir: PathBuf,
        /// Last output lines
        tail: Vec<String>,
    },

    /// Health poll ran out of attempts
    #[error("Containers not healthy after {attempts} checks (application: {app}{})", database_suffix(.database))]
    HealthTimeout {
        attempts: u32,
        app: ContainerStatus,
        database: Option<ContainerStatus>,
    },

    /// A container could not be created or started in direct mode
    #[error("Failed to start container {name}: {source}")]
    ContainerStartFailed {
        name: String,
        #[source]
        source: RunnerError,
    },

    /// Manifest lacks a service direct mode needs
    #[error("Invalid compose manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

fn database_suffix(database: &Option<ContainerStatus>) -> String {
    database
        .map(|status| format!(", database: {}", status))
        .unwrap_or_default()
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Successful startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    /// Health polls performed; 0 when the application was not started
    pub health_attempts: u32,
    /// Host port mapped to the application, if it could be resolved
    pub host_port: Option<u16>,
}

impl StartOutcome {
    /// Browser URL of the application
    pub fn access_url(&self) -> Option<String> {
        self.host_port.map(|port| format!("http://localhost:{}", port))
    }
}

/// Point-in-time view of the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    pub app: ContainerStatus,
    pub database: ContainerStatus,
    pub host_port: Option<u16>,
}

/// Services created individually in direct mode
#[derive(Debug, Clone)]
pub struct DirectStackSpec {
    pub network: String,
    pub database: Option<ComposeService>,
    pub application: ComposeService,
}

impl DirectStackSpec {
    /// Take services and network from a compose manifest
    pub fn from_manifest(manifest: &ComposeManifest) -> Result<Self> {
        let application = manifest
            .services
            .get(stack::APP_SERVICE)
            .cloned()
            .ok_or_else(|| {
                LifecycleError::InvalidManifest(format!("missing service {}", stack::APP_SERVICE))
            })?;
        let network = manifest
            .networks
            .values()
            .next()
            .map(|n| n.name.clone())
            .unwrap_or_else(|| stack::NETWORK.to_string());

        Ok(Self {
            network,
            database: manifest.services.get(stack::DB_SERVICE).cloned(),
            application,
        })
    }
}

/// `docker create` arguments equivalent to a compose service
pub fn create_args(service: &ComposeService, network: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "create",
        "--name",
        service.container_name.as_str(),
        "--network",
        network,
        "--restart",
        service.restart.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for port in &service.ports {
        args.push("-p".to_string());
        args.push(port.clone());
    }
    for (key, value) in &service.environment {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    for volume in &service.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    if let Some(health) = &service.healthcheck
        && health.test.first().map(String::as_str) == Some("CMD-SHELL")
    {
        args.push("--health-cmd".to_string());
        args.push(health.test[1..].join(" "));
        args.push("--health-interval".to_string());
        args.push(health.interval.clone());
        args.push("--health-timeout".to_string());
        args.push(health.timeout.clone());
        args.push("--health-retries".to_string());
        args.push(health.retries.to_string());
        if let Some(start_period) = &health.start_period {
            args.push("--health-start-period".to_string());
            args.push(start_period.clone());
        }
    }
    for (name, limit) in &service.ulimits {
        args.push("--ulimit".to_string());
        args.push(match limit {
            Ulimit::Single(value) => format!("{}={}", name, value),
            Ulimit::Range { soft, hard } => format!("{}={}:{}", name, soft, hard),
        });
    }
    args.push(service.image.clone());
    args
}

/// Starts, stops and watches the deployed containers.
pub struct ContainerLifecycleManager {
    runner: Arc<dyn CommandRunner>,
    config: LifecycleConfig,
}

impl ContainerLifecycleManager {
    pub fn new(runner: Arc<dyn CommandRunner>, config: LifecycleConfig) -> Self {
        Self { runner, config }
    }

    /// Get configuration
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn compose(&self, args: &[&str]) -> RuntimeCommand {
        let mut full = vec!["compose"];
        full.extend_from_slice(args);
        RuntimeCommand::docker(full).with_working_dir(&self.config.compose_dir)
    }

    /// Remove a previous deployment. Safe to repeat.
    ///
    /// Runs `compose down` when a manifest exists, then force-removes the
    /// known containers and the network, each independently. Returns `true`
    /// when the removal phase ran without a runner error.
    pub async fn clean_environment(&self) -> bool {
        if env::compose_file_path(&self.config.compose_dir).is_file() {
            match self
                .runner
                .run(self.compose(&["down", "--volumes", "--remove-orphans"]))
                .await
            {
                Ok(output) if output.success() => info!("Stopped previous compose deployment"),
                Ok(output) => warn!(
                    "docker compose down exited with {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
                Err(e) => warn!("docker compose down failed: {}", e),
            }
        }

        let removals = [
            RuntimeCommand::docker(["rm", "-f", self.config.app_container.as_str()]),
            RuntimeCommand::docker(["rm", "-f", self.config.db_container.as_str()]),
            RuntimeCommand::docker(["network", "rm", self.config.network.as_str()]),
        ];

        let mut completed = true;
        for cmd in removals {
            match self.runner.run(cmd.clone()).await {
                Ok(output) if output.success() => debug!("{}: done", cmd.display()),
                Ok(_) => debug!("{}: nothing to remove", cmd.display()),
                Err(e) => {
                    warn!("{} failed: {}", cmd.display(), e);
                    completed = false;
                }
            }
        }

        completed
    }

    async fn preflight(&self) -> Result<()> {
        match self
            .runner
            .run(RuntimeCommand::docker(["--version"]).checked())
            .await
        {
            Ok(output) => {
                debug!("Runtime: {}", output.stdout_trimmed());
                Ok(())
            }
            Err(e) => Err(LifecycleError::RuntimeUnavailable(e.to_string())),
        }
    }

    /// Start the stack with `docker compose up -d` and wait for health.
    ///
    /// Output is streamed as it arrives: lines mentioning an error or failure
    /// are logged as warnings, the rest at info level when verbose.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RuntimeUnavailable`] before anything starts,
    /// [`LifecycleError::ComposeFailed`] with the last output lines, or
    /// [`LifecycleError::HealthTimeout`].
    pub async fn start_containers(&self) -> Result<StartOutcome> {
        self.preflight().await?;

        info!(
            "Starting containers from {}",
            self.config.compose_dir.display()
        );

        let verbose = self.config.verbose;
        let echo = move |line: &str| {
            let lower = line.to_ascii_lowercase();
            if lower.contains("error") || lower.contains("fail") {
                warn!("{}", line);
            } else if verbose {
                info!("{}", line);
            } else {
                debug!("{}", line);
            }
        };

        let output = self
            .runner
            .run_streaming(self.compose(&["up", "-d"]), &echo)
            .await?;

        if !output.success() {
            let lines: Vec<&str> = output.stdout.lines().collect();
            let start = lines.len().saturating_sub(DIAGNOSTIC_TAIL_LINES);
            return Err(LifecycleError::ComposeFailed {
                code: output.exit_code,
                compose_dir: self.config.compose_dir.clone(),
                tail: lines[start..].iter().map(|l| l.to_string()).collect(),
            });
        }

        let attempts = self.wait_for_health().await?;
        let host_port = self
            .resolve_port(self.compose(&[
                "port",
                self.config.app_service.as_str(),
                &stack::APP_INTERNAL_PORT.to_string(),
            ]))
            .await;

        Ok(StartOutcome {
            health_attempts: attempts,
            host_port,
        })
    }

    /// Create and start the services individually, database first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RuntimeUnavailable`],
    /// [`LifecycleError::ContainerStartFailed`] naming the container, or
    /// [`LifecycleError::HealthTimeout`] when `start_app` is set.
    pub async fn start_direct(&self, spec: &DirectStackSpec, start_app: bool) -> Result<StartOutcome> {
        self.preflight().await?;

        let mut names = vec![spec.application.container_name.as_str()];
        if let Some(db) = &spec.database {
            names.push(db.container_name.as_str());
        }
        for name in names {
            self.runner
                .run(RuntimeCommand::docker(["rm", "-f", name]))
                .await?;
        }

        let network = self
            .runner
            .run(RuntimeCommand::docker(["network", "inspect", spec.network.as_str()]))
            .await?;
        if !network.success() {
            info!("Creating network {}", spec.network);
            self.runner
                .run(
                    RuntimeCommand::docker(["network", "create", "--driver", "bridge", spec.network.as_str()])
                        .checked(),
                )
                .await?;
        }

        if let Some(db) = &spec.database {
            self.create_container(db, &spec.network).await?;
            self.start_container(&db.container_name).await?;
            info!(
                "Database started; waiting {:?} before starting the application",
                self.config.database_grace
            );
            tokio::time::sleep(self.config.database_grace).await;
        }

        self.create_container(&spec.application, &spec.network).await?;
        if !start_app {
            info!(
                "Created {} without starting it",
                spec.application.container_name
            );
            return Ok(StartOutcome {
                health_attempts: 0,
                host_port: None,
            });
        }
        self.start_container(&spec.application.container_name).await?;

        let attempts = self.wait_for_health().await?;
        let host_port = self
            .resolve_port(RuntimeCommand::docker([
                "port".to_string(),
                spec.application.container_name.clone(),
                stack::APP_INTERNAL_PORT.to_string(),
            ]))
            .await;

        Ok(StartOutcome {
            health_attempts: attempts,
            host_port,
        })
    }

    async fn create_container(&self, service: &ComposeService, network: &str) -> Result<()> {
        debug!("Creating container {}", service.container_name);
        self.runner
            .run(RuntimeCommand::docker(create_args(service, network)).checked())
            .await
            .map_err(|source| LifecycleError::ContainerStartFailed {
                name: service.container_name.clone(),
                source,
            })?;
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.runner
            .run(RuntimeCommand::docker(["start", name]).checked())
            .await
            .map_err(|source| LifecycleError::ContainerStartFailed {
                name: name.to_string(),
                source,
            })?;
        info!("Started container {}", name);
        Ok(())
    }

    /// Status of one container; [`ContainerStatus::Unknown`] on any failure
    pub async fn get_container_status(&self, name: &str) -> ContainerStatus {
        match self.runner.run(RuntimeCommand::docker(["inspect", name])).await {
            Ok(output) if output.success() => parse_container_status(&output.stdout),
            Ok(_) => ContainerStatus::Unknown,
            Err(e) => {
                debug!("Inspect of {} failed: {}", name, e);
                ContainerStatus::Unknown
            }
        }
    }

    /// Poll until the stack is up, returning the number of polls.
    ///
    /// Never succeeds before [`HealthPollConfig::min_attempts`] polls.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::HealthTimeout`] after
    /// [`HealthPollConfig::max_attempts`] polls.
    pub async fn wait_for_health(&self) -> Result<u32> {
        let health = self.config.health;
        let max_attempts = health.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let app = self.get_container_status(&self.config.app_container).await;
            let database = if self.config.database_required {
                Some(self.get_container_status(&self.config.db_container).await)
            } else {
                None
            };

            let ready = app.app_ready() && database.is_none_or(ContainerStatus::database_ready);
            info!(
                "Health check {}/{}: application {}{}",
                attempt,
                max_attempts,
                app,
                database
                    .map(|s| format!(", database {}", s))
                    .unwrap_or_default()
            );

            if ready && attempt >= health.min_attempts {
                return Ok(attempt);
            }
            if attempt >= max_attempts {
                return Err(LifecycleError::HealthTimeout {
                    attempts: attempt,
                    app,
                    database,
                });
            }

            tokio::time::sleep(health.interval).await;
        }
    }

    async fn resolve_port(&self, cmd: RuntimeCommand) -> Option<u16> {
        match self.runner.run(cmd.checked()).await {
            Ok(output) => {
                let port = parse_port_mapping(&output.stdout);
                if port.is_none() {
                    info!("Could not determine the host port; check `docker ps`");
                }
                port
            }
            Err(e) => {
                info!("Could not determine the host port: {}", e);
                None
            }
        }
    }

    /// Current status of both containers and the host port
    pub async fn stack_status(&self) -> StackStatus {
        let app = self.get_container_status(&self.config.app_container).await;
        let database = self.get_container_status(&self.config.db_container).await;
        let host_port = if app.app_ready() {
            self.resolve_port(RuntimeCommand::docker([
                "port".to_string(),
                self.config.app_container.clone(),
                stack::APP_INTERNAL_PORT.to_string(),
            ]))
            .await
        } else {
            None
        };
        StackStatus {
            app,
            database,
            host_port,
        }
    }
}

/// Host port from `docker port` output such as `0.0.0.0:8082`
fn parse_port_mapping(stdout: &str) -> Option<u16> {
    stdout
        .lines()
        .find_map(|line| line.trim().rsplit(':').next()?.parse().ok())
}
