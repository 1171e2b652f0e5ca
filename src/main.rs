use anyhow::{Context, Result, bail};
use sapo::cli::{
    Args, Commands, ConfigDiscovery, InstallArgs, SapoConfig, VolumeCommands, resolve_output_dir,
};
use sapo::deploy::{
    ContainerLifecycleManager, DeploymentConfig, InstallError, InstallReport, Installer,
    LifecycleConfig, LifecycleError,
};
use sapo::env::stack;
use sapo::fsutil::{AssumeYes, Prompter, StdinPrompter};
use sapo::runner::HostRunner;
use sapo::volume::{
    RestoreOptions, UsageAnalysis, VolumeCreateOptions, VolumeManager, VolumeRow,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let debug = args.debug;

    let directive = if debug { "sapo=debug" } else { "sapo=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("❌ {}", e);
        if debug {
            eprintln!("{:?}", e);
        }
        std::process::exit(1);
    }
}

/// Shared state for one invocation
struct Cli {
    defaults: SapoConfig,
    runner: Arc<HostRunner>,
    prompter: Arc<dyn Prompter>,
    interactive: bool,
}

impl Cli {
    fn confirm(&self, question: &str, default: bool) -> bool {
        if self.interactive {
            self.prompter.confirm(question, default)
        } else {
            true
        }
    }

    fn volume_manager(&self) -> VolumeManager {
        VolumeManager::with_config(self.runner.clone(), self.defaults.volume_manager_config())
    }

    fn lifecycle(&self, output_dir: Option<PathBuf>) -> Result<ContainerLifecycleManager> {
        let compose_dir = resolve_output_dir(output_dir.as_deref(), &self.defaults)
            .context("Cannot determine the output directory; pass --output-dir")?;
        let config = LifecycleConfig {
            compose_dir,
            health: self.defaults.health_poll_config(),
            ..Default::default()
        };
        Ok(ContainerLifecycleManager::new(self.runner.clone(), config))
    }
}

async fn run(args: Args) -> Result<()> {
    let Some(command) = args.command else {
        bail!("No command specified. Use 'sapo --help' to see available commands.");
    };

    match command {
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            return Ok(());
        }
        Commands::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("📝 Configuration file: {}", path.display());
            return Ok(());
        }
        _ => {}
    }

    let defaults = ConfigDiscovery::load(args.config.as_deref())?;
    let prompter: Arc<dyn Prompter> = if args.yes {
        Arc::new(AssumeYes)
    } else {
        Arc::new(StdinPrompter)
    };
    let cli = Cli {
        defaults,
        runner: Arc::new(HostRunner::new()),
        prompter,
        interactive: !args.yes,
    };

    match command {
        Commands::Install(install) => run_install(&cli, &install).await,
        Commands::Volume { command } => run_volume(&cli, command).await,
        Commands::Status { output_dir } => run_status(&cli, output_dir).await,
        Commands::Clean { output_dir } => run_clean(&cli, output_dir).await,
        Commands::ShowConfig | Commands::InitConfig => Ok(()),
    }
}

async fn run_install(cli: &Cli, install: &InstallArgs) -> Result<()> {
    let config = install.deployment_config(&cli.defaults)?;
    let options = install.install_options(&cli.defaults, cli.interactive);

    println!(
        "🚀 Installing Artifactory {} ({} database)",
        config.version, config.database_type
    );
    info!("Data directory: {}", config.data_dir.display());

    let installer = Installer::new(cli.runner.clone(), cli.prompter.clone());
    match installer.install(&config, &options).await {
        Ok(report) => {
            print_install_report(&config, &report);
            Ok(())
        }
        Err(InstallError::Cancelled) => {
            println!("Installation cancelled");
            Ok(())
        }
        Err(InstallError::FilesIncomplete(failures)) => {
            for failure in &failures {
                println!("{}", failure);
            }
            bail!("{} file(s) could not be written", failures.len());
        }
        Err(InstallError::Lifecycle(e)) => {
            print_troubleshooting(&config, &e);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_install_report(config: &DeploymentConfig, report: &InstallReport) {
    println!();
    println!("📝 Generated files:");
    for result in report.files.files.values() {
        println!("  {}", result);
    }
    for note in &report.files.notes {
        println!("  {}", note);
    }

    if let Some(volumes) = &report.volumes {
        println!();
        println!("📦 Volumes:");
        for (volume_type, name) in volumes {
            println!("  {:<12} {}", volume_type, name);
        }
    }

    println!();
    println!("🔑 Credentials (store these securely):");
    println!("  Join key:          {}", config.generate_join_key());
    if config.use_postgres() {
        println!("  Database user:     {}", config.postgres_user);
        println!("  Database password: {}", config.postgres_password());
        println!("  Database name:     {}", config.postgres_db);
    }

    println!();
    match &report.started {
        Some(outcome) => {
            println!("✅ Artifactory is running");
            if let Some(url) = outcome.access_url() {
                println!("  🌐 {}", url);
            }
            println!("  Default login: admin / password (change it on first login)");
        }
        None => {
            println!("Next steps:");
            println!("  cd {}", config.output_dir().display());
            println!("  docker compose up -d");
            println!("  open http://localhost:{}", config.port);
        }
    }
}

fn print_troubleshooting(config: &DeploymentConfig, e: &LifecycleError) {
    println!();
    println!("⚠️  Startup failed: {}", e);
    match e {
        LifecycleError::ComposeFailed { tail, .. } => {
            println!("Last output lines:");
            for line in tail {
                println!("  {}", line);
            }
        }
        LifecycleError::HealthTimeout { .. } => {
            println!("The containers may still be starting. Check:");
            println!("  docker logs {}", stack::APP_CONTAINER);
            if config.use_postgres() {
                println!("  docker logs {}", stack::DB_CONTAINER);
            }
            println!("  docker ps -a");
        }
        _ => {}
    }
    println!("Files are in {}", config.output_dir().display());
}

async fn run_volume(cli: &Cli, command: VolumeCommands) -> Result<()> {
    let manager = cli.volume_manager();

    match command {
        VolumeCommands::List => {
            let rows = manager.volume_rows().await;
            if rows.is_empty() {
                println!("No volumes with prefix '{}' found", manager.config().volume_prefix);
            } else {
                print_volume_table(&rows);
            }
        }
        VolumeCommands::Create {
            volume_type,
            suffix,
            driver,
            host_path,
            labels,
        } => {
            let mut options = VolumeCreateOptions::default();
            if let Some(suffix) = suffix {
                options = options.suffix(suffix);
            }
            if let Some(driver) = driver.or_else(|| cli.defaults.volume_driver.clone()) {
                options = options.driver(driver);
            }
            if let Some(path) = host_path {
                options = options.host_path(path);
            }
            for (key, value) in labels {
                options = options.label(key, value);
            }
            let name = manager.create_volume(volume_type, &options).await?;
            println!("✅ Created {} volume {}", volume_type, name);
        }
        VolumeCommands::Delete { name, force } => {
            if !cli.confirm(&format!("Delete volume {}? Its data will be lost", name), false) {
                println!("Cancelled");
                return Ok(());
            }
            if !manager.delete_volume(&name, force).await {
                bail!("Failed to delete volume {}", name);
            }
            println!("🗑️  Deleted {}", name);
        }
        VolumeCommands::Backup {
            name,
            output_dir,
            no_compress,
        } => {
            let archive = manager.backup_volume(&name, &output_dir, !no_compress).await?;
            println!("💾 Backup written to {}", archive.display());
        }
        VolumeCommands::Restore {
            archive,
            name,
            volume_type,
            host_path,
        } => {
            if let Some(name) = &name
                && !cli.confirm(&format!("Overwrite the contents of {}?", name), false)
            {
                println!("Cancelled");
                return Ok(());
            }
            let options = RestoreOptions {
                volume_name: name,
                volume_type,
                host_path,
            };
            let target = manager.restore_volume(&archive, &options).await?;
            println!("✅ Restored {} into {}", archive.display(), target);
        }
        VolumeCommands::Migrate {
            source,
            target,
            backup_dir,
        } => {
            if !manager.migrate_data(&source, &target, backup_dir.as_deref()).await {
                bail!("Migration from {} to {} failed", source, target);
            }
            println!("✅ Migrated {} to {}", source, target);
        }
        VolumeCommands::Import {
            host_path,
            target,
            volume_type,
        } => {
            if !manager
                .migrate_from_host_path(&host_path, &target, volume_type)
                .await
            {
                bail!("Import of {} into {} failed", host_path.display(), target);
            }
            println!("✅ Imported {} into {}", host_path.display(), target);
        }
        VolumeCommands::Analyze { name } => match manager.analyze_usage(&name).await {
            UsageAnalysis::Report(report) => {
                println!("📊 {} ({})", report.volume, report.total_size);
                for entry in &report.entries {
                    println!("  {:>10}  {}", entry.size, entry.name);
                }
            }
            UsageAnalysis::Failed { volume, error } => {
                bail!("Could not analyze {}: {}", volume, error);
            }
        },
        VolumeCommands::Inspect { name } => {
            let Some(info) = manager.inspect_volume(&name).await else {
                bail!("Volume {} not found", name);
            };
            println!("{}", serde_json::to_string_pretty(&info)?);
            if let Some(size) = manager.volume_size(&name).await {
                println!("Size: {}", size.human);
            }
        }
    }

    Ok(())
}

fn print_volume_table(rows: &[VolumeRow]) {
    let width = |f: fn(&VolumeRow) -> &str, title: &str| {
        rows.iter().map(|r| f(r).len()).max().unwrap_or(0).max(title.len())
    };
    let name_w = width(|r| r.name.as_str(), "NAME");
    let driver_w = width(|r| r.driver.as_str(), "DRIVER");
    let size_w = width(|r| r.size.as_str(), "SIZE");
    let type_w = width(|r| r.volume_type.as_str(), "TYPE");

    println!(
        "{:<name_w$}  {:<driver_w$}  {:<size_w$}  {:<type_w$}  MOUNTPOINT",
        "NAME", "DRIVER", "SIZE", "TYPE"
    );
    for row in rows {
        println!(
            "{:<name_w$}  {:<driver_w$}  {:<size_w$}  {:<type_w$}  {}",
            row.name, row.driver, row.size, row.volume_type, row.mountpoint
        );
    }
}

async fn run_status(cli: &Cli, output_dir: Option<PathBuf>) -> Result<()> {
    let lifecycle = cli.lifecycle(output_dir)?;
    let status = lifecycle.stack_status().await;

    println!("📊 Artifactory status:");
    println!("  {:<22} {}", stack::APP_CONTAINER, status.app);
    println!("  {:<22} {}", stack::DB_CONTAINER, status.database);
    if let Some(port) = status.host_port {
        println!("  🌐 http://localhost:{}", port);
    }
    Ok(())
}

async fn run_clean(cli: &Cli, output_dir: Option<PathBuf>) -> Result<()> {
    let lifecycle = cli.lifecycle(output_dir)?;
    if !cli.confirm("Remove Artifactory containers and network?", false) {
        println!("Cancelled");
        return Ok(());
    }
    if !lifecycle.clean_environment().await {
        bail!("Cleanup did not complete; see the log for details");
    }
    println!("🧹 Environment cleaned");
    Ok(())
}
