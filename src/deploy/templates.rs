//! Rendering of `.env`, `docker-compose.yml` and `system.yaml`.
//!
//! The compose manifest and `system.yaml` are built as typed structures and
//! serialized with `serde_yaml`, so secrets with YAML metacharacters are
//! always quoted correctly.

use super::config::DeploymentConfig;
use crate::env::{self, stack};
use crate::fsutil::Platform;
use crate::volume::VolumeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Values substituted into every generated file
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub version: String,
    pub app_image: String,
    pub db_image: String,
    pub external_port: u16,
    /// Absolute data directory
    pub data_dir: PathBuf,
    pub use_postgres: bool,
    pub postgres_user: String,
    pub postgres_password: String,
    pub postgres_db: String,
    pub jdbc_url: String,
    pub join_key: String,
    /// Named volumes; `None` means bind mounts under `data_dir`
    pub volumes: Option<BTreeMap<VolumeType, String>>,
    pub platform: Platform,
}

impl TemplateContext {
    /// Collect values from a config, generating secrets on first use
    pub fn new(config: &DeploymentConfig, volumes: Option<&BTreeMap<VolumeType, String>>) -> Self {
        let data_dir =
            std::path::absolute(&config.data_dir).unwrap_or_else(|_| config.data_dir.clone());
        Self {
            version: config.version.clone(),
            app_image: config.app_image(),
            db_image: config.db_image.clone(),
            external_port: config.port,
            data_dir,
            use_postgres: config.use_postgres(),
            postgres_user: config.postgres_user.clone(),
            postgres_password: config.postgres_password(),
            postgres_db: config.postgres_db.clone(),
            jdbc_url: config.jdbc_url(),
            join_key: config.generate_join_key(),
            volumes: volumes.cloned(),
            platform: Platform::current(),
        }
    }

    fn volume(&self, volume_type: VolumeType) -> Option<&str> {
        self.volumes
            .as_ref()
            .and_then(|volumes| volumes.get(&volume_type))
            .map(String::as_str)
    }

    fn system_yaml_host_path(&self) -> PathBuf {
        env::system_yaml_path(&self.data_dir)
    }
}

/// Render the compose environment file.
///
/// Secrets are single-quoted; generated passwords never contain a quote.
pub fn render_env(ctx: &TemplateContext) -> String {
    let mut out = format!(
        "# Generated by sapo {} on {}\n",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().to_rfc3339()
    );
    out.push_str(&format!("ARTIFACTORY_VERSION={}\n", ctx.version));
    out.push_str(&format!("ROOT_DATA_DIR={}\n", ctx.data_dir.display()));
    out.push_str(&format!(
        "JF_ROUTER_ENTRYPOINTS_EXTERNALPORT={}\n",
        ctx.external_port
    ));
    out.push_str(&format!("JF_SHARED_SECURITY_JOINKEY='{}'\n", ctx.join_key));
    out.push_str(&format!("USE_POSTGRES={}\n", ctx.use_postgres));
    if ctx.use_postgres {
        out.push_str(&format!("POSTGRES_USER={}\n", ctx.postgres_user));
        out.push_str(&format!("POSTGRES_PASSWORD='{}'\n", ctx.postgres_password));
        out.push_str(&format!("POSTGRES_DB={}\n", ctx.postgres_db));
    }
    if let Some(volumes) = &ctx.volumes {
        for (volume_type, name) in volumes {
            out.push_str(&format!(
                "VOLUME_{}={}\n",
                volume_type.as_str().to_ascii_uppercase(),
                name
            ));
        }
    }
    out
}

/// Compose manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeManifest {
    pub name: String,
    pub services: BTreeMap<String, ComposeService>,
    pub networks: BTreeMap<String, ComposeNetwork>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, ExternalVolume>,
}

/// One compose service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    pub image: String,
    pub container_name: String,
    pub restart: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ulimits: BTreeMap<String, Ulimit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ulimit {
    Single(u64),
    Range { soft: u64, hard: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeNetwork {
    pub name: String,
    pub driver: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalVolume {
    pub external: bool,
}

/// Build the compose manifest for a context
pub fn compose_manifest(ctx: &TemplateContext) -> ComposeManifest {
    let networks = vec![stack::NETWORK.to_string()];
    let mut services = BTreeMap::new();

    if ctx.use_postgres {
        let data_mount = match ctx.volume(VolumeType::Database) {
            Some(name) => format!("{}:{}", name, stack::DB_DATA_DIR),
            None => format!(
                "{}:{}",
                ctx.data_dir.join("postgresql").join("data").display(),
                stack::DB_DATA_DIR
            ),
        };
        services.insert(
            stack::DB_SERVICE.to_string(),
            ComposeService {
                image: ctx.db_image.clone(),
                container_name: stack::DB_CONTAINER.to_string(),
                restart: "unless-stopped".to_string(),
                ports: Vec::new(),
                environment: BTreeMap::from([
                    ("POSTGRES_DB".to_string(), ctx.postgres_db.clone()),
                    ("POSTGRES_USER".to_string(), ctx.postgres_user.clone()),
                    ("POSTGRES_PASSWORD".to_string(), ctx.postgres_password.clone()),
                ]),
                volumes: vec![data_mount],
                networks: networks.clone(),
                depends_on: BTreeMap::new(),
                healthcheck: Some(HealthCheck {
                    test: vec![
                        "CMD-SHELL".to_string(),
                        format!("pg_isready -U {} -d {}", ctx.postgres_user, ctx.postgres_db),
                    ],
                    interval: "10s".to_string(),
                    timeout: "5s".to_string(),
                    retries: 5,
                    start_period: None,
                }),
                ulimits: BTreeMap::new(),
            },
        );
    }

    let mut environment = BTreeMap::from([
        (
            "JF_ROUTER_ENTRYPOINTS_EXTERNALPORT".to_string(),
            ctx.external_port.to_string(),
        ),
        (
            "JF_SHARED_SECURITY_JOINKEY".to_string(),
            ctx.join_key.clone(),
        ),
    ]);
    let mut depends_on = BTreeMap::new();
    if ctx.use_postgres {
        environment.extend([
            ("JF_SHARED_DATABASE_TYPE".to_string(), "postgresql".to_string()),
            (
                "JF_SHARED_DATABASE_DRIVER".to_string(),
                "org.postgresql.Driver".to_string(),
            ),
            ("JF_SHARED_DATABASE_URL".to_string(), ctx.jdbc_url.clone()),
            (
                "JF_SHARED_DATABASE_USERNAME".to_string(),
                ctx.postgres_user.clone(),
            ),
            (
                "JF_SHARED_DATABASE_PASSWORD".to_string(),
                ctx.postgres_password.clone(),
            ),
        ]);
        depends_on.insert(
            stack::DB_SERVICE.to_string(),
            DependsOn {
                condition: "service_healthy".to_string(),
            },
        );
    }

    let app_volumes = match &ctx.volumes {
        Some(_) => {
            let mut mounts: Vec<String> = [
                VolumeType::Data,
                VolumeType::Logs,
                VolumeType::Backup,
                VolumeType::ConfigEtc,
            ]
            .into_iter()
            .filter_map(|volume_type| {
                ctx.volume(volume_type)
                    .map(|name| format!("{}:{}", name, volume_type.container_path()))
            })
            .collect();
            mounts.push(format!(
                "{}:{}/etc/system.yaml",
                ctx.system_yaml_host_path().display(),
                stack::APP_VAR_DIR
            ));
            mounts
        }
        None => vec![format!("{}:{}", ctx.data_dir.display(), stack::APP_VAR_DIR)],
    };

    services.insert(
        stack::APP_SERVICE.to_string(),
        ComposeService {
            image: ctx.app_image.clone(),
            container_name: stack::APP_CONTAINER.to_string(),
            restart: "unless-stopped".to_string(),
            ports: vec![format!("{}:{}", ctx.external_port, stack::APP_INTERNAL_PORT)],
            environment,
            volumes: app_volumes,
            networks: networks.clone(),
            depends_on,
            healthcheck: Some(HealthCheck {
                test: vec![
                    "CMD-SHELL".to_string(),
                    format!(
                        "curl -sf http://localhost:{}/router/api/v1/system/health || exit 1",
                        stack::APP_INTERNAL_PORT
                    ),
                ],
                interval: "30s".to_string(),
                timeout: "10s".to_string(),
                retries: 5,
                start_period: Some("120s".to_string()),
            }),
            ulimits: BTreeMap::from([
                ("nproc".to_string(), Ulimit::Single(65535)),
                (
                    "nofile".to_string(),
                    Ulimit::Range {
                        soft: 32000,
                        hard: 40000,
                    },
                ),
            ]),
        },
    );

    let volumes = ctx
        .volumes
        .as_ref()
        .map(|volumes| {
            volumes
                .iter()
                .filter(|(volume_type, _)| ctx.use_postgres || **volume_type != VolumeType::Database)
                .map(|(_, name)| (name.clone(), ExternalVolume { external: true }))
                .collect()
        })
        .unwrap_or_default();

    ComposeManifest {
        name: env::DEFAULT_VOLUME_PREFIX.to_string(),
        services,
        networks: BTreeMap::from([(
            stack::NETWORK.to_string(),
            ComposeNetwork {
                name: stack::NETWORK.to_string(),
                driver: "bridge".to_string(),
            },
        )]),
        volumes,
    }
}

/// Render the compose manifest
pub fn render_compose(ctx: &TemplateContext) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(&compose_manifest(ctx))?;
    Ok(format!(
        "# Generated by sapo {}; regenerate instead of editing\n{}",
        env!("CARGO_PKG_VERSION"),
        yaml
    ))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemYaml {
    config_version: u32,
    shared: SharedSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct SharedSection {
    security: SecuritySection,
    node: NodeSection,
    database: DatabaseSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecuritySection {
    join_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeSection {
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseSection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// Render the server's `system.yaml`
pub fn render_system_yaml(ctx: &TemplateContext) -> Result<String, serde_yaml::Error> {
    let database = if ctx.use_postgres {
        DatabaseSection {
            kind: "postgresql".to_string(),
            driver: Some("org.postgresql.Driver".to_string()),
            url: Some(ctx.jdbc_url.clone()),
            username: Some(ctx.postgres_user.clone()),
            password: Some(ctx.postgres_password.clone()),
        }
    } else {
        DatabaseSection {
            kind: "derby".to_string(),
            driver: None,
            url: None,
            username: None,
            password: None,
        }
    };

    let document = SystemYaml {
        config_version: 1,
        shared: SharedSection {
            security: SecuritySection {
                join_key: ctx.join_key.clone(),
            },
            node: NodeSection {
                id: "art1".to_string(),
            },
            database,
        },
    };

    let yaml = serde_yaml::to_string(&document)?;
    Ok(format!(
        "# Artifactory system configuration generated by sapo {}\n{}",
        env!("CARGO_PKG_VERSION"),
        yaml
    ))
}
