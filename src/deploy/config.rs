//! Deployment parameters shared by file generation and startup.

use super::credentials::CredentialStore;
use crate::env::{self, stack};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Key under which the database password is cached
pub const POSTGRES_PASSWORD_KEY: &str = "postgres";

/// Database backing the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// External PostgreSQL container
    #[default]
    Postgresql,
    /// Embedded Derby database inside the application container
    Derby,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::Postgresql => f.write_str("postgresql"),
            DatabaseType::Derby => f.write_str("derby"),
        }
    }
}

impl FromStr for DatabaseType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseType::Postgresql),
            "derby" => Ok(DatabaseType::Derby),
            other => Err(ConfigError::Invalid(format!("unknown database type {:?}", other))),
        }
    }
}

/// Invalid deployment parameters
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot determine home directory; pass --data-dir")]
    NoHomeDirectory,
}

/// Everything needed to render files and start a deployment.
///
/// Owns the [`CredentialStore`], so passwords and the join key stay stable
/// for as long as the config lives.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub version: String,
    pub port: u16,
    pub data_dir: PathBuf,
    output_dir: PathBuf,
    pub database_type: DatabaseType,
    pub postgres_user: String,
    pub postgres_db: String,
    pub registry: String,
    pub db_image: String,
    credentials: CredentialStore,
}

impl DeploymentConfig {
    /// Start building a config for `version`
    pub fn builder(version: impl Into<String>) -> DeploymentConfigBuilder {
        DeploymentConfigBuilder::new(version)
    }

    /// Directory receiving `.env`, the compose manifest and the reference `system.yaml`
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn use_postgres(&self) -> bool {
        self.database_type == DatabaseType::Postgresql
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Password for `key`, stable for this config
    pub fn generate_password(&self, key: &str) -> String {
        self.credentials.generate_password(key)
    }

    pub fn get_password(&self, key: &str) -> String {
        self.credentials.get_password(key)
    }

    /// Database password
    pub fn postgres_password(&self) -> String {
        self.credentials.get_password(POSTGRES_PASSWORD_KEY)
    }

    /// Join key, generated on first call unless provided
    pub fn generate_join_key(&self) -> String {
        self.credentials.generate_join_key()
    }

    /// Application image reference
    pub fn app_image(&self) -> String {
        format!("{}/jfrog/artifactory-oss:{}", self.registry, self.version)
    }

    /// Version as a volume suffix: `7.9.2` becomes `v7_9_2`
    pub fn version_suffix(&self) -> String {
        format!("v{}", self.version.replace(['.', '-'], "_"))
    }

    /// JDBC URL of the database container
    pub fn jdbc_url(&self) -> String {
        format!(
            "jdbc:postgresql://{}:{}/{}",
            stack::DB_CONTAINER,
            stack::DB_INTERNAL_PORT,
            self.postgres_db
        )
    }
}

/// Builder for [`DeploymentConfig`]
#[derive(Debug, Clone)]
pub struct DeploymentConfigBuilder {
    version: String,
    port: u16,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    database_type: DatabaseType,
    postgres_user: String,
    postgres_db: String,
    registry: String,
    db_image: String,
    join_key: Option<String>,
}

impl DeploymentConfigBuilder {
    fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            port: stack::APP_INTERNAL_PORT,
            data_dir: None,
            output_dir: None,
            database_type: DatabaseType::Postgresql,
            postgres_user: "artifactory".to_string(),
            postgres_db: "artifactory".to_string(),
            registry: stack::DEFAULT_REGISTRY.to_string(),
            db_image: stack::DEFAULT_DB_IMAGE.to_string(),
            join_key: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn database_type(mut self, database_type: DatabaseType) -> Self {
        self.database_type = database_type;
        self
    }

    pub fn postgres_user(mut self, user: impl Into<String>) -> Self {
        self.postgres_user = user.into();
        self
    }

    pub fn postgres_db(mut self, db: impl Into<String>) -> Self {
        self.postgres_db = db.into();
        self
    }

    pub fn registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn db_image(mut self, image: impl Into<String>) -> Self {
        self.db_image = image.into();
        self
    }

    /// Use this join key instead of generating one
    pub fn join_key(mut self, key: impl Into<String>) -> Self {
        self.join_key = Some(key.into());
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty version, port 0, or
    /// empty database user/name with PostgreSQL, and
    /// [`ConfigError::NoHomeDirectory`] when no data directory can be derived.
    pub fn build(self) -> Result<DeploymentConfig, ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be between 1 and 65535".to_string()));
        }
        if self.database_type == DatabaseType::Postgresql
            && (self.postgres_user.trim().is_empty() || self.postgres_db.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "database user and name must not be empty".to_string(),
            ));
        }
        if let Some(key) = &self.join_key
            && key.trim().is_empty()
        {
            return Err(ConfigError::Invalid("join key must not be empty".to_string()));
        }

        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => env::default_data_dir(&env::home_dir().ok_or(ConfigError::NoHomeDirectory)?),
        };
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| env::default_output_dir(&data_dir));

        let credentials = match self.join_key {
            Some(key) => CredentialStore::with_join_key(key),
            None => CredentialStore::new(),
        };

        Ok(DeploymentConfig {
            version: self.version,
            port: self.port,
            data_dir,
            output_dir,
            database_type: self.database_type,
            postgres_user: self.postgres_user,
            postgres_db: self.postgres_db,
            registry: self.registry,
            db_image: self.db_image,
            credentials,
        })
    }
}
