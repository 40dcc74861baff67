//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Consistency and policy switches.
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    /// Administrator account created at startup, if configured.
    #[serde(default)]
    pub admin: Option<AdminSettings>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Local media storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded media is written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix media is served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

/// Bootstrap administrator, usually set through `RAPPORT__ADMIN__*`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSettings {
    /// Handle of the administrator account.
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Contact address; an existing account with it is left untouched.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    #[serde(default = "default_admin_name")]
    pub name: String,
}

/// Consistency and policy switches for the engagement layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyConfig {
    /// How many times an operation that lost a write race is retried.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    /// Whether accounts with the `restricted` role may follow or be followed.
    #[serde(default)]
    pub restricted_can_follow: bool,
    /// Whether an account may review its own profile.
    #[serde(default)]
    pub allow_self_review: bool,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
            restricted_can_follow: false,
            allow_self_review: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

const fn default_conflict_retries() -> u32 {
    3
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `RAPPORT_ENV`)
    /// 3. Environment variables with `RAPPORT__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("RAPPORT_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RAPPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("RAPPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
