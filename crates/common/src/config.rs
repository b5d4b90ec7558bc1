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
    /// Redis configuration. Absent means in-process limiter and cache.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Vote limit and cache settings.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Submission webhook.
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
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
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Super admin created on startup when no account has this username.
    #[serde(default)]
    pub bootstrap_admin: Option<String>,
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

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Where uploaded media and exports live.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// URL host stored in front of every media reference.
    #[serde(default = "default_url_host")]
    pub url_host: String,
    /// Root for uploaded images (`/public/static/`).
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Root for uploaded files (`/public/file/`).
    #[serde(default = "default_file_dir")]
    pub file_dir: PathBuf,
    /// Root for generated exports (`/public/xlsx/`).
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url_host: default_url_host(),
            static_dir: default_static_dir(),
            file_dir: default_file_dir(),
            export_dir: default_export_dir(),
        }
    }
}

/// Vote limit and cache tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Hours added to UTC before taking the calendar date of a daily limit.
    #[serde(default = "default_day_offset_hours")]
    pub day_offset_hours: i32,
    /// Lifetime of cached questions and options.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Requests per minute a single client may issue.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            day_offset_hours: default_day_offset_hours(),
            cache_ttl_secs: default_cache_ttl(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// Submission webhook configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving a POST per stored answer sheet.
    pub url: String,
    /// Shared secret for the signature header.
    pub secret: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "survey".to_string()
}

fn default_url_host() -> String {
    "http://localhost:3000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./public/static")
}

fn default_file_dir() -> PathBuf {
    PathBuf::from("./public/file")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./public/xlsx")
}

const fn default_day_offset_hours() -> i32 {
    8
}

const fn default_cache_ttl() -> u64 {
    600
}

const fn default_requests_per_minute() -> u32 {
    120
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SURVEY_ENV`)
    /// 3. Environment variables with `SURVEY__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("SURVEY_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SURVEY")
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
                config::Environment::with_prefix("SURVEY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_sections_default() {
        let raw = config::Config::builder()
            .set_override("server.url", "http://localhost:3000")
            .unwrap()
            .set_override("database.url", "postgres://localhost/survey")
            .unwrap()
            .build()
            .unwrap();
        let config: Config = raw.try_deserialize().unwrap();

        assert!(config.redis.is_none());
        assert!(config.webhook.is_none());
        assert_eq!(config.server.port, 3000);
        assert!(config.server.bootstrap_admin.is_none());
        assert_eq!(config.limits.day_offset_hours, 8);
        assert_eq!(config.storage.static_dir, PathBuf::from("./public/static"));
    }
}
