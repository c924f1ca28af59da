//! # Node Configuration
//!
//! One `NodeConfig` for every subsystem. Sources are applied in order:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config` or `RS_CONFIG`)
//! 3. Environment variables (`RS_*`, `USE_SSL`, `SSL_CERT_PATH`, `SSL_KEY_PATH`)
//! 4. CLI flags
//!
//! ## Security Requirements
//!
//! - Upstream URLs and service credentials MUST be set; there are no usable defaults
//! - The service password is never printed by `Debug`

use rs_01_storage_engine::StorageConfig;
use rs_02_identity_client::IdentityConfig;
use rs_03_protocol_gateway::{GatewayConfig, TlsSettings};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// WebSocket listener.
    pub server: ServerConfig,
    /// Optional TLS for `wss://`.
    pub tls: TlsConfig,
    /// Backing database.
    pub storage: StorageSection,
    /// External identity service.
    pub upstream: UpstreamConfig,
    /// Periodic background tasks.
    pub maintenance: MaintenanceConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// WebSocket listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_message_size: usize,
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub ping_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub close_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 16666,
            max_message_size: 10 * 1024 * 1024,
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(40),
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// TLS settings. Problems here downgrade to plaintext instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database_url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    pub audit_queue_capacity: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        let defaults = StorageConfig::default();
        Self {
            database_url: defaults.database_url,
            min_connections: defaults.min_connections,
            max_connections: defaults.max_connections,
            acquire_timeout: defaults.acquire_timeout,
            audit_queue_capacity: defaults.audit_queue_capacity,
        }
    }
}

/// Identity service settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub auth_url: String,
    pub uinfo_url: String,
    pub username: String,
    pub password: String,
    #[serde(with = "humantime_serde")]
    pub login_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub lookup_timeout: Duration,
    pub min_token_length: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let defaults = IdentityConfig::default();
        Self {
            auth_url: defaults.auth_url,
            uinfo_url: defaults.uinfo_url,
            username: defaults.username,
            password: defaults.password,
            login_timeout: defaults.login_timeout,
            lookup_timeout: defaults.lookup_timeout,
            min_token_length: defaults.min_token_length,
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("auth_url", &self.auth_url)
            .field("uinfo_url", &self.uinfo_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_timeout", &self.login_timeout)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("min_token_length", &self.min_token_length)
            .finish()
    }
}

/// Intervals for the maintenance scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Forced upstream re-login.
    #[serde(with = "humantime_serde")]
    pub session_refresh_interval: Duration,
    /// Registry report.
    #[serde(with = "humantime_serde")]
    pub registry_sweep_interval: Duration,
    /// Database probe.
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            session_refresh_interval: Duration::from_secs(30 * 60),
            registry_sweep_interval: Duration::from_secs(5 * 60),
            health_check_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// Log output settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML text. Missing sections and keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RS_HOST") {
            self.server.host = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "RS_HOST",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("RS_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "RS_PORT",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("USE_SSL") {
            self.tls.enabled = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                name: "USE_SSL",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("SSL_CERT_PATH") {
            self.tls.cert_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("SSL_KEY_PATH") {
            self.tls.key_path = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("RS_DATABASE_URL") {
            self.storage.database_url = value;
        }
        if let Some(value) = lookup("RS_AUTH_URL") {
            self.upstream.auth_url = value;
        }
        if let Some(value) = lookup("RS_UINFO_URL") {
            self.upstream.uinfo_url = value;
        }
        if let Some(value) = lookup("RS_UPSTREAM_USERNAME") {
            self.upstream.username = value;
        }
        if let Some(value) = lookup("RS_UPSTREAM_PASSWORD") {
            self.upstream.password = value;
        }
        if let Some(value) = lookup("RS_LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    /// Check the configuration once, before anything starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.server.port == 0 {
            return invalid("server.port must be non-zero");
        }
        if self.server.max_message_size == 0 {
            return invalid("server.max_message_size must be non-zero");
        }
        if self.server.ping_interval.is_zero()
            || self.server.ping_timeout.is_zero()
            || self.server.close_timeout.is_zero()
        {
            return invalid("server timeouts must be non-zero");
        }
        if self.storage.database_url.trim().is_empty() {
            return invalid("storage.database_url is required");
        }
        if self.storage.max_connections == 0 {
            return invalid("storage.max_connections must be non-zero");
        }
        if self.storage.max_connections < self.storage.min_connections {
            return invalid("storage.max_connections must be >= storage.min_connections");
        }
        if self.storage.acquire_timeout.is_zero() {
            return invalid("storage.acquire_timeout must be non-zero");
        }
        if self.upstream.auth_url.trim().is_empty() || self.upstream.uinfo_url.trim().is_empty() {
            return invalid("upstream.auth_url and upstream.uinfo_url are required");
        }
        if self.upstream.username.is_empty() || self.upstream.password.is_empty() {
            return invalid("upstream.username and upstream.password are required");
        }
        if self.upstream.min_token_length == 0 {
            return invalid("upstream.min_token_length must be non-zero");
        }
        if self.upstream.login_timeout.is_zero() || self.upstream.lookup_timeout.is_zero() {
            return invalid("upstream timeouts must be non-zero");
        }
        if self.maintenance.session_refresh_interval.is_zero()
            || self.maintenance.registry_sweep_interval.is_zero()
            || self.maintenance.health_check_interval.is_zero()
        {
            return invalid("maintenance intervals must be non-zero");
        }
        Ok(())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.server.host,
            port: self.server.port,
            max_message_size: self.server.max_message_size,
            ping_interval: self.server.ping_interval,
            ping_timeout: self.server.ping_timeout,
            close_timeout: self.server.close_timeout,
        }
    }

    pub fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            enabled: self.tls.enabled,
            cert_path: self.tls.cert_path.clone(),
            key_path: self.tls.key_path.clone(),
        }
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_url: self.storage.database_url.clone(),
            min_connections: self.storage.min_connections,
            max_connections: self.storage.max_connections,
            acquire_timeout: self.storage.acquire_timeout,
            audit_queue_capacity: self.storage.audit_queue_capacity,
        }
    }

    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig {
            auth_url: self.upstream.auth_url.clone(),
            uinfo_url: self.upstream.uinfo_url.clone(),
            username: self.upstream.username.clone(),
            password: self.upstream.password.clone(),
            login_timeout: self.upstream.login_timeout,
            lookup_timeout: self.upstream.lookup_timeout,
            min_token_length: self.upstream.min_token_length,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Durations as human-readable strings ("30m", "10s", "1h 30m").
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}
