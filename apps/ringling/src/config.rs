//! # Configuration
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config ringling.toml`)
//! 3. Environment variables
//!
//! CLI flags are applied on top by the `cli` module.
//!
//! ## Environment Variables
//!
//! - `RINGLING_DATABASE`: path of the redb database file
//! - `RINGLING_BACKEND`: `redb` or `memory`
//! - `RINGLING_RATE_LIMIT`: requests per second (0 disables limiting)
//! - `RINGLING_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `RINGLING_LOG_FORMAT`: `text` or `json`
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8888
//!
//! [storage]
//! backend = "redb"
//! path = "/var/lib/ringling/registry.redb"
//!
//! [api]
//! rate_limit = 100
//! cors_origins = ["https://dashboard.example.com"]
//! ```

use crate::error::AppError;
use ringling_core::StorageBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default request body limit: 16 MiB, room for serialized models.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "ringling=info,ringling_core=info,tower_http=debug";

// =============================================================================
// SECTIONS
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// `[server]`: where the HTTP API listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `[storage]`: which store backs the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: PathBuf::from("ringling.redb"),
        }
    }
}

impl StorageConfig {
    /// Open the configured store.
    pub fn open(&self) -> Result<StorageBackend, AppError> {
        match self.backend {
            BackendKind::Redb => Ok(StorageBackend::redb(&self.path)?),
            BackendKind::Memory => Ok(StorageBackend::memory()),
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Disk-backed redb database.
    Redb,
    /// Volatile in-memory tables.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Redb => f.write_str("redb"),
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(BackendKind::Redb),
            "memory" => Ok(BackendKind::Memory),
            other => Err(AppError::config(format!(
                "unknown backend '{}' (expected redb or memory)",
                other
            ))),
        }
    }
}

/// `[api]`: HTTP hardening knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Requests per second across all clients; 0 disables limiting.
    pub rate_limit: u32,
    /// Allowed CORS origins. Empty means localhost only; `["*"]` allows all.
    pub cors_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit: 100,
            cors_origins: Vec::new(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        }
    }
}

/// `[logging]`: tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::config(format!(
                "unknown log format '{}' (expected text or json)",
                other
            ))),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Defaults, then the file at `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| AppError::config(format!("'{}': {}", path.display(), e)))
    }

    /// Parse TOML text. Missing keys keep their defaults; unknown keys fail.
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::config(e.to_string()))
    }

    /// Apply `RINGLING_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("RINGLING_DATABASE") {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("RINGLING_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(limit) = lookup("RINGLING_RATE_LIMIT") {
            self.api.rate_limit = limit.trim().parse().map_err(|_| {
                AppError::config(format!(
                    "RINGLING_RATE_LIMIT must be a non-negative integer, got '{}'",
                    limit
                ))
            })?;
        }
        if let Some(origins) = lookup("RINGLING_CORS_ORIGINS") {
            self.api.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(format) = lookup("RINGLING_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
