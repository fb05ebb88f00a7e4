//! Configuration module for sharevault.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, VaultError};

/// Minimum share token size in bytes (128 bits of entropy).
pub const MIN_TOKEN_BYTES: usize = 16;

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/sharevault.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local object store.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Bucket/location identifier recorded on every file.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_storage_root() -> String {
    "data/objects".to_string()
}

fn default_bucket() -> String {
    "local".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            bucket: default_bucket(),
        }
    }
}

/// Upload policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,
    /// Allowed MIME types (`image/*` style wildcards allowed). Empty allows all.
    #[serde(default)]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_file_size() -> u64 {
    100
}

impl UploadConfig {
    /// Maximum upload size in bytes.
    pub fn max_file_size_bytes(&self) -> i64 {
        (self.max_file_size_mb.saturating_mul(1024 * 1024)).min(i64::MAX as u64) as i64
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size(),
            allowed_mime_types: Vec::new(),
        }
    }
}

/// Directory tree configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    /// Maximum nesting depth; also bounds every ancestor walk.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    100
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Share link configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Random bytes per token.
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Token generation attempts before giving up on collisions.
    #[serde(default = "default_max_token_attempts")]
    pub max_token_attempts: usize,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_password_memory")]
    pub password_memory_kib: u32,
    /// Argon2 time cost (iterations).
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
    /// Argon2 parallelism.
    #[serde(default = "default_password_parallelism")]
    pub password_parallelism: u32,
}

fn default_token_bytes() -> usize {
    32
}

fn default_max_token_attempts() -> usize {
    5
}

fn default_password_memory() -> u32 {
    19456 // 19 MiB
}

fn default_password_iterations() -> u32 {
    2
}

fn default_password_parallelism() -> u32 {
    1
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            token_bytes: default_token_bytes(),
            max_token_attempts: default_max_token_attempts(),
            password_memory_kib: default_password_memory(),
            password_iterations: default_password_iterations(),
            password_parallelism: default_password_parallelism(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/sharevault.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload policy.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Directory tree limits.
    #[serde(default)]
    pub tree: TreeConfig,
    /// Share link settings.
    #[serde(default)]
    pub shares: ShareConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(VaultError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| VaultError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `SHAREVAULT_DATABASE_PATH`
    /// - `SHAREVAULT_STORAGE_ROOT`
    /// - `SHAREVAULT_LOG_LEVEL`
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env("SHAREVAULT_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(root) = non_empty_env("SHAREVAULT_STORAGE_ROOT") {
            self.storage.root = root;
        }
        if let Some(level) = non_empty_env("SHAREVAULT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - share tokens would carry less than 128 bits of entropy
    /// - the tree depth guard is zero
    /// - the Argon2 work factors are rejected by the hasher
    pub fn validate(&self) -> Result<()> {
        if self.shares.token_bytes < MIN_TOKEN_BYTES {
            return Err(VaultError::Config(format!(
                "shares.token_bytes must be at least {MIN_TOKEN_BYTES}"
            )));
        }
        if self.shares.max_token_attempts == 0 {
            return Err(VaultError::Config(
                "shares.max_token_attempts must be positive".to_string(),
            ));
        }
        if self.tree.max_depth == 0 {
            return Err(VaultError::Config(
                "tree.max_depth must be positive".to_string(),
            ));
        }
        argon2::Params::new(
            self.shares.password_memory_kib,
            self.shares.password_iterations,
            self.shares.password_parallelism,
            None,
        )
        .map_err(|e| VaultError::Config(format!("invalid password hashing parameters: {e}")))?;
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
