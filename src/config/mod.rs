//! Configuration management
//!
//! This module handles loading and parsing configuration for PetBeacon.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The resulting
//! `Config` is built once in `main` and handed to the components that need it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Idle timeout applied to client sessions when none is configured
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 900;

/// Longest accepted idle timeout (30 days)
pub const MAX_IDLE_TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Session token entropy in bytes (256 bits)
pub const MIN_TOKEN_BYTES: usize = 32;

/// Largest token whose hex form fits the `session_token VARCHAR(255)` column
pub const MAX_TOKEN_BYTES: usize = 64;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session guard configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Outbound e-mail (optional; finder reports fall back to links only)
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    /// First administrator created on an empty store
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL encoded into pet QR codes
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/petbeacon.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session is ended (at most 30 days)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Random bytes per session token (32 to 64)
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Name of the client session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Key used to sign the client session cookie.
    /// When empty a random key is generated at startup.
    #[serde(default)]
    pub secret_key: String,
    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            token_bytes: default_token_bytes(),
            cookie_name: default_cookie_name(),
            secret_key: String::new(),
            secure_cookie: false,
        }
    }
}

fn default_idle_timeout() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECONDS
}

fn default_token_bytes() -> usize {
    MIN_TOKEN_BYTES
}

fn default_cookie_name() -> String {
    "session".to_string()
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// SMTP settings for owner notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address
    pub from: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_from_name() -> String {
    "PetBeacon".to_string()
}

/// Bootstrap administrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides,
    /// then validate it.
    ///
    /// Environment variables follow the pattern:
    /// - PETBEACON_SERVER_HOST
    /// - PETBEACON_SERVER_PORT
    /// - PETBEACON_SERVER_PUBLIC_URL
    /// - PETBEACON_DATABASE_DRIVER
    /// - PETBEACON_DATABASE_URL
    /// - PETBEACON_SESSION_IDLE_TIMEOUT_SECONDS
    /// - PETBEACON_SESSION_SECRET_KEY
    /// - PETBEACON_UPLOAD_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session guard cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.token_bytes < MIN_TOKEN_BYTES {
            return Err(ConfigError::ValidationError(format!(
                "session.token_bytes must be at least {} (got {})",
                MIN_TOKEN_BYTES, self.session.token_bytes
            )));
        }
        if self.session.token_bytes > MAX_TOKEN_BYTES {
            return Err(ConfigError::ValidationError(format!(
                "session.token_bytes must be at most {} (got {})",
                MAX_TOKEN_BYTES, self.session.token_bytes
            )));
        }
        if self.session.idle_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "session.idle_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.session.idle_timeout_seconds > MAX_IDLE_TIMEOUT_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "session.idle_timeout_seconds must be at most {} (got {})",
                MAX_IDLE_TIMEOUT_SECONDS, self.session.idle_timeout_seconds
            )));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.cookie_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("PETBEACON_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PETBEACON_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(public_url) = std::env::var("PETBEACON_SERVER_PUBLIC_URL") {
            self.server.public_url = public_url;
        }
        if let Ok(cors_origin) = std::env::var("PETBEACON_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("PETBEACON_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("PETBEACON_DATABASE_URL") {
            self.database.url = url;
        }

        // Session configuration
        if let Ok(timeout) = std::env::var("PETBEACON_SESSION_IDLE_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.session.idle_timeout_seconds = timeout;
            }
        }
        if let Ok(key) = std::env::var("PETBEACON_SESSION_SECRET_KEY") {
            self.session.secret_key = key;
        }

        // Upload configuration
        if let Ok(path) = std::env::var("PETBEACON_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
