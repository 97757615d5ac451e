//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with PORTAL_, sections split by `__`)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database password and the session key should be kept in
//! environment variables (`DATABASE_URL`, `SECRET_KEY`), not in the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Portal Desa".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, overridden by the DATABASE_URL env var
    pub url: String,
    pub max_connections: u32,
    /// Create missing tables at start-up
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://portal.db?mode=rwc".to_string(),
            max_connections: 10,
            auto_migrate: true,
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum failed login attempts before account lockout
    pub max_failed_logins: u32,
    /// Account lockout duration in minutes
    pub lockout_duration_minutes: u32,
    /// Session cookie lifetime in minutes (default: 8 hours)
    pub session_timeout_minutes: u32,
    /// Only send the session cookie over HTTPS
    pub cookie_secure: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: 5,
            lockout_duration_minutes: 15,
            session_timeout_minutes: 480,
            cookie_secure: false,
        }
    }
}

/// Citizen CSV import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Rows per insert call
    pub batch_size: usize,
    /// Validation messages shown before truncating
    pub max_reported_errors: usize,
    /// Maximum upload size in KB
    pub max_upload_kb: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_reported_errors: 5,
            max_upload_kb: 2048,
        }
    }
}

/// Letter numbering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LettersConfig {
    /// Attempts at allocating a sequence number before giving up
    pub sequence_retry_limit: u32,
}

impl Default for LettersConfig {
    fn default() -> Self {
        Self {
            sequence_retry_limit: 5,
        }
    }
}

/// Public website configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsiteConfig {
    /// Lifetime of cached public pages in seconds
    pub cache_ttl_seconds: u64,
    /// Published news items shown on the public page
    pub news_on_home: u64,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 60,
            news_on_home: 5,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub import: ImportConfig,
    pub letters: LettersConfig,
    pub website: WebsiteConfig,
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        use config::FileFormat;

        let config = Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., PORTAL_IMPORT__BATCH_SIZE, PORTAL_SITE__NAME
            .add_source(
                Environment::with_prefix("PORTAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

/// Initialize application configuration
///
/// Triggers the lazy load of the config file and logs the result.
pub fn init() {
    let config = get_config();
    log::info!("Configuration loaded: site.name = {}", config.site.name);
}

/// Get the current application configuration
pub fn get_config() -> AppConfig {
    APP_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

pub fn server() -> ServerConfig {
    get_config().server
}

pub fn database() -> DatabaseConfig {
    get_config().database
}

pub fn security() -> SecurityConfig {
    get_config().security
}

pub fn import() -> ImportConfig {
    get_config().import
}

pub fn letters() -> LettersConfig {
    get_config().letters
}

pub fn website() -> WebsiteConfig {
    get_config().website
}
