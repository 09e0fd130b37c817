use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_NOTIFY_ATTEMPTS: u32 = 3;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_NOTIFY_BACKOFF_MS: u64 = 500;
const DEFAULT_ALLOCATOR_RETRIES: u32 = 5;
const DEFAULT_ALLOCATOR_BACKOFF_MS: u64 = 1;
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (SQLite for dev/test, Postgres in production)
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Externally reachable base URL, used for supplier portal links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Webhook notification: attempts per supplier
    #[serde(default = "default_notify_attempts")]
    pub notify_max_attempts: u32,

    /// Webhook notification: per-attempt timeout (seconds)
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    /// Webhook notification: backoff unit between attempts (milliseconds,
    /// multiplied by the attempt number)
    #[serde(default = "default_notify_backoff_ms")]
    pub notify_backoff_ms: u64,

    /// Order number allocation: retry budget for collision handling
    #[serde(default = "default_allocator_retries")]
    pub order_no_max_retries: u32,

    /// Order number allocation: backoff unit between retries (milliseconds)
    #[serde(default = "default_allocator_backoff_ms")]
    pub order_no_backoff_ms: u64,

    /// Directory for database backup snapshots
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_public_base_url() -> String {
    format!("http://localhost:{}", DEFAULT_PORT)
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_notify_attempts() -> u32 {
    DEFAULT_NOTIFY_ATTEMPTS
}
fn default_notify_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}
fn default_notify_backoff_ms() -> u64 {
    DEFAULT_NOTIFY_BACKOFF_MS
}
fn default_allocator_retries() -> u32 {
    DEFAULT_ALLOCATOR_RETRIES
}
fn default_allocator_backoff_ms() -> u64 {
    DEFAULT_ALLOCATOR_BACKOFF_MS
}
fn default_backup_dir() -> String {
    DEFAULT_BACKUP_DIR.to_string()
}

impl AppConfig {
    /// Construct a configuration programmatically (used by tests)
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            public_base_url: format!("http://{}:{}", "localhost", port),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            notify_max_attempts: default_notify_attempts(),
            notify_timeout_secs: default_notify_timeout_secs(),
            notify_backoff_ms: default_notify_backoff_ms(),
            order_no_max_retries: default_allocator_retries(),
            order_no_backoff_ms: default_allocator_backoff_ms(),
            backup_dir: default_backup_dir(),
            cors_allowed_origins: None,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// True when the configured datastore is a local SQLite file, which is a
    /// precondition for the snapshot backup utility.
    pub fn sqlite_path(&self) -> Option<String> {
        let raw = self.database_url.strip_prefix("sqlite://")?;
        let path = raw.split('?').next().unwrap_or(raw);
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(path.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initialize the tracing subscriber from configuration.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("rfq_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://rfq.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // jwt_secret has no production default; in development fall back to a
    // well-known local-only value so the server starts out of the box.
    let mut app_config: AppConfig = match config.get_string("jwt_secret") {
        Ok(_) => config.try_deserialize()?,
        Err(_) if run_env.eq_ignore_ascii_case(DEFAULT_ENV) => {
            let config = Config::builder()
                .add_source(config)
                .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
                .build()?;
            config.try_deserialize()?
        }
        Err(_) => {
            error!("JWT secret is not configured. Set APP__JWT_SECRET with a secure random string (minimum 64 characters).");
            return Err(AppConfigError::Load(ConfigError::NotFound(
                "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable.".into(),
            )));
        }
    };

    if app_config.public_base_url.ends_with('/') {
        app_config.public_base_url.pop();
    }

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
