use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 4000;
const CONFIG_DIR: &str = "config";
const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com";
const DEV_DEFAULT_JWT_SECRET: &str = "development_only_seller_token_secret_change_me_before_deploying";

/// Where categories, cars and products are persisted.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// sea-orm over `database_url` (SQLite or Postgres)
    Sql,
    /// Process-local maps; contents are lost on restart
    Memory,
}

/// Where product images are stored.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    Cloudinary,
    Memory,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    /// Database connection URL, used when `storage_backend = "sql"`
    pub database_url: String,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default = "default_image_backend")]
    pub image_backend: ImageBackend,

    #[serde(default)]
    pub cloudinary_cloud_name: Option<String>,
    #[serde(default)]
    pub cloudinary_api_key: Option<String>,
    #[serde(default)]
    pub cloudinary_api_secret: Option<String>,

    /// Folder prefix for uploaded product images
    #[serde(default)]
    pub cloudinary_folder: Option<String>,

    #[serde(default = "default_cloudinary_base_url")]
    #[validate(url)]
    pub cloudinary_base_url: String,

    /// Timeout for a single object-storage call (seconds)
    #[serde(default = "default_storage_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub storage_timeout_secs: u64,

    /// Base URL handed out by the in-memory image store
    #[serde(default = "default_memory_image_base_url")]
    pub memory_image_base_url: String,

    /// Seller (admin panel) login
    #[validate(email)]
    pub seller_email: String,
    #[validate(length(min = 8))]
    pub seller_password: String,

    /// Secret for signing seller tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Seller token lifetime in seconds
    #[serde(default = "default_jwt_expiration_secs")]
    #[validate(range(min = 300, max = 2_592_000))]
    pub jwt_expiration_secs: u64,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Maximum request body size in bytes (multipart uploads included)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl AppConfig {
    /// Configuration with built-in defaults, suitable for tests and local runs.
    pub fn new(
        database_url: String,
        seller_email: String,
        seller_password: String,
        jwt_secret: String,
        environment: String,
    ) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            storage_backend: default_storage_backend(),
            database_url,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            image_backend: default_image_backend(),
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            cloudinary_folder: None,
            cloudinary_base_url: default_cloudinary_base_url(),
            storage_timeout_secs: default_storage_timeout_secs(),
            memory_image_base_url: default_memory_image_base_url(),
            seller_email,
            seller_password,
            jwt_secret,
            jwt_expiration_secs: default_jwt_expiration_secs(),
            cors_allowed_origins: None,
            max_body_size: default_max_body_size(),
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

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    /// Parsed CORS origins; empty when none are configured
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.image_backend == ImageBackend::Cloudinary {
            let required = [
                ("cloudinary_cloud_name", &self.cloudinary_cloud_name),
                ("cloudinary_api_key", &self.cloudinary_api_key),
                ("cloudinary_api_secret", &self.cloudinary_api_secret),
            ];
            for (field, value) in required {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    let mut err = ValidationError::new("cloudinary_credentials_required");
                    err.message = Some(
                        "Cloudinary credentials are required when image_backend = \"cloudinary\""
                            .into(),
                    );
                    errors.add(field, err);
                }
            }
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.is_production() && self.storage_backend == StorageBackend::Memory {
            let mut err = ValidationError::new("memory_storage_in_production");
            err.message = Some("storage_backend = \"memory\" is not allowed in production".into());
            errors.add("storage_backend", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Sql
}

fn default_image_backend() -> ImageBackend {
    ImageBackend::Cloudinary
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
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_cloudinary_base_url() -> String {
    DEFAULT_CLOUDINARY_BASE_URL.to_string()
}

fn default_storage_timeout_secs() -> u64 {
    30
}

fn default_memory_image_base_url() -> String {
    "http://localhost:4000/media".to_string()
}

fn default_jwt_expiration_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_max_body_size() -> usize {
    20 * 1024 * 1024
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `config/default.toml`
/// 3. `config/{RUN_ENV}.toml`
/// 4. Environment variables (`APP__*`)
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

    let mut builder = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    // development only
    if run_env.eq_ignore_ascii_case(DEFAULT_ENV) {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
    }

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        storage = ?app_config.storage_backend,
        images = ?app_config.image_backend,
        "Configuration loaded successfully"
    );
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "seller@example.com".into(),
            "correct horse battery".into(),
            "a_test_secret_that_is_long_enough_for_hs256_signing".into(),
            "production".into(),
        )
    }

    #[test]
    fn base_config_passes_field_validation() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn cloudinary_backend_requires_credentials() {
        let cfg = base_config();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("cloudinary_cloud_name"));
        assert!(errors.field_errors().contains_key("cloudinary_api_secret"));
    }

    #[test]
    fn memory_images_need_no_credentials() {
        let mut cfg = base_config();
        cfg.image_backend = ImageBackend::Memory;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_rejects_memory_storage_and_dev_secret() {
        let mut cfg = base_config();
        cfg.image_backend = ImageBackend::Memory;
        cfg.storage_backend = StorageBackend::Memory;
        cfg.jwt_secret = DEV_DEFAULT_JWT_SECRET.into();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("storage_backend"));
        assert!(errors.field_errors().contains_key("jwt_secret"));
    }

    #[test]
    fn short_secret_and_bad_email_fail_validation() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        cfg.seller_email = "not-an-email".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));
        assert!(errors.field_errors().contains_key("seller_email"));
    }

    #[test]
    fn cors_origins_are_trimmed_and_filtered() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some(" https://shop.example , ,https://admin.example".into());
        assert_eq!(
            cfg.cors_origins(),
            vec!["https://shop.example", "https://admin.example"]
        );
    }
}
