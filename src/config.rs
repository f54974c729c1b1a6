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
const DEFAULT_STORE_URL: &str = "http://localhost:8090";
const DEFAULT_AI_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_AI_MODEL: &str = "gpt-4o-2024-08-06";
const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_JPEG_QUALITY: u8 = 80;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the backing collection store
    #[validate(url)]
    pub store_url: String,

    /// Service token used to authenticate against the collection store
    pub store_token: Option<String>,

    /// Base URL of the AI completion API
    #[validate(url)]
    pub ai_api_url: String,

    /// API key for the AI completion API (analysis is disabled without it)
    pub ai_api_key: Option<String>,

    /// Model identifier sent to the AI completion API
    pub ai_model: String,

    /// Public URL of the web frontend, used as the QR-code target on labels
    #[validate(url)]
    pub app_base_url: String,

    /// JPEG quality (1-100) applied when normalizing uploaded images
    #[validate(range(min = 1, max = 100))]
    pub jpeg_quality: u8,

    /// Timeout in seconds for outbound HTTP calls (store + AI)
    #[validate(range(min = 1, max = 600))]
    pub http_timeout_secs: u64,

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

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initializes the tracing subscriber.
///
/// Honors RUST_LOG when set; otherwise derives a default directive from the
/// configured log level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("stockroom_api={},tower_http=debug", level);
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
    // Support both RUN_ENV and APP_ENV for selecting config profile
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
        .set_default("store_url", DEFAULT_STORE_URL)?
        .set_default("ai_api_url", DEFAULT_AI_API_URL)?
        .set_default("ai_model", DEFAULT_AI_MODEL)?
        .set_default("app_base_url", DEFAULT_APP_BASE_URL)?
        .set_default("jpeg_quality", DEFAULT_JPEG_QUALITY as i64)?
        .set_default("http_timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS as i64)?
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

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            store_url: DEFAULT_STORE_URL.to_string(),
            store_token: None,
            ai_api_url: DEFAULT_AI_API_URL.to_string(),
            ai_api_key: None,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_jpeg_quality() {
        let mut cfg = base_config();
        cfg.jpeg_quality = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn permissive_cors_only_in_development_or_explicit_override() {
        let mut cfg = base_config();
        assert!(cfg.should_allow_permissive_cors());

        cfg.environment = "production".to_string();
        assert!(!cfg.should_allow_permissive_cors());

        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
