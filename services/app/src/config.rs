use coach_core::{AppConfig, EndpointStrategy, SourceEnv};
use reqwest::Url;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Whether this is a production build. Debug instrumentation is on otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// The mode this binary was compiled in.
    pub fn compiled() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }

    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub origin: Url,
    pub source_env: SourceEnv,
    pub build_mode: BuildMode,
    pub log_level: Level,
    pub app: AppConfig,
}

fn parse_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse::<bool>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a boolean", value))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_strategy(value: &str) -> Result<EndpointStrategy, ConfigError> {
    match value.to_lowercase().as_str() {
        "custom" => Ok(EndpointStrategy::CustomFetch),
        "endpoint" => Ok(EndpointStrategy::DirectEndpoint),
        _ => Err(ConfigError::InvalidValue(
            "TOKEN_SOURCE_STRATEGY".to_string(),
            format!("'{}' is not one of 'custom' or 'endpoint'", value),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let origin_str =
            std::env::var("APP_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let origin = Url::parse(&origin_str)
            .map_err(|e| ConfigError::InvalidValue("APP_ORIGIN".to_string(), e.to_string()))?;

        // Presence alone enables sandbox mode, even when the value is empty.
        let sandbox_endpoint = std::env::var("CONN_DETAILS_ENDPOINT").ok();
        let strategy = match std::env::var("TOKEN_SOURCE_STRATEGY") {
            Ok(value) => parse_strategy(&value)?,
            Err(_) => EndpointStrategy::default(),
        };

        let build_mode = match std::env::var("APP_ENV") {
            Ok(value) if value.eq_ignore_ascii_case("production") => BuildMode::Production,
            Ok(_) => BuildMode::Development,
            Err(_) => BuildMode::compiled(),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let defaults = AppConfig::default();
        let app = AppConfig {
            company_name: std::env::var("COMPANY_NAME").unwrap_or(defaults.company_name),
            page_title: std::env::var("PAGE_TITLE").unwrap_or(defaults.page_title),
            page_description: std::env::var("PAGE_DESCRIPTION")
                .unwrap_or(defaults.page_description),
            start_button_text: std::env::var("START_BUTTON_TEXT")
                .unwrap_or(defaults.start_button_text),
            supports_chat_input: parse_bool("SUPPORTS_CHAT_INPUT", defaults.supports_chat_input)?,
            supports_video_input: parse_bool(
                "SUPPORTS_VIDEO_INPUT",
                defaults.supports_video_input,
            )?,
            supports_screen_share: parse_bool(
                "SUPPORTS_SCREEN_SHARE",
                defaults.supports_screen_share,
            )?,
            is_pre_connect_buffer_enabled: parse_bool(
                "IS_PRE_CONNECT_BUFFER_ENABLED",
                defaults.is_pre_connect_buffer_enabled,
            )?,
            agent_name: std::env::var("AGENT_NAME").unwrap_or(defaults.agent_name),
            sandbox_id: std::env::var("SANDBOX_ID").ok(),
        };

        Ok(Self {
            origin,
            source_env: SourceEnv {
                sandbox_endpoint,
                strategy,
            },
            build_mode,
            log_level,
            app,
        })
    }
}
