// Configuration management

use crate::core::errors::RelayError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
///
/// Storage is in-memory unless `DATABASE_URL` is set.
/// All configuration is validated on load with clear error messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,

    // Database configuration (optional)
    pub database_url: Option<String>,

    // Identity service
    pub identity_session_url: String,
    pub identity_timeout_secs: u64,

    // Session cache
    pub session_ttl_secs: u64,
    pub session_purge_interval_secs: u64,

    // Callback delivery
    pub callback_timeout_secs: u64,
    pub initial_sync_pacing_ms: u64,

    // Background work
    pub max_background_jobs: usize,
    pub shutdown_drain_secs: u64,

    // Middleware configuration
    pub request_timeout_secs: u64,
    pub body_size_limit_bytes: usize,

    // Operator console on stdin
    pub operator_console: bool,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, RelayError> {
        // Skip in test builds so tests control the environment
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok();
        }

        let config = Self {
            bind_address: Self::get_env_or_default("BIND_ADDRESS", "0.0.0.0"),
            port: Self::parse_port()?,
            database_url: Self::get_optional_env("DATABASE_URL"),
            identity_session_url: Self::get_env_or_default(
                "IDENTITY_SESSION_URL",
                "http://localhost/api/identity/login/valid",
            ),
            identity_timeout_secs: Self::parse_u64_or_default("IDENTITY_TIMEOUT_SECS", 5)?,
            session_ttl_secs: Self::parse_u64_or_default("SESSION_TTL_SECS", 900)?,
            session_purge_interval_secs: Self::parse_u64_or_default(
                "SESSION_PURGE_INTERVAL_SECS",
                60,
            )?,
            callback_timeout_secs: Self::parse_u64_or_default("CALLBACK_TIMEOUT_SECS", 30)?,
            initial_sync_pacing_ms: Self::parse_u64_allow_zero("INITIAL_SYNC_PACING_MS", 2000)?,
            max_background_jobs: Self::parse_usize_or_default("MAX_BACKGROUND_JOBS", 64)?,
            shutdown_drain_secs: Self::parse_u64_or_default("SHUTDOWN_DRAIN_SECS", 10)?,
            request_timeout_secs: Self::parse_u64_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            body_size_limit_bytes: Self::parse_usize_or_default(
                "BODY_SIZE_LIMIT_BYTES",
                2 * 1024 * 1024,
            )?,
            operator_console: Self::parse_bool_or_default("OPERATOR_CONSOLE", true)?,
            log_level: Self::get_env_or_default("LOG_LEVEL", "info"),
            log_format: Self::get_env_or_default("LOG_FORMAT", "json"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn initial_sync_pacing(&self) -> Duration {
        Duration::from_millis(self.initial_sync_pacing_ms)
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }

    fn get_env_or_default(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    fn get_optional_env(key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    fn parse_port() -> Result<u16, RelayError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port_str.parse::<u16>().map_err(|e| {
            RelayError::ConfigurationError(format!("Invalid PORT value '{}': {}", port_str, e))
        })?;

        if port == 0 {
            return Err(RelayError::ConfigurationError(
                "PORT must be between 1 and 65535".to_string(),
            ));
        }

        Ok(port)
    }

    /// Parse a positive u64 from the environment, or return `default`
    fn parse_u64_or_default(key: &str, default: u64) -> Result<u64, RelayError> {
        let parsed = Self::parse_u64_allow_zero(key, default)?;
        if parsed == 0 {
            return Err(RelayError::ConfigurationError(format!(
                "{} must be greater than 0",
                key
            )));
        }
        Ok(parsed)
    }

    fn parse_u64_allow_zero(key: &str, default: u64) -> Result<u64, RelayError> {
        match env::var(key) {
            Ok(value) => value.trim().parse::<u64>().map_err(|e| {
                RelayError::ConfigurationError(format!(
                    "Invalid {} value '{}': {}",
                    key, value, e
                ))
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_usize_or_default(key: &str, default: usize) -> Result<usize, RelayError> {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.trim().parse::<usize>().map_err(|e| {
                    RelayError::ConfigurationError(format!(
                        "Invalid {} value '{}': {}",
                        key, value, e
                    ))
                })?;

                if parsed == 0 {
                    return Err(RelayError::ConfigurationError(format!(
                        "{} must be greater than 0",
                        key
                    )));
                }

                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_or_default(key: &str, default: bool) -> Result<bool, RelayError> {
        match env::var(key) {
            Ok(value) => Self::parse_bool(key, &value),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool(key: &str, value: &str) -> Result<bool, RelayError> {
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(RelayError::ConfigurationError(format!(
                "Invalid {} value '{}': expected true or false",
                key, value
            ))),
        }
    }

    fn validate(&self) -> Result<(), RelayError> {
        Self::validate_url(&self.identity_session_url, "Identity session")?;
        if let Some(ref url) = self.database_url {
            Self::validate_url(url, "Database")?;
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;

        Ok(())
    }

    fn validate_url(url: &str, description: &str) -> Result<(), RelayError> {
        url::Url::parse(url).map_err(|e| {
            RelayError::ConfigurationError(format!(
                "Invalid {} URL '{}': {}",
                description, url, e
            ))
        })?;
        Ok(())
    }

    fn validate_log_level(level: &str) -> Result<(), RelayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(RelayError::ConfigurationError(format!(
                "Invalid LOG_LEVEL '{}': must be one of {}",
                level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    fn validate_log_format(format: &str) -> Result<(), RelayError> {
        if format != "json" && format != "text" {
            return Err(RelayError::ConfigurationError(format!(
                "Invalid LOG_FORMAT '{}': must be 'json' or 'text'",
                format
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Configuration for tests: in-memory storage, no console, no pacing
    pub fn test_config() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            database_url: None,
            identity_session_url: "http://localhost/api/identity/login/valid".to_string(),
            identity_timeout_secs: 5,
            session_ttl_secs: 900,
            session_purge_interval_secs: 60,
            callback_timeout_secs: 5,
            initial_sync_pacing_ms: 0,
            max_background_jobs: 16,
            shutdown_drain_secs: 5,
            request_timeout_secs: 30,
            body_size_limit_bytes: 2 * 1024 * 1024,
            operator_console: false,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}
