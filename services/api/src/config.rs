//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// Gemini's OpenAI-compatible endpoint.
pub const DEFAULT_LLM_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_DREAM_MODEL: &str = "gemini-2.5-flash";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Absent is allowed at startup; analyses then fail with a configuration
    /// error before any network call.
    pub api_key: Option<String>,
    pub llm_api_base: String,
    pub dream_model: String,
    pub request_timeout: Duration,
    pub cors_origin: String,
    /// Consultations untouched for this long are dropped by the sweeper.
    pub consultation_idle_timeout: Duration,
    pub max_consultations: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load API Key (as optional) ---
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|key| !key.trim().is_empty());

        // --- Load Model Settings ---
        let llm_api_base =
            lookup("LLM_API_BASE").unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string());
        let dream_model = lookup("DREAM_MODEL").unwrap_or_else(|| DEFAULT_DREAM_MODEL.to_string());

        let timeout_str = lookup("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "60".to_string());
        let request_timeout = match timeout_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                ))
            }
        };

        // --- Load Consultation Limits ---
        let idle_str = lookup("CONSULTATION_IDLE_SECS").unwrap_or_else(|| "1800".to_string());
        let consultation_idle_timeout = match idle_str.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                return Err(ConfigError::InvalidValue(
                    "CONSULTATION_IDLE_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", idle_str),
                ))
            }
        };

        let max_str = lookup("MAX_CONSULTATIONS").unwrap_or_else(|| "10000".to_string());
        let max_consultations = match max_str.parse::<usize>() {
            Ok(max) if max > 0 => max,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "MAX_CONSULTATIONS".to_string(),
                    format!("'{}' is not a positive number", max_str),
                ))
            }
        };

        Ok(Self {
            bind_address,
            log_level,
            api_key,
            llm_api_base,
            dream_model,
            request_timeout,
            cors_origin,
            consultation_idle_timeout,
            max_consultations,
        })
    }
}
