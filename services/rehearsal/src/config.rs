//! Application Configuration Module
//!
//! Loads the rehearsal service settings from the environment into a single
//! struct that `main` hands to the adapters it builds.

use rehearsal_core::interview_api::DEFAULT_BASE_URL;
use secrecy::SecretString;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Simulated speaking time per word for the console speech output.
pub const DEFAULT_WORD_DELAY_MS: u64 = 120;

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub api_token: Option<SecretString>,
    pub word_delay: Duration,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid SPEECH_WORD_DELAY_MS, expected milliseconds: {0}")]
    InvalidWordDelay(String),
    #[error("INTERVIEW_API_BASE_URL must not be empty")]
    EmptyBaseUrl,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `INTERVIEW_API_BASE_URL`: (Optional) Root of the interview backend. Defaults to "http://localhost:8080/api".
    // *   `INTERVIEW_API_TOKEN`: (Optional) Bearer token sent with every backend request.
    // *   `SPEECH_WORD_DELAY_MS`: (Optional) Simulated speaking time per word. Defaults to 120.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO". Can be "TRACE", "DEBUG", "INFO", "WARN", or "ERROR".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = lookup("INTERVIEW_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .to_string();
        if api_base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        let api_token = lookup("INTERVIEW_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        let word_delay = match lookup("SPEECH_WORD_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidWordDelay(raw))?,
            None => Duration::from_millis(DEFAULT_WORD_DELAY_MS),
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_base_url,
            api_token,
            word_delay,
            log_level,
        })
    }
}
