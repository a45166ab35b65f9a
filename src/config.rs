//! API connection configuration.

use std::env;
use std::time::Duration;
use thiserror::Error;

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

/// Errors for configuration the run cannot start without.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API URL given; pass --api-url or set DOCPORT_API_URL")]
    MissingApiUrl,
    #[error("no API token given; pass --token or set DOCPORT_API_TOKEN")]
    MissingToken,
}

/// Connection settings for the target document service.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Resolve configuration from CLI overrides with environment fallbacks.
    pub fn resolve(api_url: Option<String>, token: Option<String>) -> Result<Self, ConfigError> {
        let base_url = api_url
            .or_else(|| env_string("DOCPORT_API_URL"))
            .ok_or(ConfigError::MissingApiUrl)?;
        let token = token
            .or_else(|| env_string("DOCPORT_API_TOKEN"))
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            base_url,
            token,
            request_timeout: env_duration_millis("DOCPORT_TIMEOUT_MS", 30_000),
        })
    }
}
