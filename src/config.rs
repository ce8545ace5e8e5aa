//! Configuration management for lm-analyst.
//!
//! Every setting is resolved from an ordered list of sources: a dedicated
//! environment variable, a generic one shared with other tooling, then a
//! hardcoded default. The first non-empty value wins.
//!
//! - `LM_STUDIO_BASE_URL` / `ANTHROPIC_BASE_URL` - Backend base URL. Defaults to `http://localhost:1234/v1`.
//! - `LM_STUDIO_API_KEY` / `ANTHROPIC_AUTH_TOKEN` - Bearer token. Defaults to `lm-studio`.
//! - `LM_STUDIO_MODEL` / `ANTHROPIC_MODEL` - Model identifier. Defaults to `model-identifier`.
//! - `LM_ANALYST_REQUEST_TIMEOUT_SECS` - Optional. Backend request timeout, `0` disables. Defaults to `300`.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_API_KEY: &str = "lm-studio";
/// LM Studio ignores the model name as long as a model is loaded.
pub const DEFAULT_MODEL: &str = "model-identifier";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Ordered sources for one setting.
#[derive(Debug, Clone, Copy)]
pub struct SettingSources {
    pub dedicated: &'static str,
    pub generic: &'static str,
    pub default: &'static str,
}

impl SettingSources {
    /// Resolve against `lookup`, skipping unset and blank values.
    pub fn resolve(&self, lookup: &impl Fn(&str) -> Option<String>) -> String {
        [self.dedicated, self.generic]
            .into_iter()
            .filter_map(|name| lookup(name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .unwrap_or_else(|| self.default.to_string())
    }
}

pub const BASE_URL_SOURCES: SettingSources = SettingSources {
    dedicated: "LM_STUDIO_BASE_URL",
    generic: "ANTHROPIC_BASE_URL",
    default: DEFAULT_BASE_URL,
};

pub const API_KEY_SOURCES: SettingSources = SettingSources {
    dedicated: "LM_STUDIO_API_KEY",
    generic: "ANTHROPIC_AUTH_TOKEN",
    default: DEFAULT_API_KEY,
};

pub const MODEL_SOURCES: SettingSources = SettingSources {
    dedicated: "LM_STUDIO_MODEL",
    generic: "ANTHROPIC_MODEL",
    default: DEFAULT_MODEL,
};

const REQUEST_TIMEOUT_VAR: &str = "LM_ANALYST_REQUEST_TIMEOUT_SECS";

/// Resolved backend configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL, always ending in exactly one `/v1`
    pub base_url: String,

    /// Bearer token sent to the backend
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Transport timeout for a single chat completion (None = no timeout)
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the base URL does not parse or
    /// the request timeout is not a number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(&BASE_URL_SOURCES.resolve(&lookup));
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidValue(BASE_URL_SOURCES.dedicated.to_string(), format!("{}: {}", base_url, e)))?;

        let api_key = API_KEY_SOURCES.resolve(&lookup);
        let model = MODEL_SOURCES.resolve(&lookup);

        let timeout_secs = lookup(REQUEST_TIMEOUT_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| ConfigError::InvalidValue(REQUEST_TIMEOUT_VAR.to_string(), format!("{}", e)))
            })
            .transpose()?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            base_url,
            api_key,
            model,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            api_key,
            model,
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        }
    }
}

/// Make sure the URL ends in exactly one `/v1`, since the client appends
/// `/chat/completions` to it.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.strip_suffix('/').unwrap_or(raw);
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}
