//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_PATH: &str = ".attendance-token";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ATTENDANCE_API_URL must not be empty")]
    EmptyApiUrl,
    #[error("invalid boolean for {key}: {value}")]
    InvalidBool { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the attendance API, without a trailing slash.
    pub api_url: String,
    pub timeouts: Timeouts,
    /// File backing the durable session-token slot.
    pub token_path: PathBuf,
    /// Emit request/response payloads on the `attendance_client::payload` target.
    pub log_payloads: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            timeouts: Timeouts::default(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            log_payloads: false,
        }
    }
}

impl ClientConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `ATTENDANCE_API_URL`: default `http://localhost:8000/api`
    /// - `ATTENDANCE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `ATTENDANCE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `ATTENDANCE_TOKEN_PATH`: default `.attendance-token`
    /// - `ATTENDANCE_LOG_PAYLOADS`: default off
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is blank or the payload flag is not a boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(
            &std::env::var("ATTENDANCE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned()),
        )?;
        let timeouts = Timeouts {
            request_secs: env_parse_u64("ATTENDANCE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("ATTENDANCE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let token_path = std::env::var("ATTENDANCE_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_PATH));
        let log_payloads = match std::env::var("ATTENDANCE_LOG_PAYLOADS") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidBool {
                key: "ATTENDANCE_LOG_PAYLOADS".into(),
                value: raw.clone(),
            })?,
            Err(_) => false,
        };

        Ok(Self { api_url, timeouts, token_path, log_payloads })
    }

    /// Replace the API URL, applying the same normalization as `from_env`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiUrl`] if `raw` is blank after trimming.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = normalize_api_url(raw)?;
        Ok(self)
    }
}

pub(crate) fn normalize_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyApiUrl);
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Zero is treated like an unparseable value.
fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
