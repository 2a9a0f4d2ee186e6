//! Configuration management for epic_relay.
//!
//! Configuration can be set via environment variables:
//! - `JIRA_BASE_URL` - Optional. Tracker base URL. Defaults to `http://localhost:8081`.
//! - `JIRA_API_TOKEN` - Optional. Tracker credential, sent as a bearer token.
//! - `JIRA_EMAIL` - Optional. When set, the tracker is called with Basic auth (`email:token`).
//! - `JIRA_TIMEOUT_SECS` - Optional. Per-request timeout for tracker writes. Defaults to `30`.
//! - `JIRA_HEALTH_TIMEOUT_SECS` - Optional. Tracker probe timeout. Defaults to `10`.
//! - `LM_STUDIO_URL` - Optional. Model endpoint base URL. Defaults to `http://localhost:1234`.
//! - `LM_STUDIO_MODEL` - Optional. Model used when a request names none. Defaults to `default`.
//! - `LLM_TIMEOUT_SECS` - Optional. Completion timeout. Defaults to `120`.
//! - `LLM_HEALTH_TIMEOUT_SECS` - Optional. Model endpoint probe timeout. Defaults to `5`.
//! - `EPIC_SUMMARY_COMMENT` - Optional. Post a summary comment on the epic. Defaults to `false`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// How requests to the tracker are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerAuth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP Basic with account email and API token
    Basic { email: String, token: String },
}

/// Issue tracker connection settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    pub auth: TrackerAuth,

    /// Timeout applied to issue/comment writes
    pub request_timeout: Duration,

    /// Timeout for the reachability probe
    pub health_timeout: Duration,
}

/// Language-model endpoint settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL without trailing slash
    pub base_url: String,

    /// Model used when the caller does not name one
    pub default_model: String,

    /// Completion timeout; generation can take minutes
    pub request_timeout: Duration,

    /// Timeout for the reachability probe
    pub health_timeout: Duration,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub tracker: TrackerConfig,

    pub model: ModelConfig,

    /// Post a comment on the epic listing created issues after a successful run
    pub summary_comment: bool,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let tracker_base = var_or("JIRA_BASE_URL", "http://localhost:8081");
        let token = lookup("JIRA_API_TOKEN").unwrap_or_default();
        let auth = match lookup("JIRA_EMAIL") {
            Some(email) if !email.trim().is_empty() => TrackerAuth::Basic {
                email: email.trim().to_string(),
                token,
            },
            _ => TrackerAuth::Bearer(token),
        };

        let model_base = var_or("LM_STUDIO_URL", "http://localhost:1234");
        let default_model = var_or("LM_STUDIO_MODEL", "default");

        let host = var_or("HOST", "127.0.0.1");

        let port = var_or("PORT", "8000")
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let summary_comment = match lookup("EPIC_SUMMARY_COMMENT") {
            Some(raw) => parse_bool("EPIC_SUMMARY_COMMENT", &raw)?,
            None => false,
        };

        let secs = |var: &str, default: u64| parse_secs(var, lookup(var), default);

        Ok(Self {
            tracker: TrackerConfig {
                base_url: trim_base_url(&tracker_base),
                auth,
                request_timeout: secs("JIRA_TIMEOUT_SECS", 30)?,
                health_timeout: secs("JIRA_HEALTH_TIMEOUT_SECS", 10)?,
            },
            model: ModelConfig {
                base_url: trim_base_url(&model_base),
                default_model,
                request_timeout: secs("LLM_TIMEOUT_SECS", 120)?,
                health_timeout: secs("LLM_HEALTH_TIMEOUT_SECS", 5)?,
            },
            summary_comment,
            host,
            port,
        })
    }

    /// Create a config with custom endpoints (useful for testing).
    pub fn new(tracker_base_url: &str, model_base_url: &str) -> Self {
        Self {
            tracker: TrackerConfig {
                base_url: trim_base_url(tracker_base_url),
                auth: TrackerAuth::Bearer(String::new()),
                request_timeout: Duration::from_secs(30),
                health_timeout: Duration::from_secs(10),
            },
            model: ModelConfig {
                base_url: trim_base_url(model_base_url),
                default_model: "default".to_string(),
                request_timeout: Duration::from_secs(120),
                health_timeout: Duration::from_secs(5),
            },
            summary_comment: false,
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

fn trim_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_secs(var: &str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), format!("{}", e))),
        None => Ok(Duration::from_secs(default)),
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("expected a boolean, got '{}'", other),
        )),
    }
}
