//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if `ATS_URL` is missing.
//! The bearer token is wrapped in `secrecy::SecretString` to prevent log leaks.

use crate::error::{Error, Result};
use crate::model::WorkqueueId;
use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub struct Config {
    /// Base URL of the automation server API, without a trailing slash.
    pub url: String,
    pub token: SecretString,
    pub session: Option<i64>,
    pub resource: Option<String>,
    pub process: Option<i64>,
    /// Queue to draw items from regardless of what the session's process says.
    pub workqueue_override: Option<WorkqueueId>,
    /// Applied to every outbound request; expiry fails the call.
    pub request_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Config pointing at `url` with no token, session or override.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(url.into()),
            token: SecretString::from(String::new()),
            session: None,
            resource: None,
            process: None,
            workqueue_override: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = SecretString::from(token.into());
        self
    }

    pub fn with_session(mut self, session: i64) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_workqueue_override(mut self, id: WorkqueueId) -> Self {
        self.workqueue_override = Some(id);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    /// In production, the scheduler that launches the worker provides the vars.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same parsing as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let url = var("ATS_URL")
            .ok_or_else(|| Error::Config("ATS_URL is not set in the environment".to_string()))?;

        let timeout_secs = parse_int::<u64>("ATS_TIMEOUT_SECS", var("ATS_TIMEOUT_SECS"))?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            url: normalize_url(url),
            token: SecretString::from(var("ATS_TOKEN").unwrap_or_default()),
            session: parse_int("ATS_SESSION", var("ATS_SESSION"))?,
            resource: var("ATS_RESOURCE"),
            process: parse_int("ATS_PROCESS", var("ATS_PROCESS"))?,
            workqueue_override: parse_int("ATS_WORKQUEUE_OVERRIDE", var("ATS_WORKQUEUE_OVERRIDE"))?
                .map(WorkqueueId),
            request_timeout: Duration::from_secs(timeout_secs),
            otel_endpoint: var("OTEL_ENDPOINT"),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn normalize_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_int<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("{name} must be an integer, got {v:?}")))
        })
        .transpose()
}
