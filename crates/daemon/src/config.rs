//! Daemon configuration
//!
//! Every setting comes from a `WATCHER_`-prefixed environment variable
//! layered over built-in defaults, e.g. `WATCHER_API_URL`,
//! `WATCHER_POLL_INTERVAL_MS=5000`, `WATCHER_RUN_ONCE=true`.

use blob_watcher_core::application::reconciler::config::{
    DEFAULT_BUSY_RETRY, DEFAULT_DEBOUNCE, DEFAULT_PROMOTION_RETRY, DEFAULT_SETTLING_RETRY,
};
use blob_watcher_core::application::watcher::constants::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_POLL_INTERVAL,
};
use blob_watcher_core::application::{ReconcilerConfig, WatcherSettings};
use blob_watcher_core::error::{AppError, Result};
use blob_watcher_infra_http::{HttpSourceConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT};
use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "WATCHER";
pub const DEFAULT_DB_PATH: &str = "~/.blob-watcher/jobs.db";

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// Base URL of the record-import REST API
    pub api_url: String,
    #[serde(default)]
    pub api_username: Option<String>,
    #[serde(default)]
    pub api_password: Option<String>,
    pub api_client_user_agent: String,
    /// SQLite database file or `sqlite:` URL
    pub db_path: String,
    pub poll_interval_ms: u64,
    pub max_concurrency: usize,
    /// Run a single sweep and exit
    pub run_once: bool,
    pub request_timeout_ms: u64,
    pub debounce_ms: u64,
    pub busy_retry_ms: u64,
    pub settling_retry_ms: u64,
    pub promotion_retry_ms: u64,
}

fn config_error(err: ConfigError) -> AppError {
    AppError::Config(err.to_string())
}

fn millis(duration: Duration) -> i64 {
    duration.as_millis() as i64
}

impl WatcherConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(env: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("api_client_user_agent", DEFAULT_USER_AGENT)
            .and_then(|b| b.set_default("db_path", DEFAULT_DB_PATH))
            .and_then(|b| b.set_default("poll_interval_ms", millis(DEFAULT_POLL_INTERVAL)))
            .and_then(|b| b.set_default("max_concurrency", DEFAULT_MAX_CONCURRENCY as i64))
            .and_then(|b| b.set_default("run_once", false))
            .and_then(|b| b.set_default("request_timeout_ms", millis(DEFAULT_REQUEST_TIMEOUT)))
            .and_then(|b| b.set_default("debounce_ms", millis(DEFAULT_DEBOUNCE)))
            .and_then(|b| b.set_default("busy_retry_ms", millis(DEFAULT_BUSY_RETRY)))
            .and_then(|b| b.set_default("settling_retry_ms", millis(DEFAULT_SETTLING_RETRY)))
            .and_then(|b| b.set_default("promotion_retry_ms", millis(DEFAULT_PROMOTION_RETRY)))
            .map_err(config_error)?
            .add_source(env.try_parsing(true))
            .build()
            .map_err(config_error)?;

        let mut loaded: WatcherConfig = config.try_deserialize().map_err(config_error)?;
        loaded.db_path = shellexpand::tilde(&loaded.db_path).into_owned();
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(AppError::Config("api_url must not be empty".to_string()));
        }
        if self.api_password.is_some() && self.api_username.is_none() {
            return Err(AppError::Config(
                "api_password is set but api_username is missing".to_string(),
            ));
        }
        if self.db_path.trim().is_empty() {
            return Err(AppError::Config("db_path must not be empty".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(AppError::Config("max_concurrency must be at least 1".to_string()));
        }
        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("busy_retry_ms", self.busy_retry_ms),
            ("settling_retry_ms", self.settling_retry_ms),
            ("promotion_retry_ms", self.promotion_retry_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            busy_retry: Duration::from_millis(self.busy_retry_ms),
            settling_retry: Duration::from_millis(self.settling_retry_ms),
            promotion_retry: Duration::from_millis(self.promotion_retry_ms),
        }
    }

    pub fn watcher_settings(&self) -> WatcherSettings {
        WatcherSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            api_url: self.api_url.clone(),
            username: self.api_username.clone(),
            password: self.api_password.clone(),
            user_agent: self.api_client_user_agent.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}
