//! Configuration: TOML file with per-section defaults, then environment overlay.
//!
//! ```toml
//! [api]
//! base_url = "https://api.example.com"
//! request_timeout_secs = 30
//! history_limit = 1
//!
//! [polling]
//! initial_delay_secs = 300
//! batch_interval_secs = 120
//! max_batch_attempts = 5
//! cooldown_secs = 600
//!
//! [cache]
//! path = "georank-cache.json"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::policy::PollPolicy;

pub const ENV_API_URL: &str = "GEORANK_API_URL";
pub const ENV_LOG_LEVEL: &str = "GEORANK_LOG_LEVEL";
pub const ENV_TOKEN: &str = "GEORANK_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,

    /// `limit` query parameter; only the newest record is used.
    pub history_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            history_limit: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub initial_delay_secs: u64,
    pub batch_interval_secs: u64,
    pub max_batch_attempts: u32,
    pub cooldown_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let policy = PollPolicy::default_v1();
        Self {
            initial_delay_secs: policy.initial_delay.as_secs(),
            batch_interval_secs: policy.batch_interval.as_secs(),
            max_batch_attempts: policy.max_batch_attempts,
            cooldown_secs: policy.cooldown.as_secs(),
        }
    }
}

impl PollingConfig {
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            batch_interval: Duration::from_secs(self.batch_interval_secs),
            max_batch_attempts: self.max_batch_attempts,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("georank-cache.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlay `GEORANK_API_URL` and `GEORANK_LOG_LEVEL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url.trim().to_string();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got {url:?}"
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.request_timeout_secs must be > 0".into()));
        }
        if self.api.history_limit == 0 {
            return Err(ConfigError::Invalid("api.history_limit must be > 0".into()));
        }
        let p = &self.polling;
        if p.batch_interval_secs == 0 || p.cooldown_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling intervals must be > 0".into(),
            ));
        }
        if p.max_batch_attempts == 0 {
            return Err(ConfigError::Invalid("polling.max_batch_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn policy(&self) -> PollPolicy {
        self.polling.to_policy()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}
