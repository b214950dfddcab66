//! Client configuration, read from the environment with fixed defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::envelope::EnvelopePolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    /// Applied to every call; expiry surfaces as a network error
    pub timeout: Duration,
    /// Target of the hard redirect and of guard redirects
    pub login_path: String,
    /// Where tokens are persisted; the platform data dir when unset
    pub data_dir: Option<PathBuf>,
    pub envelope: EnvelopePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            data_dir: None,
            envelope: EnvelopePolicy::Structural,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("LOLSTATS_API_URL") {
            config.base_url = url;
        }
        if let Some(secs) = lookup("LOLSTATS_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("LOLSTATS_TIMEOUT_SECS", secs.clone()))?;
            if secs == 0 {
                return Err(ConfigError::Invalid("LOLSTATS_TIMEOUT_SECS", secs.to_string()));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("LOLSTATS_LOGIN_PATH") {
            config.login_path = path;
        }
        if let Some(dir) = lookup("LOLSTATS_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(media_type) = lookup("LOLSTATS_ENVELOPE_CONTENT_TYPE") {
            if !media_type.trim().is_empty() {
                config.envelope = EnvelopePolicy::ContentType(media_type.trim().to_string());
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme_ok = self.base_url.starts_with("http://") || self.base_url.starts_with("https://");
        if !scheme_ok {
            return Err(ConfigError::Invalid("base_url", self.base_url.clone()));
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::Invalid("login_path", self.login_path.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
