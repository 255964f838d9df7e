use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// User agent of the main SDK handle.
pub const MAIN_USER_AGENT: &str = "rclone-mirror-telegram-bot";
/// User agent of the temporary folder-login handle.
pub const FOLDER_USER_AGENT: &str = "rcmltb";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MEGA_API_KEY is not set")]
    MissingApiKey,
    #[error("invalid step timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credentials and tuning for the SDK bridge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MegaConfig {
    pub api_key: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Upper bound for a single SDK step. Unset waits forever.
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
}

impl MegaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_step_timeout(mut self, secs: u64) -> Self {
        self.step_timeout_secs = Some(secs);
        self
    }

    /// Reads `MEGA_API_KEY`, `MEGA_EMAIL_ID`, `MEGA_PASSWORD` and
    /// `MEGA_STEP_TIMEOUT` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("MEGA_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let step_timeout_secs = match get("MEGA_STEP_TIMEOUT") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?,
            ),
            None => None,
        };

        Ok(Self {
            api_key,
            email: get("MEGA_EMAIL_ID"),
            password: get("MEGA_PASSWORD"),
            step_timeout_secs,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(config)
    }

    /// Email and password, only when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().filter(|e| !e.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }
}
