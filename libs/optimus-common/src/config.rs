// Client configuration
// Defaults, optional JSON file, then environment overrides

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_API_URL: &str = "OPTIMUS_API_URL";
pub const ENV_TOKEN: &str = "OPTIMUS_TOKEN";
pub const ENV_POLL_INTERVAL_MS: &str = "OPTIMUS_POLL_INTERVAL_MS";
pub const ENV_MAX_POLL_SECS: &str = "OPTIMUS_MAX_POLL_SECS";
pub const ENV_CACHE_CAPACITY: &str = "OPTIMUS_CACHE_CAPACITY";
pub const ENV_DEFAULT_LANGUAGE: &str = "OPTIMUS_DEFAULT_LANGUAGE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_duration_secs: u64,
    pub cache_capacity: usize,
    pub default_language: String,
    pub page_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/api".to_string(),
            auth_token: None,
            request_timeout_ms: 30_000,
            poll_interval_ms: 1_000,
            max_poll_duration_secs: 300,
            cache_capacity: 256,
            default_language: "python".to_string(),
            page_limit: 20,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file, then apply environment overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_from_file_with(path, |key| std::env::var(key).ok())
    }

    /// Load from a JSON file, then apply overrides from `lookup`
    pub fn load_from_file_with<P, F>(path: P, lookup: F) -> Result<Self, String>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read {}: {}", path.as_ref().display(), e))?;

        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.as_ref().display(), e))?;

        config.with_env(lookup)?.validated()
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides from `lookup`
    pub fn from_env_with<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_env(lookup)?.validated()
    }

    /// Apply overrides from a variable lookup. Unparseable numbers are
    /// reported rather than ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_number(ENV_POLL_INTERVAL_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_POLL_SECS) {
            self.max_poll_duration_secs = parse_number(ENV_MAX_POLL_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            self.cache_capacity = parse_number(ENV_CACHE_CAPACITY, &raw)?;
        }
        if let Some(lang) = lookup(ENV_DEFAULT_LANGUAGE) {
            self.default_language = lang;
        }
        Ok(self)
    }

    pub fn validated(self) -> Result<Self, String> {
        if self.api_base_url.trim().is_empty() {
            return Err("api_base_url must not be empty".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        if self.max_poll_duration_secs == 0 {
            return Err("max_poll_duration_secs must be greater than zero".to_string());
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than zero".to_string());
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_duration_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{} must be a number, got '{}'", key, raw))
}
