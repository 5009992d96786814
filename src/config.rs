//! Courier configuration loaded from `courier.toml` and the environment.
//!
//! Values absent from the file use sensible defaults. Environment variables
//! take precedence over the file, matching how the dispatcher is deployed:
//! the file describes the installation, the environment carries secrets and
//! per-instance wiring.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dispatch::RetryPolicy;
use crate::provider::API_URL;

/// Top-level configuration loaded from `courier.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    /// Provider API keys, rotated when the provider throttles the active
    /// one. Empty means every job fails fast with a credentials error.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Bound on concurrently in-flight provider calls in local mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries after the initial attempt before a job is failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Shared broker connection string. Absent means local mode.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Provider API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for chat payloads built by the CLI.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for transcription payloads built by the CLI.
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

fn default_concurrency() -> usize {
    1
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    1200
}

fn default_api_url() -> String {
    API_URL.to_string()
}

fn default_chat_model() -> String {
    "meta-llama/llama-4-maverick-17b-128e-instruct".to_string()
}

fn default_transcription_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            redis_url: None,
            api_url: default_api_url(),
            chat_model: default_chat_model(),
            transcription_model: default_transcription_model(),
        }
    }
}

impl CourierConfig {
    /// Loads `courier.toml` from the current directory (defaults if the
    /// file is missing), then applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(Path::new("courier.toml"))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply recognized environment variables on top of the file values.
    ///
    /// `GROQ_API_KEYS` is a comma-separated list; blanks are dropped.
    /// Numeric variables that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(keys) = var("GROQ_API_KEYS") {
            self.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(value) = var("GROQ_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = value;
        }
        if let Some(value) = var("GROQ_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retries = value;
        }
        if let Some(value) = var("GROQ_BASE_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            self.base_backoff_ms = value;
        }
        if let Some(url) = var("REDIS_URL") {
            if !url.is_empty() {
                self.redis_url = Some(url);
            }
        }
    }

    /// The retry settings as a policy value for the dispatcher.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
        }
    }
}
