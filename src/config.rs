use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::rag::providers::ProviderIdentity;
use crate::rag::retry::RetryPolicy;

/// Process configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderIdentity,
    pub data_dir: PathBuf,
    pub index_root: PathBuf,
    pub bind_addr: String,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embed_model: String,
    pub chat_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub base_url: String,
    pub embed_model: String,
    pub chat_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub rate_limit_cooldown_secs: u64,
    pub transient_backoff_secs: u64,
    pub inter_file_delay_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderIdentity::Remote,
            data_dir: PathBuf::from("data"),
            index_root: PathBuf::from("."),
            bind_addr: "0.0.0.0:8000".to_string(),
            top_k: 4,
            chunk_size: 4000,
            chunk_overlap: 200,
            temperature: 0.3,
            request_timeout_secs: 120,
            remote: RemoteConfig::default(),
            local: LocalConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            embed_model: "models/embedding-001".to_string(),
            chat_model: "gemini-1.5-flash".to_string(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            chat_model: "llama3".to_string(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown_secs: 70,
            transient_backoff_secs: 5,
            inter_file_delay_secs: 2,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
            transient_backoff: Duration::from_secs(self.transient_backoff_secs),
            inter_file_delay: Duration::from_secs(self.inter_file_delay_secs),
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if any), then `TOMI_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let env = Environment::with_prefix("TOMI")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        let mut cfg = Self::from_source(env)?;

        if cfg.remote.api_key.is_none() {
            cfg.remote.api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        Ok(cfg)
    }

    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.provider.index_dir(&self.index_root)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.provider.ledger_path(&self.index_root)
    }
}
