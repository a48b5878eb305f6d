pub mod gemini;
pub mod ollama;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::ProviderError;
use super::embeddings::EmbeddingProvider;
use super::llm::LanguageModel;
use self::gemini::GeminiProvider;
use self::ollama::OllamaProvider;

/// Which backend pair (and which persisted index/ledger) is active for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentity {
    Remote,
    Local,
}

impl ProviderIdentity {
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderIdentity::Remote => "remote",
            ProviderIdentity::Local => "local",
        }
    }

    pub fn index_dir(&self, root: &Path) -> PathBuf {
        root.join(format!("faiss_index_{}", self.tag()))
    }

    pub fn ledger_path(&self, root: &Path) -> PathBuf {
        root.join(format!("processed_files_{}.txt", self.tag()))
    }
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        ProviderIdentity::Remote
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The selected backend. Chosen once from configuration; every call dispatches on the variant.
pub enum ProviderBackend {
    Remote(GeminiProvider),
    Local(OllamaProvider),
}

impl ProviderBackend {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        let backend = match config.provider {
            ProviderIdentity::Remote => {
                if config.remote.api_key.is_none() {
                    tracing::warn!("GOOGLE_API_KEY not set; remote provider calls will be rejected");
                }
                ProviderBackend::Remote(GeminiProvider::new(
                    client,
                    config.remote.base_url.clone(),
                    config.remote.api_key.clone(),
                    config.remote.embed_model.clone(),
                    config.remote.chat_model.clone(),
                    config.temperature,
                ))
            }
            ProviderIdentity::Local => ProviderBackend::Local(OllamaProvider::new(
                client,
                config.local.base_url.clone(),
                config.local.embed_model.clone(),
                config.local.chat_model.clone(),
                config.temperature,
            )),
        };

        tracing::info!(
            "Provider {} ready (embeddings: {}, chat: {})",
            backend.identity(),
            EmbeddingProvider::name(&backend),
            LanguageModel::model(&backend)
        );
        Ok(backend)
    }

    pub fn identity(&self) -> ProviderIdentity {
        match self {
            ProviderBackend::Remote(_) => ProviderIdentity::Remote,
            ProviderBackend::Local(_) => ProviderIdentity::Local,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for ProviderBackend {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        match self {
            ProviderBackend::Remote(p) => p.embed_batch(texts).await,
            ProviderBackend::Local(p) => p.embed_batch(texts).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            ProviderBackend::Remote(p) => p.name(),
            ProviderBackend::Local(p) => p.name(),
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        match self {
            ProviderBackend::Remote(p) => p.complete(prompt).await,
            ProviderBackend::Local(p) => p.complete(prompt).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ProviderBackend::Remote(p) => p.model(),
            ProviderBackend::Local(p) => p.model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_scoped_by_identity() {
        let root = Path::new("/srv/tomi");
        let remote = ProviderIdentity::Remote;
        let local = ProviderIdentity::Local;

        assert_ne!(remote.index_dir(root), local.index_dir(root));
        assert_ne!(remote.ledger_path(root), local.ledger_path(root));
        assert_eq!(local.index_dir(root), PathBuf::from("/srv/tomi/faiss_index_local"));
    }

    #[test]
    fn test_backend_matches_configured_identity() {
        let config = AppConfig {
            provider: ProviderIdentity::Local,
            ..AppConfig::default()
        };
        let backend = ProviderBackend::from_config(&config).unwrap();
        assert_eq!(backend.identity(), ProviderIdentity::Local);
        assert_eq!(LanguageModel::model(&backend), "llama3");
    }
}
