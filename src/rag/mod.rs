pub mod answer;
pub mod embeddings;
pub mod index_manager;
pub mod ledger;
pub mod llm;
pub mod providers;
pub mod retry;
pub mod vector_store;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::indexer::extractor::{ChunkSource, PdfChunkSource};
use crate::models::Chunk;
use self::answer::{AnswerGenerator, NOT_INITIALIZED, PLACEHOLDER_TEXT};
use self::embeddings::EmbeddingProvider;
use self::index_manager::{IndexManager, IndexStatus};
use self::llm::LanguageModel;
use self::providers::{ProviderBackend, ProviderIdentity};
use self::retry::RetryPolicy;
use self::vector_store::{IndexEntry, VectorIndex};

/// Process-wide RAG state: one provider identity, its coordinator and, once
/// ingestion has finished, its answer generator.
pub struct RagService {
    identity: ProviderIdentity,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    manager: IndexManager,
    top_k: usize,
    generator: RwLock<Option<Arc<AnswerGenerator>>>,
}

impl RagService {
    pub fn new(
        identity: ProviderIdentity,
        index_root: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        source: Arc<dyn ChunkSource>,
        policy: RetryPolicy,
        top_k: usize,
    ) -> Self {
        let manager = IndexManager::new(identity, index_root, Arc::clone(&embedder), source, policy);
        Self {
            identity,
            embedder,
            llm,
            manager,
            top_k,
            generator: RwLock::new(None),
        }
    }

    /// Wires the configured backend, the PDF chunk source and the retry policy.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend = Arc::new(ProviderBackend::from_config(config)?);
        let source = Arc::new(PdfChunkSource::new(config.chunk_size, config.chunk_overlap));

        Ok(Self::new(
            backend.identity(),
            &config.index_root,
            backend.clone(),
            backend,
            source,
            config.retry.policy(),
            config.top_k,
        ))
    }

    pub fn identity(&self) -> ProviderIdentity {
        self.identity
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    pub async fn status(&self) -> IndexStatus {
        self.manager.get_status().await
    }

    pub async fn is_ready(&self) -> bool {
        self.generator
            .read()
            .await
            .as_ref()
            .map(|g| g.is_grounded())
            .unwrap_or(false)
    }

    pub async fn generator(&self) -> Option<Arc<AnswerGenerator>> {
        self.generator.read().await.clone()
    }

    /// Runs one ingestion pass over `dir`, then publishes the answer generator.
    pub async fn ingest(&self, dir: &Path) {
        tracing::info!("Ingesting PDFs from {} with provider {}", dir.display(), self.identity);
        let index = self.manager.run_index(dir).await;

        let generator = match index {
            Some(index) if !index.is_empty() => Some(self.build_generator(index, true)),
            _ => self.placeholder_generator().await,
        };

        if generator.as_ref().map(|g| g.is_grounded()).unwrap_or(false) {
            tracing::info!("PDF ingestion complete. Vector store ready.");
        } else {
            tracing::warn!("No PDF documents found or loaded; answers are disabled");
        }
        *self.generator.write().await = generator.map(Arc::new);
    }

    fn build_generator(&self, index: VectorIndex, grounded: bool) -> AnswerGenerator {
        AnswerGenerator::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm),
            index,
            self.top_k,
            grounded,
        )
    }

    /// Stand-in index holding one entry so retrieval never runs over nothing.
    async fn placeholder_generator(&self) -> Option<AnswerGenerator> {
        let vector = match self.embedder.embed(PLACEHOLDER_TEXT).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("Could not embed placeholder entry: {}", e);
                return None;
            }
        };

        let entry = IndexEntry {
            vector,
            chunk: Chunk {
                text: PLACEHOLDER_TEXT.to_string(),
                source_file: "none".to_string(),
                page_index: 0,
            },
        };

        match VectorIndex::create(vec![entry]) {
            Ok(index) => Some(self.build_generator(index, false)),
            Err(e) => {
                tracing::warn!("Could not build placeholder index: {}", e);
                None
            }
        }
    }

    /// Answers `query`, or explains why it cannot. Never fails.
    pub async fn answer(&self, query: &str) -> String {
        match self.generator().await {
            Some(generator) => generator.answer(query).await,
            None => NOT_INITIALIZED.to_string(),
        }
    }
}
