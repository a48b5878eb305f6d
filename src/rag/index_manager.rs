use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{IndexError, IngestError};
use crate::indexer::extractor::ChunkSource;
use crate::indexer::walker::{ledger_name, list_pdfs};
use crate::models::Chunk;
use super::embeddings::{embed_all, EmbeddingProvider};
use super::ledger::Ledger;
use super::providers::ProviderIdentity;
use super::retry::{pause, RetryPolicy};
use super::vector_store::{IndexEntry, VectorIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub provider: ProviderIdentity,
    pub is_indexing: bool,
    pub total_files_processed: usize,
    pub total_entries: usize,
    pub ingested_this_run: Vec<String>,
    pub failed_files: Vec<String>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Drives ingestion of a source directory into the provider's index and ledger.
/// The only writer of either store.
pub struct IndexManager {
    identity: ProviderIdentity,
    embedder: Arc<dyn EmbeddingProvider>,
    source: Arc<dyn ChunkSource>,
    policy: RetryPolicy,
    index_dir: PathBuf,
    ledger_path: PathBuf,
    status: Mutex<IndexStatus>,
}

impl IndexManager {
    pub fn new(
        identity: ProviderIdentity,
        index_root: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        source: Arc<dyn ChunkSource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            embedder,
            source,
            policy,
            index_dir: identity.index_dir(index_root),
            ledger_path: identity.ledger_path(index_root),
            status: Mutex::new(IndexStatus {
                provider: identity,
                is_indexing: false,
                total_files_processed: 0,
                total_entries: 0,
                ingested_this_run: Vec::new(),
                failed_files: Vec::new(),
                last_indexed_at: None,
                last_error: None,
            }),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub async fn get_status(&self) -> IndexStatus {
        self.status.lock().await.clone()
    }

    /// Ingests every PDF in `dir` not yet in the ledger and returns the resulting index.
    /// Never fails: per-file errors are retried, then logged and skipped.
    pub async fn run_index(&self, dir: &Path) -> Option<VectorIndex> {
        {
            let mut status = self.status.lock().await;
            status.is_indexing = true;
            status.last_error = None;
            status.ingested_this_run.clear();
            status.failed_files.clear();
        }

        let (mut index, mut ledger) = match self.load_index() {
            Ok(index) => (index, Ledger::load(&self.ledger_path)),
            Err(e) => {
                tracing::warn!(
                    "Failed to load index from {}: {}; starting fresh",
                    self.index_dir.display(),
                    e
                );
                (None, self.untrusted_ledger())
            }
        };

        if !dir.is_dir() {
            tracing::warn!("Directory {} does not exist; skipping ingestion", dir.display());
        } else {
            // A panic here must not leave is_indexing stuck.
            let result = std::panic::AssertUnwindSafe(self.ingest_pending(dir, &mut index, &mut ledger))
                .catch_unwind()
                .await;

            if let Err(panic_info) = result {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("Ingestion panicked: {}", s)
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    format!("Ingestion panicked: {}", s)
                } else {
                    "Ingestion panicked with unknown error".to_string()
                };
                tracing::error!("{}", panic_msg);
                self.status.lock().await.last_error = Some(panic_msg);
            }
        }

        {
            let mut status = self.status.lock().await;
            status.is_indexing = false;
            status.last_indexed_at = Some(Utc::now());
            status.total_files_processed = ledger.len();
            status.total_entries = index.as_ref().map(|i| i.len()).unwrap_or(0);
        }

        index
    }

    /// `Ok(None)` when nothing was ever saved for this provider.
    fn load_index(&self) -> Result<Option<VectorIndex>, IndexError> {
        if !VectorIndex::exists(&self.index_dir) {
            tracing::info!("No saved index for provider {}; starting fresh", self.identity);
            return Ok(None);
        }

        let index = VectorIndex::load(&self.index_dir)?;
        tracing::info!(
            "Loaded index from {} ({} entries)",
            self.index_dir.display(),
            index.len()
        );
        Ok(Some(index))
    }

    /// A saved index that cannot be read takes its ledger with it: those files are ingested again.
    fn untrusted_ledger(&self) -> Ledger {
        let ledger = Ledger::load(&self.ledger_path);
        if !ledger.is_empty() {
            tracing::warn!(
                "Ledger {} lists {} files but its index is unreadable; re-ingesting them",
                self.ledger_path.display(),
                ledger.len()
            );
        }
        Ledger::empty(&self.ledger_path)
    }

    async fn ingest_pending(&self, dir: &Path, index: &mut Option<VectorIndex>, ledger: &mut Ledger) {
        let files = list_pdfs(dir);
        let pending: Vec<PathBuf> = files
            .iter()
            .filter(|path| !ledger.contains(&ledger_name(path)))
            .cloned()
            .collect();

        tracing::info!(
            "Found {} PDF files in {}, {} already processed, {} to ingest",
            files.len(),
            dir.display(),
            files.len() - pending.len(),
            pending.len()
        );

        for (i, path) in pending.iter().enumerate() {
            let name = ledger_name(path);
            match self.ingest_with_retry(path, index, ledger).await {
                Ok(count) => {
                    tracing::info!("Ingested {} ({} chunks)", name, count);
                    self.status.lock().await.ingested_this_run.push(name);
                    if i + 1 < pending.len() {
                        pause(self.policy.inter_file_delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Skipping {} after {} attempts: {}",
                        name,
                        self.policy.max_attempts,
                        e
                    );
                    let mut status = self.status.lock().await;
                    status.failed_files.push(name);
                    status.last_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            "Ingestion complete: {} files in ledger, {} index entries",
            ledger.len(),
            index.as_ref().map(|i| i.len()).unwrap_or(0)
        );
    }

    async fn ingest_with_retry(
        &self,
        path: &Path,
        index: &mut Option<VectorIndex>,
        ledger: &mut Ledger,
    ) -> Result<usize, IngestError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ingest_file(path, index, ledger).await {
                Ok(count) => return Ok(count),
                Err(e) => {
                    if !self.policy.should_retry(attempt) {
                        return Err(e);
                    }
                    let class = self.policy.classify(&e);
                    let delay = self.policy.backoff(class);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({:?}): {}; retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        path.display(),
                        class,
                        e,
                        delay
                    );
                    pause(delay).await;
                }
            }
        }
    }

    /// One attempt: load, embed, merge, save, then record in the ledger.
    /// On error the in-memory index is left as it was before the attempt.
    async fn ingest_file(
        &self,
        path: &Path,
        index: &mut Option<VectorIndex>,
        ledger: &mut Ledger,
    ) -> Result<usize, IngestError> {
        let name = ledger_name(path);
        let chunks = self.load_chunks(path).await?;

        if chunks.is_empty() {
            tracing::info!("{} has no extractable text; marking processed", name);
            ledger.append(&name).map_err(IngestError::Ledger)?;
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), &texts).await?;
        if vectors.len() != chunks.len() {
            return Err(IngestError::EmbeddingCount {
                sent: chunks.len(),
                received: vectors.len(),
            });
        }

        let count = chunks.len();
        let entries: Vec<IndexEntry> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexEntry { vector, chunk })
            .collect();

        let previous_len = index.as_ref().map(|i| i.len());
        if let Some(existing) = index.as_mut() {
            existing.add(entries)?;
        } else {
            *index = Some(VectorIndex::create(entries)?);
        }
        let Some(merged) = index.as_ref() else {
            return Err(IndexError::Empty.into());
        };
        if let Err(e) = merged.save(&self.index_dir) {
            rollback(index, previous_len);
            return Err(e.into());
        }
        tracing::debug!("Saved index to {} ({} entries)", self.index_dir.display(), merged.len());

        if let Err(e) = ledger.append(&name) {
            rollback(index, previous_len);
            self.restore_saved_index(index.as_ref());
            return Err(IngestError::Ledger(e));
        }

        Ok(count)
    }

    async fn load_chunks(&self, path: &Path) -> Result<Vec<Chunk>, IngestError> {
        let source = Arc::clone(&self.source);
        let owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || source.load(&owned))
            .await
            .map_err(|e| IngestError::Load {
                path: path.to_path_buf(),
                reason: format!("loader task failed: {}", e),
            })?
    }

    /// Puts the on-disk index back to the rolled-back state after a ledger failure.
    fn restore_saved_index(&self, index: Option<&VectorIndex>) {
        let result = match index {
            Some(index) => index.save(&self.index_dir).map_err(|e| e.to_string()),
            None => std::fs::remove_dir_all(&self.index_dir).map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            tracing::error!(
                "Could not restore index at {} after ledger failure: {}",
                self.index_dir.display(),
                e
            );
        }
    }
}

fn rollback(index: &mut Option<VectorIndex>, previous_len: Option<usize>) {
    match previous_len {
        Some(len) => {
            if let Some(index) = index.as_mut() {
                index.truncate(len);
            }
        }
        None => *index = None,
    }
}
