#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tomi_backend::error::{IngestError, ProviderError};
use tomi_backend::indexer::extractor::ChunkSource;
use tomi_backend::indexer::walker::ledger_name;
use tomi_backend::models::Chunk;
use tomi_backend::rag::embeddings::EmbeddingProvider;
use tomi_backend::rag::llm::LanguageModel;
use tomi_backend::rag::providers::ProviderIdentity;
use tomi_backend::rag::retry::RetryPolicy;
use tomi_backend::rag::RagService;

/// Deterministic features; distinct test texts map to distinct vectors.
pub fn features(text: &str) -> Vec<f32> {
    let bytes = text.as_bytes();
    let sum: u32 = bytes.iter().map(|&b| b as u32).sum();
    vec![
        sum as f32,
        bytes.len() as f32 * 10.0,
        bytes.first().copied().unwrap_or(0) as f32,
        bytes.last().copied().unwrap_or(0) as f32,
    ]
}

/// Serves pages from memory keyed by file name. Unknown names fail like a corrupt PDF.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, Vec<String>>,
    loads: Mutex<Vec<String>>,
    on_load: Option<Box<dyn Fn(&str, usize) + Send + Sync>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, pages: &[&str]) -> Self {
        self.pages
            .insert(name.to_string(), pages.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Runs `hook(name, nth_load_of_that_name)` before each load.
    pub fn on_load(mut self, hook: impl Fn(&str, usize) + Send + Sync + 'static) -> Self {
        self.on_load = Some(Box::new(hook));
        self
    }

    pub fn loads_of(&self, name: &str) -> usize {
        self.loads.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

impl ChunkSource for FakeSource {
    fn load(&self, path: &Path) -> Result<Vec<Chunk>, IngestError> {
        let name = ledger_name(path);
        let nth = {
            let mut loads = self.loads.lock().unwrap();
            loads.push(name.clone());
            loads.iter().filter(|n| **n == name).count()
        };
        if let Some(hook) = &self.on_load {
            hook(&name, nth);
        }

        let pages = self.pages.get(&name).ok_or_else(|| IngestError::Load {
            path: path.to_path_buf(),
            reason: "invalid cross-reference table".to_string(),
        })?;

        Ok(pages
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(page_index, text)| Chunk {
                text: text.clone(),
                source_file: name.clone(),
                page_index,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeEmbedder {
    embedded: Mutex<Vec<String>>,
    calls: AtomicUsize,
    always_fail: HashSet<String>,
    rate_limit_once: Mutex<HashSet<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any batch containing `text` fails with a server error, every time.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.always_fail.insert(text.to_string());
        self
    }

    /// The first batch containing `text` is rejected with a quota error.
    pub fn rate_limited_once_on(self, text: &str) -> Self {
        self.rate_limit_once.lock().unwrap().insert(text.to_string());
        self
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if texts.iter().any(|t| self.always_fail.contains(t)) {
            return Err(ProviderError::Http {
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        {
            let mut pending = self.rate_limit_once.lock().unwrap();
            if let Some(t) = texts.iter().find(|t| pending.contains(*t)) {
                let t = t.clone();
                pending.remove(&t);
                return Err(ProviderError::RateLimited("RESOURCE_EXHAUSTED".to_string()));
            }
        }

        self.embedded.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| features(t)).collect())
    }

    fn name(&self) -> &str {
        "fake-embedder"
    }
}

/// Echoes the prompt back, or fails when built with `failing()`.
#[derive(Default)]
pub struct FakeLlm {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(ProviderError::RateLimited("quota exceeded".to_string()));
        }
        Ok(format!("ANSWER\n{}", prompt))
    }

    fn model(&self) -> &str {
        "fake-llm"
    }
}

/// Creates empty placeholder files so the walker sees them.
pub fn touch_pdfs(dir: &Path, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), b"%PDF-1.4").unwrap();
    }
}

pub fn ledger_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

pub struct Harness {
    pub service: RagService,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<FakeLlm>,
    pub source: Arc<FakeSource>,
}

pub fn harness(
    identity: ProviderIdentity,
    index_root: &Path,
    source: FakeSource,
    embedder: FakeEmbedder,
    llm: FakeLlm,
) -> Harness {
    let embedder = Arc::new(embedder);
    let llm = Arc::new(llm);
    let source = Arc::new(source);

    let service = RagService::new(
        identity,
        index_root,
        embedder.clone(),
        llm.clone(),
        source.clone(),
        RetryPolicy::immediate(3),
        1,
    );

    Harness {
        service,
        embedder,
        llm,
        source,
    }
}

pub fn sorted_texts(chunks: &[Chunk]) -> Vec<String> {
    let mut texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    texts.sort();
    texts
}

pub fn data_dir(root: &Path) -> PathBuf {
    root.join("data")
}
