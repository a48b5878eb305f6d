use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to an embedding or language model backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` status from the provider.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Builds the error for a non-success HTTP response, recognising rate limits.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || is_resource_exhausted(&body) {
            ProviderError::RateLimited(body)
        } else {
            ProviderError::Http { status, body }
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

fn is_resource_exhausted(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("resource_exhausted") || lower.contains("resource exhausted")
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot build an index from zero entries")]
    Empty,

    #[error("vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Anything that can go wrong while ingesting one file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to load document {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("embedding count mismatch: sent {sent} chunks, got {received} vectors")]
    EmbeddingCount { sent: usize, received: usize },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("ledger write failed: {0}")]
    Ledger(#[source] std::io::Error),
}

/// Failure on the query path. Never leaves the answer generator; it is rendered as text.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
