use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of extracted document text, roughly one PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_file: String,
    pub page_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sentiment: String,
}

impl ChatResponse {
    pub fn neutral(response: String) -> Self {
        Self {
            response,
            sentiment: "neutral".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatusResponse {
    pub provider: String,
    pub is_indexing: bool,
    pub ready: bool,
    pub total_files_processed: usize,
    pub total_entries: usize,
    pub ingested_this_run: Vec<String>,
    pub failed_files: Vec<String>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub data_dir: String,
}
