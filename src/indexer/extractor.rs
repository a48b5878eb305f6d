use std::path::Path;

use crate::error::IngestError;
use crate::models::Chunk;
use super::chunker::split_page;
use super::walker::ledger_name;

/// Turns a source file into an ordered list of chunks.
pub trait ChunkSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Chunk>, IngestError>;
}

/// Reads a PDF page by page and splits over-long pages.
#[derive(Debug, Clone)]
pub struct PdfChunkSource {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl PdfChunkSource {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl ChunkSource for PdfChunkSource {
    fn load(&self, path: &Path) -> Result<Vec<Chunk>, IngestError> {
        let pages = extract_pages(path)?;
        let source_file = ledger_name(path);

        let chunks = pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, page)| {
                split_page(page, &source_file, page_index, self.chunk_size, self.chunk_overlap)
            })
            .collect();
        Ok(chunks)
    }
}

fn extract_pages(path: &Path) -> Result<Vec<String>, IngestError> {
    let load_error = |reason: String| IngestError::Load {
        path: path.to_path_buf(),
        reason,
    };

    // pdf-extract panics on some malformed inputs
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(load_error(e.to_string())),
        Err(panic_info) => {
            let reason = if let Some(s) = panic_info.downcast_ref::<&str>() {
                format!("PDF parser panicked: {}", s)
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                format!("PDF parser panicked: {}", s)
            } else {
                "PDF parser panicked".to_string()
            };
            Err(load_error(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = PdfChunkSource::new(4000, 200).load(&path).unwrap_err();
        assert!(matches!(err, IngestError::Load { .. }));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdfChunkSource::new(4000, 200)
            .load(&dir.path().join("absent.pdf"))
            .unwrap_err();
        assert!(matches!(err, IngestError::Load { .. }));
    }
}
