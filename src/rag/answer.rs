use std::sync::Arc;

use crate::error::AnswerError;
use super::embeddings::EmbeddingProvider;
use super::llm::LanguageModel;
use super::vector_store::{SearchResult, VectorIndex};

pub const NOT_INITIALIZED: &str =
    "I am not initialized with any documents yet. Please add PDF files to the data folder.";

/// Text of the stand-in entry used when no document has been indexed.
pub const PLACEHOLDER_TEXT: &str = "No context available.";

/// Fills the fixed template with retrieved passages and the raw question.
pub fn build_prompt(passages: &[SearchResult], question: &str) -> String {
    let context = passages
        .iter()
        .map(|p| p.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Eres Tomi, un asistente educativo amable y paciente que ayuda a niños y niñas de primaria con sus tareas.
Responde siempre en español, con frases cortas, claras y un tono alegre.
Usa únicamente la información del contexto. Si la respuesta no está en el contexto, dilo con sinceridad y no inventes nada.

Contexto:
{context}

Pregunta: {question}
Respuesta:"
    )
}

/// Retrieval-augmented answering over a finished index.
pub struct AnswerGenerator {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    index: VectorIndex,
    top_k: usize,
    grounded: bool,
}

impl AnswerGenerator {
    /// `grounded` is false when `index` only holds the placeholder entry.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        index: VectorIndex,
        top_k: usize,
        grounded: bool,
    ) -> Self {
        Self {
            embedder,
            llm,
            index,
            top_k,
            grounded,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>, AnswerError> {
        let vector = self.embedder.embed(query).await?;
        Ok(self.index.query(&vector, self.top_k)?)
    }

    /// Always returns text: the model's answer, the not-initialized notice, or an error message.
    pub async fn answer(&self, query: &str) -> String {
        if !self.grounded {
            return NOT_INITIALIZED.to_string();
        }

        match self.generate(query).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                format!("Error generating answer: {}", e)
            }
        }
    }

    async fn generate(&self, query: &str) -> Result<String, AnswerError> {
        let passages = self.retrieve(query).await?;
        tracing::debug!("Retrieved {} passages for query", passages.len());

        let prompt = build_prompt(&passages, query);
        Ok(self.llm.complete(&prompt).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(text: &str) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                text: text.to_string(),
                source_file: "ciencias.pdf".to_string(),
                page_index: 0,
            },
            distance: 0.0,
        }
    }

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_prompt(
            &[hit("Las plantas hacen fotosíntesis."), hit("El agua hierve a 100 grados.")],
            "¿Qué hacen las plantas?",
        );
        assert!(prompt.starts_with("Eres Tomi"));
        assert!(prompt.contains("Las plantas hacen fotosíntesis.\n\nEl agua hierve a 100 grados."));
        assert!(prompt.contains("Pregunta: ¿Qué hacen las plantas?"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_prompt_with_no_passages() {
        let prompt = build_prompt(&[], "hola");
        assert!(prompt.contains("Contexto:\n\n\nPregunta: hola"));
    }
}
