use async_trait::async_trait;

use crate::error::ProviderError;

/// Texts per embedding request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".to_string()))
    }

    fn name(&self) -> &str;
}

/// Embeds `texts` in batches of [`EMBED_BATCH_SIZE`], failing on the first bad batch.
pub async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        let batch_vectors = provider.embed_batch(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "sent {} texts, received {} embeddings",
                batch.len(),
                batch_vectors.len()
            )));
        }
        vectors.extend(batch_vectors);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    #[tokio::test]
    async fn test_embed_all_batches_and_keeps_order() {
        let provider = LengthEmbedder { calls: AtomicUsize::new(0) };
        let texts: Vec<String> = (0..70).map(|i| "x".repeat(i)).collect();

        let vectors = embed_all(&provider, &texts).await.unwrap();

        assert_eq!(vectors.len(), 70);
        assert_eq!(vectors[69], vec![69.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_embed_single_uses_batch() {
        let provider = LengthEmbedder { calls: AtomicUsize::new(0) };
        assert_eq!(provider.embed("abcd").await.unwrap(), vec![4.0]);
    }
}
