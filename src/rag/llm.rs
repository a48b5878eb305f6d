use async_trait::async_trait;

use crate::error::ProviderError;

/// Generates a completion for a fully composed prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;

    fn model(&self) -> &str;
}
