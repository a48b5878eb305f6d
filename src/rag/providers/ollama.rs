//! Locally served models through the Ollama HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::rag::embeddings::EmbeddingProvider;
use crate::rag::llm::LanguageModel;

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    embed_model: String,
    chat_model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(
        client: Client,
        base_url: String,
        embed_model: String,
        chat_model: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            embed_model,
            chat_model,
            temperature,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        Ok(text)
    }
}

fn parse_embeddings(body: &str) -> Result<Vec<Vec<f32>>, ProviderError> {
    let parsed: EmbedResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Ollama embeddings: {}", e)))?;
    Ok(parsed.embeddings)
}

fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Ollama completion: {}", e)))?;
    Ok(parsed.response)
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbedRequest {
            model: &self.embed_model,
            input: texts,
        };
        let body = self.post("/api/embed", &request).await?;
        parse_embeddings(&body)
    }

    fn name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl LanguageModel for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model: &self.chat_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let body = self.post("/api/generate", &request).await?;
        parse_completion(&body)
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}
