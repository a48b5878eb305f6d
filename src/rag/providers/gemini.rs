//! Hosted Gemini backend (Generative Language API).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::rag::embeddings::EmbeddingProvider;
use crate::rag::llm::LanguageModel;

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    embed_model: String,
    chat_model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini expects resource names of the form `models/<id>`.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

impl GeminiProvider {
    pub fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        embed_model: String,
        chat_model: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            embed_model: model_path(&embed_model),
            chat_model: model_path(&chat_model),
            temperature,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String, ProviderError> {
        let mut req = self.client.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("x-goog-api-key", key);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), text));
        }
        Ok(text)
    }
}

fn parse_embeddings(body: &str) -> Result<Vec<Vec<f32>>, ProviderError> {
    let parsed: BatchEmbedResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Gemini embeddings: {}", e)))?;
    Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
}

fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Gemini completion: {}", e)))?;

    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| ProviderError::InvalidResponse("no candidates in Gemini response".to_string()))?;

    Ok(parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.embed_model,
                    content: Content {
                        role: None,
                        parts: vec![Part { text: text.as_str() }],
                    },
                })
                .collect(),
        };

        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.embed_model);
        let body = self.post(&url, &request).await?;
        parse_embeddings(&body)
    }

    fn name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl LanguageModel for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.chat_model);
        let body = self.post(&url, &request).await?;
        parse_completion(&body)
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_prefix() {
        assert_eq!(model_path("gemini-1.5-flash"), "models/gemini-1.5-flash");
        assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    }

    #[test]
    fn test_parse_embeddings() {
        let body = r#"{"embeddings":[{"values":[0.5,-1.0]},{"values":[2.0,0.25]}]}"#;
        let vectors = parse_embeddings(body).unwrap();
        assert_eq!(vectors, vec![vec![0.5, -1.0], vec![2.0, 0.25]]);
    }

    #[test]
    fn test_parse_completion_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"¡Hola! "},{"text":"Soy Tomi."}]}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "¡Hola! Soy Tomi.");
    }

    #[test]
    fn test_parse_completion_without_candidates() {
        let err = parse_completion(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
