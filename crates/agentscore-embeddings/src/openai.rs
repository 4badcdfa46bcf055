use std::sync::Arc;

use agentscore_core::AgentScoreError;
use agentscore_models::{ProviderBackend, ProviderRequest};
use async_trait::async_trait;
use serde_json::json;

use crate::Embeddings;

pub struct OpenAiEmbeddingsConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiEmbeddingsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Embeddings from any OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    config: OpenAiEmbeddingsConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OpenAiEmbeddings {
    pub fn new(config: OpenAiEmbeddingsConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    fn build_request(&self, input: Vec<String>) -> ProviderRequest {
        ProviderRequest {
            url: format!("{}/embeddings", self.config.base_url),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: json!({
                "model": self.config.model,
                "input": input,
            }),
        }
    }

    fn parse_response(
        &self,
        body: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, AgentScoreError> {
        let data = body.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
            AgentScoreError::Embedding("missing 'data' field in response".to_string())
        })?;
        if data.len() != expected {
            return Err(AgentScoreError::Embedding(format!(
                "expected {expected} embeddings, got {}",
                data.len()
            )));
        }

        let mut indexed = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .map(|i| i as usize)
                .unwrap_or(position);
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| {
                    AgentScoreError::Embedding("missing 'embedding' field".to_string())
                })?
                .iter()
                .map(|v| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        AgentScoreError::Embedding("non-numeric embedding component".into())
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?;
            indexed.push((index, embedding));
        }
        // The API may return items out of input order.
        indexed.sort_by_key(|(index, _)| *index);

        Ok(indexed.into_iter().map(|(_, e)| e).collect())
    }
}

#[async_trait]
impl Embeddings for OpenAiEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AgentScoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        let request = self.build_request(input);
        let response = self.backend.send(request).await?;

        match response.status {
            200 => self.parse_response(&response.body, texts.len()),
            429 => Err(AgentScoreError::RateLimit(format!(
                "OpenAI embeddings rate limited (429): {}",
                response.body
            ))),
            status => Err(AgentScoreError::Embedding(format!(
                "OpenAI API error ({status}): {}",
                response.body
            ))),
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentScoreError> {
        let mut results = self.embed_documents(&[text]).await?;
        results
            .pop()
            .ok_or_else(|| AgentScoreError::Embedding("empty response".to_string()))
    }
}
