use std::sync::Arc;

use agentscore_core::{AgentScoreError, ChatModel, ChatRequest, ChatResponse, Message, TokenUsage};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backend::{ProviderBackend, ProviderRequest, ProviderResponse};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Chat model for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatModel {
    config: OpenAiConfig,
    backend: Arc<dyn ProviderBackend>,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        Self { config, backend }
    }

    fn build_request(&self, request: &ChatRequest) -> ProviderRequest {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }

        ProviderRequest {
            url: format!("{}/chat/completions", self.config.base_url),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.api_key),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        }
    }
}

fn message_to_openai(msg: &Message) -> Value {
    let role = match msg {
        Message::System { .. } => "system",
        Message::Human { .. } => "user",
        Message::AI { .. } => "assistant",
    };
    json!({
        "role": role,
        "content": msg.content(),
    })
}

fn parse_response(response: &ProviderResponse) -> Result<ChatResponse, AgentScoreError> {
    match response.status {
        200 => {}
        429 => {
            return Err(AgentScoreError::RateLimit(format!(
                "OpenAI API rate limited: {}",
                response.body
            )))
        }
        status => {
            return Err(AgentScoreError::Model(format!(
                "OpenAI API error ({status}): {}",
                response.body
            )))
        }
    }

    let content = response
        .body
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            AgentScoreError::Parsing("missing 'choices[0].message.content' in response".into())
        })?;

    let usage = response.body.get("usage").map(|u| TokenUsage {
        input_tokens: read_u32(u, "prompt_tokens"),
        output_tokens: read_u32(u, "completion_tokens"),
        total_tokens: read_u32(u, "total_tokens"),
    });

    Ok(ChatResponse {
        message: Message::ai(content),
        usage,
    })
}

fn read_u32(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentScoreError> {
        let provider_request = self.build_request(&request);
        let response = self.backend.send(provider_request).await?;
        parse_response(&response)
    }
}
