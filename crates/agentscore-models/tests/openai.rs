use std::sync::Arc;

use agentscore_core::{AgentScoreError, ChatModel, ChatRequest, Message};
use agentscore_models::{FakeBackend, OpenAiChatModel, OpenAiConfig, ProviderResponse};
use serde_json::json;

fn judge_request() -> ChatRequest {
    ChatRequest::new(vec![
        Message::system("You grade answers."),
        Message::human("Rate this answer."),
    ])
}

#[tokio::test]
async fn openai_chat_parses_content_and_usage() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!({
            "choices": [{"message": {"role": "assistant", "content": "8"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }),
    });

    let model = OpenAiChatModel::new(
        OpenAiConfig::new("test-key", "gpt-4o-mini").with_temperature(0.0),
        backend.clone(),
    );
    let response = model.chat(judge_request()).await.unwrap();

    assert_eq!(response.message.content(), "8");
    let usage = response.usage.unwrap();
    assert_eq!(usage.input_tokens, 12);
    assert_eq!(usage.total_tokens, 13);

    let requests = backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/chat/completions"));
    assert_eq!(requests[0].body["messages"][0]["role"], "system");
    assert_eq!(requests[0].body["messages"][1]["role"], "user");
    assert_eq!(requests[0].body["temperature"], 0.0);
}

#[tokio::test]
async fn openai_rate_limit_maps_to_rate_limit_error() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 429,
        body: json!({"error": {"message": "slow down"}}),
    });

    let model = OpenAiChatModel::new(OpenAiConfig::new("k", "m"), backend);
    let err = model.chat(judge_request()).await.unwrap_err();
    assert!(matches!(err, AgentScoreError::RateLimit(_)));
}

#[tokio::test]
async fn openai_server_error_includes_status() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 500,
        body: json!({"error": "boom"}),
    });

    let model = OpenAiChatModel::new(OpenAiConfig::new("k", "m"), backend);
    let err = model.chat(judge_request()).await.unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn openai_missing_content_is_parsing_error() {
    let backend = Arc::new(FakeBackend::new());
    backend.push_response(ProviderResponse {
        status: 200,
        body: json!({"choices": []}),
    });

    let model = OpenAiChatModel::new(OpenAiConfig::new("k", "m"), backend);
    let err = model.chat(judge_request()).await.unwrap_err();
    assert!(matches!(err, AgentScoreError::Parsing(_)));
}
