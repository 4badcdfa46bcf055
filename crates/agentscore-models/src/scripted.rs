use std::collections::VecDeque;
use std::sync::Arc;

use agentscore_core::{AgentScoreError, ChatModel, ChatRequest, ChatResponse, Message};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Chat model that replays queued responses in order.
#[derive(Clone)]
pub struct ScriptedChatModel {
    responses: Arc<Mutex<VecDeque<ChatResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedChatModel {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shorthand for assistant replies without usage data.
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            replies
                .into_iter()
                .map(|reply| ChatResponse {
                    message: Message::ai(reply),
                    usage: None,
                })
                .collect(),
        )
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentScoreError> {
        self.requests.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        responses
            .pop_front()
            .ok_or_else(|| AgentScoreError::Model("scripted model exhausted responses".to_string()))
    }
}
