use std::sync::Arc;

use agentscore_core::{AgentScoreError, ChatModel, ChatRequest, Judge, Message};
use async_trait::async_trait;

const SYSTEM_PROMPT: &str = "You are an impartial judge grading an AI agent's answer against a reference answer. Respond with ONLY a single integer between 0 and 10.";

const DEFAULT_PROMPT_TEMPLATE: &str = r#"Question: {query}
Reference answer: {expected}
Agent answer: {actual}

Judge whether the agent answer conveys the same facts as the reference answer. Wording may differ.
Rate it on a scale of 0 to 10, where 0 means wrong or unrelated and 10 means fully equivalent."#;

/// LLM-backed judge that rates an answer 0-10 and reports it in `[0, 1]`.
pub struct LlmJudge {
    model: Arc<dyn ChatModel>,
    prompt_template: String,
}

impl LlmJudge {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    /// Use a custom prompt. `{query}`, `{expected}` and `{actual}` are substituted.
    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub fn render_prompt(&self, query: &str, expected: &str, actual: &str) -> String {
        self.prompt_template
            .replace("{query}", query)
            .replace("{expected}", expected)
            .replace("{actual}", actual)
    }
}

/// First number in `0..=10` found in the reply, scaled to `[0, 1]`.
/// Handles `7`, `Score: 8.5` and `9/10`. Negative numbers never count.
pub fn parse_judge_score(text: &str) -> Option<f64> {
    text.split(|c: char| c.is_whitespace() || c == '/')
        .filter_map(|word| {
            let word = word
                .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
                .trim_end_matches(|c: char| !c.is_ascii_digit());
            if word.starts_with('-') {
                return None;
            }
            word.parse::<f64>().ok()
        })
        .find(|num| (0.0..=10.0).contains(num))
        .map(|num| num / 10.0)
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(
        &self,
        query: &str,
        expected: &str,
        actual: &str,
    ) -> Result<f64, AgentScoreError> {
        let prompt = self.render_prompt(query, expected, actual);
        let response = self
            .model
            .chat(ChatRequest::new(vec![
                Message::system(SYSTEM_PROMPT),
                Message::human(prompt),
            ]))
            .await?;
        let reply = response.message.content();

        parse_judge_score(reply).ok_or_else(|| {
            AgentScoreError::Parsing(format!("could not parse judge score from {reply:?}"))
        })
    }
}
