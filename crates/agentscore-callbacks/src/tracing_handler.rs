use agentscore_core::{AgentScoreError, ProgressEvent, ProgressHandler, ProgressStatus};
use async_trait::async_trait;

/// Forwards progress events to `tracing`.
pub struct TracingHandler;

impl TracingHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressHandler for TracingHandler {
    async fn on_event(&self, event: ProgressEvent) -> Result<(), AgentScoreError> {
        let agent = event.agent_name.as_str();
        let message = event.message.as_str();
        match event.status {
            ProgressStatus::Started => {
                tracing::info!(agent = %agent, "evaluation started: {message}");
            }
            ProgressStatus::InProgress => {
                tracing::debug!(agent = %agent, "{message}");
            }
            ProgressStatus::Completed => {
                tracing::info!(agent = %agent, "evaluation completed: {message}");
            }
            ProgressStatus::Failed => {
                tracing::warn!(agent = %agent, "{message}");
            }
            ProgressStatus::Cancelled => {
                tracing::warn!(agent = %agent, "evaluation cancelled: {message}");
            }
        }
        Ok(())
    }
}
