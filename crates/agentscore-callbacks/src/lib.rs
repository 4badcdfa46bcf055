mod channel;
mod tracing_handler;

use std::sync::Arc;

use agentscore_core::{AgentScoreError, ProgressEvent, ProgressHandler, ProgressStatus};
use async_trait::async_trait;
use tokio::sync::RwLock;

pub use channel::ChannelHandler;
pub use tracing_handler::TracingHandler;

/// Keeps every event in memory, in arrival order.
#[derive(Default, Clone)]
pub struct RecordingHandler {
    events: Arc<RwLock<Vec<ProgressEvent>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().await.clone()
    }

    pub async fn count(&self, status: ProgressStatus) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.status == status)
            .count()
    }
}

#[async_trait]
impl ProgressHandler for RecordingHandler {
    async fn on_event(&self, event: ProgressEvent) -> Result<(), AgentScoreError> {
        self.events.write().await.push(event);
        Ok(())
    }
}
