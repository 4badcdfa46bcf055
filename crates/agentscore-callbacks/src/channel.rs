use agentscore_core::{AgentScoreError, ProgressEvent, ProgressHandler};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sends events into an mpsc channel, e.g. for a server-sent events endpoint.
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelHandler {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    /// Create a handler together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl ProgressHandler for ChannelHandler {
    async fn on_event(&self, event: ProgressEvent) -> Result<(), AgentScoreError> {
        self.sender
            .send(event)
            .map_err(|_| AgentScoreError::Callback("progress receiver dropped".to_string()))
    }
}
