mod backend;
pub use backend::{FakeBackend, HttpBackend, ProviderBackend, ProviderRequest, ProviderResponse};

mod scripted;
pub use scripted::ScriptedChatModel;

mod openai;
pub use openai::{OpenAiChatModel, OpenAiConfig};

mod retry;
pub use retry::{RetryChatModel, RetryPolicy};
