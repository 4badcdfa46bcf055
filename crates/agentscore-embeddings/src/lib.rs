mod cached;
mod fake;
mod openai;

pub use cached::CacheBackedEmbeddings;
pub use fake::FakeEmbeddings;
pub use openai::{OpenAiEmbeddings, OpenAiEmbeddingsConfig};

// Re-export the Embeddings trait from core (forward-declared there).
pub use agentscore_core::Embeddings;
