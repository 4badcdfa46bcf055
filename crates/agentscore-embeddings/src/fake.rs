use agentscore_core::AgentScoreError;
use async_trait::async_trait;

use crate::Embeddings;

/// Deterministic embeddings for tests and offline runs.
///
/// Vectors are derived from the bytes of the input, so identical texts embed
/// identically and texts sharing characters land close together.
pub struct FakeEmbeddings {
    dimensions: usize,
}

impl FakeEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for FakeEmbeddings {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AgentScoreError> {
        Ok(texts
            .iter()
            .map(|t| text_to_vector(t, self.dimensions))
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentScoreError> {
        Ok(text_to_vector(text, self.dimensions))
    }
}

fn text_to_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimensions];
    for byte in text.to_lowercase().bytes() {
        vec[byte as usize % dimensions] += 1.0;
    }
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut vec {
            *x /= magnitude;
        }
    }
    vec
}
