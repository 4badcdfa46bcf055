use std::collections::HashMap;
use std::sync::Arc;

use agentscore_core::{AgentScoreError, Embeddings, SimilarityScorer};
use async_trait::async_trait;

/// Cosine similarity between two vectors. Zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let mag_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Semantic similarity backed by any embedding model.
///
/// Both texts are embedded in a single batched call.
pub struct EmbeddingSimilarity {
    embeddings: Arc<dyn Embeddings>,
}

impl EmbeddingSimilarity {
    pub fn new(embeddings: Arc<dyn Embeddings>) -> Self {
        Self { embeddings }
    }
}

#[async_trait]
impl SimilarityScorer for EmbeddingSimilarity {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, AgentScoreError> {
        let vectors = self.embeddings.embed_documents(&[text_a, text_b]).await?;
        let [a, b] = vectors.as_slice() else {
            return Err(AgentScoreError::Embedding(format!(
                "expected 2 embeddings, got {}",
                vectors.len()
            )));
        };
        if a.len() != b.len() {
            return Err(AgentScoreError::Embedding(format!(
                "embedding dimensions differ: {} vs {}",
                a.len(),
                b.len()
            )));
        }
        Ok(cosine_similarity(a, b))
    }
}

/// Lookup-table similarity for tests and offline runs.
///
/// Pairs are symmetric. Identical texts score 1.0; anything unknown gets the
/// default.
#[derive(Debug, Clone)]
pub struct StaticSimilarity {
    scores: HashMap<(String, String), f64>,
    default: f64,
}

impl StaticSimilarity {
    pub fn new(default: f64) -> Self {
        Self {
            scores: HashMap::new(),
            default,
        }
    }

    pub fn with_pair(mut self, a: impl Into<String>, b: impl Into<String>, score: f64) -> Self {
        self.scores.insert(Self::key(&a.into(), &b.into()), score);
        self
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

impl Default for StaticSimilarity {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[async_trait]
impl SimilarityScorer for StaticSimilarity {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, AgentScoreError> {
        if let Some(score) = self.scores.get(&Self::key(text_a, text_b)) {
            return Ok(*score);
        }
        if text_a == text_b {
            return Ok(1.0);
        }
        Ok(self.default)
    }
}
