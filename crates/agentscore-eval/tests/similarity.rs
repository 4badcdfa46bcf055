use std::sync::Arc;

use agentscore_core::{AgentScoreError, Embeddings, SimilarityScorer};
use agentscore_embeddings::FakeEmbeddings;
use agentscore_eval::{cosine_similarity, EmbeddingSimilarity, StaticSimilarity};
use async_trait::async_trait;

#[test]
fn cosine_similarity_bounds() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[tokio::test]
async fn embedding_similarity_of_identical_texts_is_one() {
    let scorer = EmbeddingSimilarity::new(Arc::new(FakeEmbeddings::default()));
    let score = scorer.similarity("same text", "same text").await.unwrap();
    assert!((score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn embedding_similarity_of_different_texts_is_lower() {
    let scorer = EmbeddingSimilarity::new(Arc::new(FakeEmbeddings::default()));
    let score = scorer.similarity("hello world", "zzzzzzzzz").await.unwrap();
    assert!(score < 0.99);
    assert!((-1.0..=1.0).contains(&score));
}

struct ShortEmbeddings;

#[async_trait]
impl Embeddings for ShortEmbeddings {
    async fn embed_documents(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, AgentScoreError> {
        Ok(vec![vec![1.0, 0.0]])
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, AgentScoreError> {
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn wrong_embedding_count_is_an_embedding_error() {
    let scorer = EmbeddingSimilarity::new(Arc::new(ShortEmbeddings));
    let err = scorer.similarity("a", "b").await.unwrap_err();
    assert!(matches!(err, AgentScoreError::Embedding(_)));
}

#[tokio::test]
async fn static_similarity_is_symmetric_with_default() {
    let scorer = StaticSimilarity::new(0.1).with_pair("cat", "kitten", 0.9);

    assert_eq!(scorer.similarity("cat", "kitten").await.unwrap(), 0.9);
    assert_eq!(scorer.similarity("kitten", "cat").await.unwrap(), 0.9);
    assert_eq!(scorer.similarity("dog", "dog").await.unwrap(), 1.0);
    assert_eq!(scorer.similarity("dog", "cat").await.unwrap(), 0.1);
}
