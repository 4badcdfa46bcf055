use std::collections::HashMap;
use std::sync::Arc;

use agentscore_core::AgentScoreError;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Embeddings;

/// An embeddings wrapper that caches results in memory.
///
/// Consistency scoring embeds the same outputs once per pair; the cache keeps
/// that to one provider call per distinct text.
pub struct CacheBackedEmbeddings {
    inner: Arc<dyn Embeddings>,
    cache: Arc<RwLock<HashMap<String, Vec<f32>>>>,
}

impl CacheBackedEmbeddings {
    pub fn new(inner: Arc<dyn Embeddings>) -> Self {
        Self {
            inner,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl Embeddings for CacheBackedEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AgentScoreError> {
        let cache = self.cache.read().await;
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut uncached_indices: Vec<usize> = Vec::new();
        let mut uncached_texts: Vec<&str> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(cached) = cache.get(*text) {
                results.push(Some(cached.clone()));
            } else {
                results.push(None);
                uncached_indices.push(i);
                uncached_texts.push(text);
            }
        }
        drop(cache);

        if !uncached_texts.is_empty() {
            let new_embeddings = self.inner.embed_documents(&uncached_texts).await?;
            if new_embeddings.len() != uncached_texts.len() {
                return Err(AgentScoreError::Embedding(format!(
                    "provider returned {} embeddings for {} texts",
                    new_embeddings.len(),
                    uncached_texts.len()
                )));
            }

            let mut cache = self.cache.write().await;
            for (idx, embedding) in uncached_indices.iter().zip(new_embeddings) {
                cache.insert(texts[*idx].to_string(), embedding.clone());
                results[*idx] = Some(embedding);
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AgentScoreError::Embedding("embedding missing after fill".into()))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentScoreError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(text) {
                return Ok(cached.clone());
            }
        }

        let embedding = self.inner.embed_query(text).await?;

        {
            let mut cache = self.cache.write().await;
            cache.insert(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }
}
