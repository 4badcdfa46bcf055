use std::path::PathBuf;
use std::sync::Arc;

use agentscore_core::{AgentScoreError, EvaluationResult, EvaluationSummary, HistoryStore};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Keeps evaluation results in memory, optionally bounded to the most
/// recent `capacity` entries.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<Vec<EvaluationResult>>>,
    capacity: Option<usize>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, result: &EvaluationResult) -> Result<(), AgentScoreError> {
        let mut entries = self.entries.write().await;
        entries.push(result.clone());
        if let Some(capacity) = self.capacity {
            let excess = entries.len().saturating_sub(capacity);
            entries.drain(..excess);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EvaluationSummary>, AgentScoreError> {
        let entries = self.entries.read().await;
        let mut summaries: Vec<EvaluationSummary> =
            entries.iter().map(EvaluationResult::summary).collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn get(&self, evaluation_id: &str) -> Result<Option<EvaluationResult>, AgentScoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|r| r.evaluation_id == evaluation_id)
            .cloned())
    }

    async fn latest(&self) -> Result<Option<EvaluationResult>, AgentScoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().max_by_key(|r| r.created_at).cloned())
    }
}

/// Stores each evaluation as `{dir}/{evaluation_id}.json`.
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn result_path(&self, evaluation_id: &str) -> Result<PathBuf, AgentScoreError> {
        let valid = !evaluation_id.is_empty()
            && evaluation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AgentScoreError::Validation(format!(
                "invalid evaluation id {evaluation_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{evaluation_id}.json")))
    }

    async fn read_result(&self, path: &std::path::Path) -> Result<EvaluationResult, AgentScoreError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentScoreError::History(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            AgentScoreError::History(format!("failed to parse {}: {e}", path.display()))
        })
    }

    async fn read_all(&self) -> Result<Vec<EvaluationResult>, AgentScoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AgentScoreError::History(format!(
                    "failed to read {}: {e}",
                    self.dir.display()
                )))
            }
        };

        let mut results = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| AgentScoreError::History(format!("failed to list history: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                results.push(self.read_result(&path).await?);
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, result: &EvaluationResult) -> Result<(), AgentScoreError> {
        let path = self.result_path(&result.evaluation_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AgentScoreError::History(format!("failed to create directory: {e}")))?;
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| AgentScoreError::History(format!("failed to serialize result: {e}")))?;
        tokio::fs::write(&path, json).await.map_err(|e| {
            AgentScoreError::History(format!("failed to write {}: {e}", path.display()))
        })
    }

    async fn list(&self) -> Result<Vec<EvaluationSummary>, AgentScoreError> {
        let mut summaries: Vec<EvaluationSummary> = self
            .read_all()
            .await?
            .iter()
            .map(EvaluationResult::summary)
            .collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn get(&self, evaluation_id: &str) -> Result<Option<EvaluationResult>, AgentScoreError> {
        let path = self.result_path(evaluation_id)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => self.read_result(&path).await.map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(AgentScoreError::History(format!(
                "failed to stat {}: {e}",
                path.display()
            ))),
        }
    }

    async fn latest(&self) -> Result<Option<EvaluationResult>, AgentScoreError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .max_by_key(|r| r.created_at))
    }
}

fn sort_newest_first(summaries: &mut [EvaluationSummary]) {
    summaries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.evaluation_id.cmp(&b.evaluation_id))
    });
}
