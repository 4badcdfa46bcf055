use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use agentscore_core::{
    AgentScoreError, CandidateOutput, EvaluationConfig, EvaluationResult, GroundTruthRecord,
    HistoryStore, ProgressEvent, ProgressHandler, ProgressStatus, QueryFailure,
};
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::dataset::{validate_batch, EvaluationRequest, PathRequest};
use crate::engine::{QueryScore, ScoringEngine};
use crate::report::build_evaluation_result;

/// Cooperative cancellation shared between a caller and a running batch.
///
/// Queries already being scored finish; queries that have not started are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum QueryOutcome {
    Scored(QueryScore),
    Skipped(String),
}

/// Runs a [`ScoringEngine`] over a whole batch with bounded concurrency.
pub struct BatchEvaluator {
    engine: Arc<ScoringEngine>,
    handlers: Vec<Arc<dyn ProgressHandler>>,
    history: Option<Arc<dyn HistoryStore>>,
    agent_name: String,
}

impl BatchEvaluator {
    pub fn new(engine: Arc<ScoringEngine>) -> Self {
        Self {
            engine,
            handlers: Vec::new(),
            history: None,
            agent_name: "evaluator".to_string(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Every completed evaluation is appended to `store`.
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    /// Name reported as `agent_name` on progress events.
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Score `outputs` against `ground_truth`.
    ///
    /// Invalid configuration or malformed batches are rejected up front.
    /// After that no single query can fail the batch: unscorable outputs are
    /// reported in `failures`, and each query missing an output for one of
    /// the batch's runs gets a `missing` failure for that run.
    pub async fn evaluate(
        &self,
        ground_truth: &[GroundTruthRecord],
        outputs: &[CandidateOutput],
        config: &EvaluationConfig,
        cancel: &CancellationFlag,
    ) -> Result<EvaluationResult, AgentScoreError> {
        config.validate()?;
        validate_batch(ground_truth, outputs)?;

        let mut by_query: BTreeMap<&str, Vec<CandidateOutput>> = BTreeMap::new();
        for output in outputs {
            by_query
                .entry(output.query_id.as_str())
                .or_default()
                .push(output.clone());
        }
        let run_ids: BTreeSet<&str> = outputs.iter().map(|o| o.run_id.as_str()).collect();

        tracing::info!(
            queries = ground_truth.len(),
            outputs = outputs.len(),
            runs = run_ids.len(),
            workers = config.workers,
            "evaluation started"
        );
        self.emit(
            ProgressEvent::new(
                &self.agent_name,
                ProgressStatus::Started,
                format!("scoring {} queries", ground_truth.len()),
            )
            .with_details(json!({
                "queries": ground_truth.len(),
                "outputs": outputs.len(),
                "runs": run_ids.len(),
            })),
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(config.workers));
        let completed = AtomicUsize::new(0);
        let total = ground_truth.len();

        let tasks = ground_truth.iter().map(|record| {
            let semaphore = semaphore.clone();
            let candidates = by_query
                .get(record.query_id.as_str())
                .cloned()
                .unwrap_or_default();
            let run_ids = &run_ids;
            let completed = &completed;
            async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    AgentScoreError::Config(format!("worker pool closed: {e}"))
                })?;
                if cancel.is_cancelled() {
                    return Ok(QueryOutcome::Skipped(record.query_id.clone()));
                }

                let mut score = if candidates.is_empty() {
                    QueryScore {
                        query_id: record.query_id.clone(),
                        outputs: Vec::new(),
                        failures: Vec::new(),
                        consistency: None,
                    }
                } else {
                    self.engine.score_query(record, &candidates, config).await
                };
                score
                    .failures
                    .extend(missing_runs(record, &candidates, run_ids));

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let status = if score.failures.is_empty() {
                    ProgressStatus::InProgress
                } else {
                    ProgressStatus::Failed
                };
                self.emit(
                    ProgressEvent::new(
                        &self.agent_name,
                        status,
                        format!("scored query {} ({done}/{total})", record.query_id),
                    )
                    .with_details(json!({
                        "query_id": record.query_id,
                        "scored": score.outputs.len(),
                        "failed": score.failures.len(),
                        "completed": done,
                        "total": total,
                    })),
                )
                .await;
                Ok::<_, AgentScoreError>(QueryOutcome::Scored(score))
            }
        });

        let mut scores = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        for outcome in join_all(tasks).await {
            match outcome? {
                QueryOutcome::Scored(score) => scores.push(score),
                QueryOutcome::Skipped(query_id) => skipped.push(query_id),
            }
        }
        skipped.sort();

        let cancelled = cancel.is_cancelled();
        let result = build_evaluation_result(scores, Vec::new(), skipped, cancelled, config);

        tracing::info!(
            evaluation_id = %result.evaluation_id,
            results = result.results.len(),
            failures = result.failures.len(),
            skipped = result.skipped_queries.len(),
            accuracy = result.aggregate.accuracy,
            rqs = result.aggregate.rqs,
            cancelled,
            "evaluation finished"
        );
        let (status, message) = if cancelled {
            (ProgressStatus::Cancelled, "evaluation cancelled")
        } else {
            (ProgressStatus::Completed, "evaluation completed")
        };
        let details = serde_json::to_value(&result.aggregate).ok();
        let mut event = ProgressEvent::new(&self.agent_name, status, message);
        event.details = details;
        self.emit(event).await;

        if let Some(history) = &self.history {
            if let Err(e) = history.append(&result).await {
                tracing::warn!(evaluation_id = %result.evaluation_id, error = %e, "failed to record evaluation history");
            }
        }
        Ok(result)
    }

    /// Evaluate an inline request using its own key mapping and config.
    pub async fn evaluate_request(
        &self,
        request: &EvaluationRequest,
        cancel: &CancellationFlag,
    ) -> Result<EvaluationResult, AgentScoreError> {
        let (ground_truth, outputs) = request.parse()?;
        self.evaluate(&ground_truth, &outputs, &request.config, cancel)
            .await
    }

    /// Evaluate files named relative to `base_dir`.
    pub async fn evaluate_paths(
        &self,
        base_dir: &Path,
        request: &PathRequest,
        cancel: &CancellationFlag,
    ) -> Result<EvaluationResult, AgentScoreError> {
        let request = request.load(base_dir).await?;
        self.evaluate_request(&request, cancel).await
    }

    async fn emit(&self, event: ProgressEvent) {
        for handler in &self.handlers {
            if let Err(e) = handler.on_event(event.clone()).await {
                tracing::warn!(error = %e, "progress handler failed");
            }
        }
    }
}

fn missing_runs(
    record: &GroundTruthRecord,
    candidates: &[CandidateOutput],
    run_ids: &BTreeSet<&str>,
) -> Vec<QueryFailure> {
    let present: BTreeSet<&str> = candidates.iter().map(|c| c.run_id.as_str()).collect();
    if run_ids.is_empty() {
        return vec![QueryFailure::missing(
            &record.query_id,
            None,
            "no output for this query",
        )];
    }
    run_ids
        .difference(&present)
        .map(|run_id| {
            QueryFailure::missing(
                &record.query_id,
                Some(run_id.to_string()),
                format!("no output for this query in {run_id}"),
            )
        })
        .collect()
}
