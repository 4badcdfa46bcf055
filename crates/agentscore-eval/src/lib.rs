mod batch;
mod consistency;
mod dataset;
mod decision;
mod engine;
mod entity;
mod history;
mod judge;
mod matcher;
mod report;
mod rqs;
mod safety;
mod similarity;
mod structure;
mod text;

use std::future::Future;
use std::time::Duration;

use agentscore_core::{AgentScoreError, EvaluationConfig};

pub use batch::{BatchEvaluator, CancellationFlag};
pub use consistency::{
    cross_run_consistency, internal_consistency, normalize_similarity, pairwise_consistency,
    ConsistencyScore,
};
pub use dataset::{
    convert_records, load_records, parse_candidate_outputs, parse_ground_truth, resolve_within,
    validate_batch, ConvertMode, EvaluationRequest, KeyMapping, PathRequest,
};
pub use decision::{explain, AccuracyDecision, DecisionTree};
pub use engine::{classify_text, OutputScore, QueryScore, ScoringEngine};
pub use entity::{entity_match, RuleBasedEntityExtractor};
pub use history::{FileHistoryStore, InMemoryHistoryStore};
pub use judge::{parse_judge_score, LlmJudge};
pub use matcher::{
    normalize_date, normalize_email, parse_number, parse_structured, structurally_equal,
    Comparator, Comparison, MatchOutcome,
};
pub use report::build_evaluation_result;
pub use rqs::{aggregate, compute_rqs, correctness_ratio, resolve_profile, RqsSignals};
pub use safety::KeywordSafetyScorer;
pub use similarity::{cosine_similarity, EmbeddingSimilarity, StaticSimilarity};
pub use structure::{analyze, compare_leaf, flatten, unflatten, StructuralAnalysis};
pub use text::{fuzzy_ratio, is_blank, normalize_whitespace, render_value, split_sentences};

/// Bound an external call by `scorer_timeout_ms`.
pub(crate) async fn with_timeout<T, F>(
    config: &EvaluationConfig,
    what: &str,
    call: F,
) -> Result<T, AgentScoreError>
where
    F: Future<Output = Result<T, AgentScoreError>>,
{
    if config.scorer_timeout_ms == 0 {
        return call.await;
    }
    tokio::time::timeout(Duration::from_millis(config.scorer_timeout_ms), call)
        .await
        .map_err(|_| {
            AgentScoreError::Timeout(format!(
                "{what} exceeded {} ms",
                config.scorer_timeout_ms
            ))
        })?
}
