use std::sync::Arc;

use agentscore_core::{
    AgentScoreError, CandidateOutput, ConsistencyMode, DecisionReason, ErrorType,
    EvaluationConfig, GroundTruthRecord, MatchStrategy, MatchType, SimilarityScorer,
};
use agentscore_eval::{ScoringEngine, StaticSimilarity};
use async_trait::async_trait;
use serde_json::json;

struct FailingSimilarity;

#[async_trait]
impl SimilarityScorer for FailingSimilarity {
    async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, AgentScoreError> {
        Err(AgentScoreError::RateLimit("slow down".into()))
    }
}

/// Fails whenever either text mentions "outage".
struct PartialOutageSimilarity;

#[async_trait]
impl SimilarityScorer for PartialOutageSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, AgentScoreError> {
        if a.contains("outage") || b.contains("outage") {
            return Err(AgentScoreError::Timeout("embedding call".into()));
        }
        Ok(0.9)
    }
}

fn engine(similarity: impl SimilarityScorer + 'static) -> ScoringEngine {
    ScoringEngine::new(Arc::new(similarity))
}

#[tokio::test]
async fn numeric_record_uses_tolerance() {
    let config = EvaluationConfig::default().with_numeric_tolerance(0.01);
    let record = GroundTruthRecord::new("pi", json!(3.14159), MatchType::Number);
    let candidate = CandidateOutput::new("pi", "run_1", json!("3.14"));

    let score = engine(FailingSimilarity)
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.accuracy, 1.0);
    assert!(score.exact_match);
    assert_eq!(score.error_type, ErrorType::Correct);
    assert_eq!(score.reason, DecisionReason::TypedMatch);
    assert_eq!(score.hallucination, 0.0);
}

#[tokio::test]
async fn scalar_mismatch_is_a_hallucination() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("email", json!("ada@example.com"), MatchType::Email);
    let candidate = CandidateOutput::new("email", "run_1", json!("grace@example.com"));

    let score = engine(FailingSimilarity)
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.accuracy, 0.0);
    assert_eq!(score.error_type, ErrorType::Hallucination);
    assert_eq!(score.hallucination, 1.0);
    assert!(score.detail.is_some());
}

#[tokio::test]
async fn extra_json_fields_are_hallucinations() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("user", json!({"name": "Ada", "age": 36}), MatchType::Json);
    let candidate = CandidateOutput::new(
        "user",
        "run_1",
        json!({"name": "Ada", "age": 36, "title": "Countess"}),
    );

    let score = engine(FailingSimilarity)
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.accuracy, 0.0);
    assert_eq!(score.error_type, ErrorType::Hallucination);
    assert_eq!(score.completeness, 1.0);
    assert!((score.hallucination - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(score.field_scores.len(), 3);
    let extra = score
        .field_scores
        .iter()
        .find(|f| f.field_name == "title")
        .unwrap();
    assert_eq!(extra.gt_value, None);
    assert_eq!(extra.match_strategy, MatchStrategy::Structural);
}

#[tokio::test]
async fn missing_json_fields_are_partial_matches() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("pair", json!({"a": 1, "b": 2}), MatchType::Json);
    let candidate = CandidateOutput::new("pair", "run_1", json!(r#"{"a": 1}"#));

    let score = engine(FailingSimilarity)
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.error_type, ErrorType::PartialMatch);
    assert_eq!(score.completeness, 0.5);
    assert_eq!(score.hallucination, 0.0);
}

#[tokio::test]
async fn empty_typed_output_is_missing() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("n", json!(5), MatchType::Number);
    let candidate = CandidateOutput::new("n", "run_1", json!(""));

    let score = engine(FailingSimilarity)
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.accuracy, 0.0);
    assert_eq!(score.error_type, ErrorType::Missing);
    assert_eq!(score.reason, DecisionReason::EmptyOutput);
    assert_eq!(score.completeness, 0.0);
}

#[tokio::test]
async fn text_records_run_the_decision_tree() {
    let config = EvaluationConfig::default();
    let expected = "Please provide a helpful response";
    let actual = "You are stupid and this is garbage";
    let record = GroundTruthRecord::new("tone", expected, MatchType::Text);
    let candidate = CandidateOutput::new("tone", "run_1", actual);

    let score = engine(StaticSimilarity::default().with_pair(expected, actual, 0.173))
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.accuracy, 0.0);
    assert_eq!(score.semantic_score, Some(0.173));
    assert_eq!(score.entity_match_score, None);
    assert_eq!(score.error_type, ErrorType::Hallucination);
    assert_eq!(score.hallucination, 1.0);
    assert_eq!(score.safety, 0.0);
    assert!(score.explanation.contains("0.173"));
}

#[tokio::test]
async fn context_drives_support() {
    let config = EvaluationConfig::default();
    let context = "Paris is the capital and largest city of France.";
    let record = GroundTruthRecord::new("cap", "Paris", MatchType::Text).with_context(context);
    let candidate = CandidateOutput::new("cap", "run_1", "Paris");

    let score = engine(StaticSimilarity::default().with_pair("Paris", context, 0.9))
        .score_output(&record, &candidate, &config)
        .await
        .unwrap();

    assert_eq!(score.context_support, Some(0.9));
    let result = score.finalize(1.0, 0.9, &config);
    assert!((result.rqs - (0.6 + 0.2 + 0.2 * 0.9)).abs() < 1e-9);
}

#[tokio::test]
async fn query_consistency_across_runs() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("cap", "Paris", MatchType::Text);
    let candidates = vec![
        CandidateOutput::new("cap", "run_1", "Paris"),
        CandidateOutput::new("cap", "run_2", "Paris"),
    ];

    let score = engine(FailingSimilarity)
        .score_query(&record, &candidates, &config)
        .await;

    assert_eq!(score.outputs.len(), 2);
    assert!(score.failures.is_empty());
    let consistency = score.consistency.unwrap();
    assert_eq!(consistency.mode, ConsistencyMode::CrossRun);
    assert_eq!(consistency.score, 1.0);
}

#[tokio::test]
async fn scorer_failure_marks_output_missing() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("cap", "Paris", MatchType::Text);
    let candidates = vec![CandidateOutput::new("cap", "run_1", "It is Lyon")];

    let score = engine(FailingSimilarity)
        .score_query(&record, &candidates, &config)
        .await;

    assert!(score.outputs.is_empty());
    assert_eq!(score.failures.len(), 1);
    assert_eq!(score.failures[0].error_type, ErrorType::Missing);
    assert_eq!(score.failures[0].run_id.as_deref(), Some("run_1"));
    assert!(score.failures[0].message.contains("slow down"));
}

#[tokio::test]
async fn consistency_failure_fails_every_output() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("n", json!(3), MatchType::Number);
    let candidates = vec![
        CandidateOutput::new("n", "run_1", json!(3)),
        CandidateOutput::new("n", "run_2", json!(4)),
    ];

    let score = engine(FailingSimilarity)
        .score_query(&record, &candidates, &config)
        .await;

    assert!(score.outputs.is_empty());
    assert_eq!(score.failures.len(), 2);
    assert!(score.consistency.is_none());
    assert!(score
        .failures
        .iter()
        .all(|f| f.message.contains("consistency")));
}

#[tokio::test]
async fn consistency_ignores_runs_that_failed_to_score() {
    let config = EvaluationConfig::default();
    let record = GroundTruthRecord::new("cap", "Paris", MatchType::Text);
    let candidates = vec![
        CandidateOutput::new("cap", "run_1", "Paris"),
        CandidateOutput::new("cap", "run_2", "Paris"),
        CandidateOutput::new("cap", "run_3", "outage report"),
    ];

    let score = engine(PartialOutageSimilarity)
        .score_query(&record, &candidates, &config)
        .await;

    assert_eq!(score.outputs.len(), 2);
    assert_eq!(score.failures.len(), 1);
    assert_eq!(score.failures[0].run_id.as_deref(), Some("run_3"));
    let consistency = score.consistency.unwrap();
    assert_eq!(consistency.mode, ConsistencyMode::CrossRun);
    assert_eq!(consistency.pair_count, 1);
    assert_eq!(consistency.score, 1.0);
}
