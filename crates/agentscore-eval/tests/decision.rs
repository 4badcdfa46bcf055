use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentscore_core::{
    AgentScoreError, DecisionReason, EntityExtractor, ErrorType, EvaluationConfig,
    SimilarityScorer,
};
use agentscore_eval::{
    classify_text, explain, DecisionTree, LlmJudge, RuleBasedEntityExtractor, StaticSimilarity,
};
use agentscore_models::ScriptedChatModel;
use async_trait::async_trait;

const EXPECTED_PARIS: &str = "The Eiffel Tower is in Paris, France.";
const ACTUAL_BERLIN: &str = "The Eiffel Tower is in Berlin, Germany.";

/// Similarity scorer that must never be reached.
struct UnreachableSimilarity;

#[async_trait]
impl SimilarityScorer for UnreachableSimilarity {
    async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, AgentScoreError> {
        Err(AgentScoreError::Embedding("similarity should not be called".into()))
    }
}

struct SlowSimilarity;

#[async_trait]
impl SimilarityScorer for SlowSimilarity {
    async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, AgentScoreError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(0.9)
    }
}

/// Extractor with fixed entity sets per text, counting its calls.
#[derive(Default)]
struct TableExtractor {
    table: HashMap<String, BTreeSet<String>>,
    calls: AtomicUsize,
}

impl TableExtractor {
    fn with(mut self, text: &str, entities: &[&str]) -> Self {
        self.table.insert(
            text.to_string(),
            entities.iter().map(|e| e.to_string()).collect(),
        );
        self
    }
}

impl EntityExtractor for TableExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.get(text).cloned().unwrap_or_default()
    }
}

#[tokio::test]
async fn exact_match_short_circuits() {
    let config = EvaluationConfig::default();
    let extractor = TableExtractor::default();
    let tree = DecisionTree::new(&UnreachableSimilarity, &extractor, &config);

    let decision = tree.decide("", "Paris", "Paris").await.unwrap();

    assert_eq!(decision.accuracy, 1.0);
    assert!(decision.exact_match);
    assert_eq!(decision.reason, DecisionReason::ExactMatch);
    assert_eq!(decision.semantic_score, None);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn semantic_gate_is_absolute() {
    let config = EvaluationConfig::default();
    let expected = "Please provide a helpful response";
    let actual = "You are stupid and this is garbage";
    let similarity = StaticSimilarity::default().with_pair(expected, actual, 0.173);
    let extractor = TableExtractor::default();
    let tree = DecisionTree::new(&similarity, &extractor, &config);

    let decision = tree.decide("", expected, actual).await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.reason, DecisionReason::SemanticBelowThreshold);
    assert_eq!(decision.semantic_score, Some(0.173));
    assert_eq!(decision.entity_score, None);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(classify_text(&decision, &config), ErrorType::Hallucination);
    assert!(explain(&decision, &config).contains("0.173"));
}

#[tokio::test]
async fn score_at_threshold_fails_the_gate() {
    let config = EvaluationConfig::default();
    let similarity = StaticSimilarity::new(0.72);
    let extractor = RuleBasedEntityExtractor::new();
    let tree = DecisionTree::new(&similarity, &extractor, &config);

    let decision = tree.decide("", "alpha", "beta").await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.reason, DecisionReason::SemanticBelowThreshold);
    assert_eq!(classify_text(&decision, &config), ErrorType::PartialMatch);
}

#[tokio::test]
async fn entity_mismatch_overrides_semantic_pass() {
    let config = EvaluationConfig::default();
    let similarity = StaticSimilarity::default().with_pair(EXPECTED_PARIS, ACTUAL_BERLIN, 0.85);
    let extractor = TableExtractor::default()
        .with(EXPECTED_PARIS, &["eiffel tower", "paris", "france"])
        .with(ACTUAL_BERLIN, &["eiffel tower", "berlin", "germany"]);
    let tree = DecisionTree::new(&similarity, &extractor, &config);

    let decision = tree.decide("", EXPECTED_PARIS, ACTUAL_BERLIN).await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.reason, DecisionReason::EntityMismatch);
    assert!((decision.entity_score.unwrap() - 0.2).abs() < 1e-9);
    assert_eq!(classify_text(&decision, &config), ErrorType::Hallucination);
}

#[tokio::test]
async fn semantic_and_entity_pass() {
    let config = EvaluationConfig::default();
    let expected = "Curie won prizes in 1903 and 1911 in Paris.";
    let actual = "In Paris, Curie won prizes in 1903 and 1911.";
    let similarity = StaticSimilarity::default().with_pair(expected, actual, 0.85);
    let extractor = TableExtractor::default()
        .with(expected, &["curie", "1903", "1911", "paris", "sorbonne"])
        .with(actual, &["curie", "1903", "1911", "paris"]);
    let tree = DecisionTree::new(&similarity, &extractor, &config);

    let decision = tree.decide("", expected, actual).await.unwrap();

    assert_eq!(decision.accuracy, 1.0);
    assert!(!decision.exact_match);
    assert_eq!(decision.reason, DecisionReason::SemanticAndEntityPass);
    assert!((decision.entity_score.unwrap() - 0.8).abs() < 1e-9);
    assert_eq!(classify_text(&decision, &config), ErrorType::Correct);
}

#[tokio::test]
async fn empty_output_fails_without_external_calls() {
    let config = EvaluationConfig::default();
    let extractor = RuleBasedEntityExtractor::new();
    let tree = DecisionTree::new(&UnreachableSimilarity, &extractor, &config);

    let decision = tree.decide("", "Paris", "   ").await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.reason, DecisionReason::EmptyOutput);
    assert_eq!(classify_text(&decision, &config), ErrorType::Missing);
}

#[tokio::test]
async fn judge_upgrades_a_failed_decision() {
    let config = EvaluationConfig::default().with_llm_judge(0.75);
    let similarity = StaticSimilarity::new(0.3);
    let extractor = RuleBasedEntityExtractor::new();
    let model = Arc::new(ScriptedChatModel::from_replies(["8"]));
    let judge = LlmJudge::new(model.clone());
    let tree = DecisionTree::new(&similarity, &extractor, &config).with_judge(&judge);

    let decision = tree
        .decide("How far is the moon?", "About 384,400 km.", "Roughly 238,900 miles.")
        .await
        .unwrap();

    assert_eq!(decision.accuracy, 1.0);
    assert_eq!(decision.reason, DecisionReason::JudgeOverride);
    assert_eq!(decision.llm_score, Some(0.8));
    assert_eq!(decision.semantic_score, Some(0.3));

    let requests = model.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages[1].content().contains("How far is the moon?"));
}

#[tokio::test]
async fn judge_never_downgrades_or_runs_on_a_pass() {
    let config = EvaluationConfig::default().with_llm_judge(0.75);
    let similarity = StaticSimilarity::new(0.9);
    let extractor = RuleBasedEntityExtractor::new();
    let model = Arc::new(ScriptedChatModel::from_replies(Vec::<String>::new()));
    let judge = LlmJudge::new(model.clone());
    let tree = DecisionTree::new(&similarity, &extractor, &config).with_judge(&judge);

    let decision = tree.decide("", "it is sunny", "the weather is sunny").await.unwrap();

    assert_eq!(decision.accuracy, 1.0);
    assert_eq!(decision.llm_score, None);
    assert!(model.requests().await.is_empty());
}

#[tokio::test]
async fn low_judge_score_keeps_the_failure() {
    let config = EvaluationConfig::default().with_llm_judge(0.75);
    let similarity = StaticSimilarity::new(0.3);
    let extractor = RuleBasedEntityExtractor::new();
    let judge = LlmJudge::new(Arc::new(ScriptedChatModel::from_replies(["3"])));
    let tree = DecisionTree::new(&similarity, &extractor, &config).with_judge(&judge);

    let decision = tree.decide("", "yes", "no").await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert_eq!(decision.reason, DecisionReason::SemanticBelowThreshold);
    assert_eq!(decision.llm_score, Some(0.3));
    assert!(explain(&decision, &config).contains("stayed below"));
}

#[tokio::test]
async fn judge_is_ignored_unless_enabled() {
    let config = EvaluationConfig::default();
    let similarity = StaticSimilarity::new(0.3);
    let extractor = RuleBasedEntityExtractor::new();
    let model = Arc::new(ScriptedChatModel::from_replies(["10"]));
    let judge = LlmJudge::new(model.clone());
    let tree = DecisionTree::new(&similarity, &extractor, &config).with_judge(&judge);

    let decision = tree.decide("", "yes", "no").await.unwrap();

    assert_eq!(decision.accuracy, 0.0);
    assert!(model.requests().await.is_empty());
}

#[tokio::test]
async fn slow_scorer_times_out() {
    let config = EvaluationConfig::default().with_scorer_timeout_ms(20);
    let extractor = RuleBasedEntityExtractor::new();
    let tree = DecisionTree::new(&SlowSimilarity, &extractor, &config);

    let err = tree.decide("", "yes", "no").await.unwrap_err();
    assert!(matches!(err, AgentScoreError::Timeout(_)));
    assert!(err.is_scorer_failure());
}
