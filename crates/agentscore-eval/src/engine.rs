use std::sync::Arc;

use agentscore_core::{
    AgentScoreError, CandidateOutput, DecisionReason, EntityExtractor, ErrorType,
    EvaluationConfig, FieldScore, GroundTruthRecord, Judge, MatchType, QueryConsistency,
    QueryFailure, QueryScoreResult, SafetyScorer, SimilarityScorer,
};
use serde_json::Value;

use crate::consistency::{cross_run_consistency, internal_consistency};
use crate::decision::{explain, AccuracyDecision, DecisionTree};
use crate::entity::RuleBasedEntityExtractor;
use crate::matcher::{parse_structured, Comparator, Comparison, MatchOutcome};
use crate::rqs::{compute_rqs, resolve_profile, RqsSignals};
use crate::safety::KeywordSafetyScorer;
use crate::structure::analyze;
use crate::text::{is_blank, render_value};
use crate::with_timeout;

/// Everything known about one output before run-level signals are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputScore {
    pub query_id: String,
    pub run_id: String,
    pub match_type: MatchType,
    pub accuracy: f64,
    pub exact_match: bool,
    pub semantic_score: Option<f64>,
    pub entity_match_score: Option<f64>,
    pub llm_score: Option<f64>,
    pub completeness: f64,
    pub hallucination: f64,
    pub safety: f64,
    /// Similarity to the record's context, when it has one.
    pub context_support: Option<f64>,
    pub error_type: ErrorType,
    pub reason: DecisionReason,
    pub explanation: String,
    pub detail: Option<String>,
    pub field_scores: Vec<FieldScore>,
}

impl OutputScore {
    /// Attach consistency and support and compute the RQS.
    pub fn finalize(
        self,
        consistency: f64,
        support: f64,
        config: &EvaluationConfig,
    ) -> QueryScoreResult {
        let signals = RqsSignals {
            accuracy: self.accuracy,
            consistency,
            support,
            completeness: self.completeness,
            hallucination: self.hallucination,
            safety: self.safety,
        };
        let rqs = compute_rqs(&signals, resolve_profile(config, self.match_type), config);
        QueryScoreResult {
            query_id: self.query_id,
            run_id: self.run_id,
            match_type: self.match_type,
            accuracy: self.accuracy,
            exact_match: self.exact_match,
            semantic_score: self.semantic_score,
            entity_match_score: self.entity_match_score,
            llm_score: self.llm_score,
            completeness: self.completeness,
            hallucination: self.hallucination,
            safety: self.safety,
            consistency,
            support,
            rqs,
            error_type: self.error_type,
            reason: self.reason,
            explanation: self.explanation,
            detail: self.detail,
            field_scores: self.field_scores,
        }
    }
}

/// All outputs of one query, scored together.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScore {
    pub query_id: String,
    pub outputs: Vec<OutputScore>,
    pub failures: Vec<QueryFailure>,
    pub consistency: Option<QueryConsistency>,
}

/// Scores candidate outputs against ground truth.
///
/// Stateless apart from its collaborators; every call takes the
/// configuration explicitly.
pub struct ScoringEngine {
    similarity: Arc<dyn SimilarityScorer>,
    entities: Arc<dyn EntityExtractor>,
    safety: Arc<dyn SafetyScorer>,
    judge: Option<Arc<dyn Judge>>,
}

impl ScoringEngine {
    pub fn new(similarity: Arc<dyn SimilarityScorer>) -> Self {
        Self {
            similarity,
            entities: Arc::new(RuleBasedEntityExtractor::new()),
            safety: Arc::new(KeywordSafetyScorer::default()),
            judge: None,
        }
    }

    pub fn with_entity_extractor(mut self, entities: Arc<dyn EntityExtractor>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_safety_scorer(mut self, safety: Arc<dyn SafetyScorer>) -> Self {
        self.safety = safety;
        self
    }

    /// Install a judge. It is only consulted when `use_llm_judge` is set.
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn decision_tree<'a>(&'a self, config: &'a EvaluationConfig) -> DecisionTree<'a> {
        let tree = DecisionTree::new(self.similarity.as_ref(), self.entities.as_ref(), config);
        match &self.judge {
            Some(judge) => tree.with_judge(judge.as_ref()),
            None => tree,
        }
    }

    /// Score a single output. External failures surface as errors.
    pub async fn score_output(
        &self,
        record: &GroundTruthRecord,
        candidate: &CandidateOutput,
        config: &EvaluationConfig,
    ) -> Result<OutputScore, AgentScoreError> {
        let comparator = Comparator::for_match_type(record.match_type, config);
        self.score_with(&comparator, record, candidate, config).await
    }

    /// Score every output of one query and their consistency.
    ///
    /// Never fails as a whole: outputs whose scoring errored are reported
    /// as `missing` failures and left out of the consistency computation.
    /// If consistency cannot be computed, every output of the query fails.
    pub async fn score_query(
        &self,
        record: &GroundTruthRecord,
        candidates: &[CandidateOutput],
        config: &EvaluationConfig,
    ) -> QueryScore {
        let comparator = Comparator::for_match_type(record.match_type, config);
        let mut outputs = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();

        for candidate in candidates {
            match self.score_with(&comparator, record, candidate, config).await {
                Ok(score) => outputs.push(score),
                Err(e) => {
                    tracing::warn!(
                        query_id = %record.query_id,
                        run_id = %candidate.run_id,
                        error = %e,
                        "output could not be scored"
                    );
                    failures.push(QueryFailure::missing(
                        &record.query_id,
                        Some(candidate.run_id.clone()),
                        e.to_string(),
                    ));
                }
            }
        }

        if outputs.is_empty() {
            return QueryScore {
                query_id: record.query_id.clone(),
                outputs,
                failures,
                consistency: None,
            };
        }

        let texts: Vec<String> = candidates
            .iter()
            .filter(|c| outputs.iter().any(|o| o.run_id == c.run_id))
            .map(|c| render_value(&c.output))
            .collect();
        let consistency = match texts.as_slice() {
            [single] => internal_consistency(self.similarity.as_ref(), single, config).await,
            _ => cross_run_consistency(self.similarity.as_ref(), &texts, config).await,
        };

        match consistency {
            Ok(score) => QueryScore {
                query_id: record.query_id.clone(),
                outputs,
                failures,
                consistency: Some(QueryConsistency {
                    query_id: record.query_id.clone(),
                    mode: score.mode,
                    score: score.score,
                    pair_count: score.pair_count,
                }),
            },
            Err(e) => {
                tracing::warn!(query_id = %record.query_id, error = %e, "consistency could not be computed");
                failures.extend(outputs.into_iter().map(|o| {
                    QueryFailure::missing(
                        &record.query_id,
                        Some(o.run_id),
                        format!("consistency could not be computed: {e}"),
                    )
                }));
                QueryScore {
                    query_id: record.query_id.clone(),
                    outputs: Vec::new(),
                    failures,
                    consistency: None,
                }
            }
        }
    }

    async fn score_with(
        &self,
        comparator: &Comparator,
        record: &GroundTruthRecord,
        candidate: &CandidateOutput,
        config: &EvaluationConfig,
    ) -> Result<OutputScore, AgentScoreError> {
        let actual_text = render_value(&candidate.output);
        let blank = is_blank(&candidate.output);
        let safety = self.safety.safety(&actual_text).clamp(0.0, 1.0);

        let context_support = match record.context.as_deref().map(str::trim) {
            Some(context) if !context.is_empty() => Some(if blank {
                0.0
            } else {
                with_timeout(config, "context support", self.similarity.similarity(&actual_text, context))
                    .await?
                    .clamp(0.0, 1.0)
            }),
            _ => None,
        };

        let mut score = OutputScore {
            query_id: record.query_id.clone(),
            run_id: candidate.run_id.clone(),
            match_type: record.match_type,
            accuracy: 0.0,
            exact_match: false,
            semantic_score: None,
            entity_match_score: None,
            llm_score: None,
            completeness: 0.0,
            hallucination: 0.0,
            safety,
            context_support,
            error_type: ErrorType::Missing,
            reason: DecisionReason::EmptyOutput,
            explanation: String::new(),
            detail: None,
            field_scores: Vec::new(),
        };

        match comparator.compare(&record.expected_output, &candidate.output) {
            Comparison::Delegate => {
                let expected_text = render_value(&record.expected_output);
                let query = record.query.as_deref().unwrap_or_default();
                let decision = self
                    .decision_tree(config)
                    .decide(query, &expected_text, &actual_text)
                    .await?;
                apply_text_decision(&mut score, &decision, blank, config);
            }
            Comparison::Decided(_) if blank && !is_blank(&record.expected_output) => {
                score.explanation = "Output is empty, so nothing could be compared with the expected answer.".into();
            }
            Comparison::Decided(outcome) if record.match_type.is_structured() => {
                apply_structured_outcome(&mut score, &outcome, record, candidate, config);
            }
            Comparison::Decided(outcome) => {
                apply_scalar_outcome(&mut score, &outcome, record.match_type);
            }
        }

        tracing::debug!(
            query_id = %score.query_id,
            run_id = %score.run_id,
            accuracy = score.accuracy,
            error_type = %score.error_type,
            "output scored"
        );
        Ok(score)
    }
}

fn apply_text_decision(
    score: &mut OutputScore,
    decision: &AccuracyDecision,
    blank: bool,
    config: &EvaluationConfig,
) {
    score.accuracy = decision.accuracy;
    score.exact_match = decision.exact_match;
    score.semantic_score = decision.semantic_score;
    score.entity_match_score = decision.entity_score;
    score.llm_score = decision.llm_score;
    score.reason = decision.reason;
    score.explanation = explain(decision, config);
    score.error_type = classify_text(decision, config);
    score.completeness = if blank { 0.0 } else { 1.0 };
    score.hallucination = if score.error_type == ErrorType::Hallucination {
        1.0
    } else {
        0.0
    };
}

/// Outcome kind of a free-text decision.
pub fn classify_text(decision: &AccuracyDecision, config: &EvaluationConfig) -> ErrorType {
    if decision.is_correct() {
        return ErrorType::Correct;
    }
    match decision.reason {
        DecisionReason::EmptyOutput => ErrorType::Missing,
        DecisionReason::EntityMismatch => ErrorType::Hallucination,
        _ => match decision.semantic_score {
            Some(semantic) if semantic < config.hallucination_threshold => {
                ErrorType::Hallucination
            }
            _ => ErrorType::PartialMatch,
        },
    }
}

fn apply_structured_outcome(
    score: &mut OutputScore,
    outcome: &MatchOutcome,
    record: &GroundTruthRecord,
    candidate: &CandidateOutput,
    config: &EvaluationConfig,
) {
    let expected = parse_structured(&record.expected_output).unwrap_or(Value::Null);
    let actual = parse_structured(&candidate.output).unwrap_or_else(|_| Value::Object(Default::default()));
    let analysis = analyze(&expected, &actual, config);

    score.accuracy = outcome.score;
    score.exact_match = outcome.is_match();
    score.completeness = analysis.completeness;
    score.hallucination = analysis.hallucination;
    score.error_type = if outcome.is_match() {
        ErrorType::Correct
    } else if analysis.hallucination > 0.0 {
        ErrorType::Hallucination
    } else {
        ErrorType::PartialMatch
    };
    score.reason = typed_reason(outcome);
    score.explanation = match analysis.summary() {
        _ if outcome.is_match() => "Output is structurally equal to the expected JSON.".to_string(),
        Some(summary) => format!(
            "Output differs from the expected JSON ({summary}); completeness {:.2}, hallucination {:.2}.",
            analysis.completeness, analysis.hallucination
        ),
        None => "Output differs from the expected JSON.".to_string(),
    };
    score.detail = outcome.detail.clone();
    score.field_scores = analysis.field_scores;
}

fn apply_scalar_outcome(score: &mut OutputScore, outcome: &MatchOutcome, match_type: MatchType) {
    score.accuracy = outcome.score;
    score.exact_match = outcome.is_match();
    score.completeness = 1.0;
    score.hallucination = 1.0 - outcome.score;
    score.error_type = if outcome.is_match() {
        ErrorType::Correct
    } else {
        ErrorType::Hallucination
    };
    score.reason = typed_reason(outcome);
    score.explanation = if outcome.is_match() {
        format!("Output matches the expected {match_type} value.")
    } else {
        format!("Output does not match the expected {match_type} value.")
    };
    score.detail = outcome.detail.clone();
}

fn typed_reason(outcome: &MatchOutcome) -> DecisionReason {
    if outcome.is_match() {
        DecisionReason::TypedMatch
    } else {
        DecisionReason::TypedMismatch
    }
}
