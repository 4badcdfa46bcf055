use agentscore_core::{
    AgentScoreError, DecisionReason, EntityExtractor, EvaluationConfig, Judge, SimilarityScorer,
};

use crate::entity::entity_match;
use crate::with_timeout;

/// Outcome of the accuracy decision tree for one free-text output.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyDecision {
    pub accuracy: f64,
    /// Byte-equal to the expected text.
    pub exact_match: bool,
    /// Cosine similarity clamped to `[0, 1]`, when computed.
    pub semantic_score: Option<f64>,
    pub entity_score: Option<f64>,
    pub llm_score: Option<f64>,
    pub reason: DecisionReason,
}

impl AccuracyDecision {
    fn settled(accuracy: f64, reason: DecisionReason) -> Self {
        Self {
            accuracy,
            exact_match: reason == DecisionReason::ExactMatch,
            semantic_score: None,
            entity_score: None,
            llm_score: None,
            reason,
        }
    }

    pub fn is_correct(&self) -> bool {
        self.accuracy >= 1.0
    }
}

/// Ordered, short-circuiting accuracy decision for free text:
///
/// 1. byte-equal texts are correct;
/// 2. semantic similarity at or below `semantic_threshold` is wrong, and the
///    entity check is never reached;
/// 3. entity overlap below `entity_threshold` is wrong (a factual error
///    hiding behind similar phrasing), otherwise correct;
/// 4. when the judge is enabled, a wrong answer is upgraded if the judge
///    scores it at or above `llm_threshold`. The judge never downgrades.
///
/// Empty output against a non-empty expectation is wrong without any
/// external call.
pub struct DecisionTree<'a> {
    similarity: &'a dyn SimilarityScorer,
    entities: &'a dyn EntityExtractor,
    judge: Option<&'a dyn Judge>,
    config: &'a EvaluationConfig,
}

impl<'a> DecisionTree<'a> {
    pub fn new(
        similarity: &'a dyn SimilarityScorer,
        entities: &'a dyn EntityExtractor,
        config: &'a EvaluationConfig,
    ) -> Self {
        Self {
            similarity,
            entities,
            judge: None,
            config,
        }
    }

    pub fn with_judge(mut self, judge: &'a dyn Judge) -> Self {
        self.judge = Some(judge);
        self
    }

    pub async fn decide(
        &self,
        query: &str,
        expected: &str,
        actual: &str,
    ) -> Result<AccuracyDecision, AgentScoreError> {
        if actual.trim().is_empty() && !expected.trim().is_empty() {
            return Ok(AccuracyDecision::settled(0.0, DecisionReason::EmptyOutput));
        }
        if actual == expected {
            return Ok(AccuracyDecision::settled(1.0, DecisionReason::ExactMatch));
        }

        let raw = with_timeout(
            self.config,
            "semantic similarity",
            self.similarity.similarity(actual, expected),
        )
        .await?;
        let semantic = raw.clamp(0.0, 1.0);

        let mut decision = if semantic <= self.config.semantic_threshold {
            AccuracyDecision {
                semantic_score: Some(semantic),
                ..AccuracyDecision::settled(0.0, DecisionReason::SemanticBelowThreshold)
            }
        } else {
            let entity = entity_match(self.entities, actual, expected);
            let (accuracy, reason) = if entity < self.config.entity_threshold {
                (0.0, DecisionReason::EntityMismatch)
            } else {
                (1.0, DecisionReason::SemanticAndEntityPass)
            };
            AccuracyDecision {
                semantic_score: Some(semantic),
                entity_score: Some(entity),
                ..AccuracyDecision::settled(accuracy, reason)
            }
        };

        if !decision.is_correct() && self.config.use_llm_judge {
            if let Some(judge) = self.judge {
                let score = with_timeout(
                    self.config,
                    "llm judge",
                    judge.judge(query, expected, actual),
                )
                .await?
                .clamp(0.0, 1.0);
                decision.llm_score = Some(score);
                if score >= self.config.llm_threshold {
                    decision.accuracy = 1.0;
                    decision.reason = DecisionReason::JudgeOverride;
                }
            }
        }

        tracing::debug!(
            semantic = ?decision.semantic_score,
            entity = ?decision.entity_score,
            llm = ?decision.llm_score,
            reason = ?decision.reason,
            accuracy = decision.accuracy,
            "accuracy decision"
        );
        Ok(decision)
    }
}

/// Human-readable account of why a free-text decision came out as it did.
pub fn explain(decision: &AccuracyDecision, config: &EvaluationConfig) -> String {
    let semantic = decision.semantic_score.unwrap_or_default();
    let entity = decision.entity_score.unwrap_or_default();
    let mut text = match decision.reason {
        DecisionReason::EmptyOutput => {
            "Output is empty, so nothing could be compared with the expected answer.".to_string()
        }
        DecisionReason::ExactMatch => "Output exactly matches the expected answer.".to_string(),
        DecisionReason::SemanticBelowThreshold => format!(
            "Semantic similarity {semantic:.3} is at or below the {:.2} threshold; the entity check was skipped.",
            config.semantic_threshold
        ),
        DecisionReason::EntityMismatch => format!(
            "Semantic similarity {semantic:.3} passed, but entity overlap {entity:.3} is below {:.2}: the answer names different facts.",
            config.entity_threshold
        ),
        DecisionReason::SemanticAndEntityPass => format!(
            "Semantic similarity {semantic:.3} is above {:.2} and entity overlap {entity:.3} meets {:.2}.",
            config.semantic_threshold, config.entity_threshold
        ),
        DecisionReason::JudgeOverride => format!(
            "LLM judge score {:.2} reached {:.2} and overrode the rule-based decision.",
            decision.llm_score.unwrap_or_default(),
            config.llm_threshold
        ),
        DecisionReason::TypedMatch | DecisionReason::TypedMismatch => String::new(),
    };
    if let (Some(score), false) = (
        decision.llm_score,
        decision.reason == DecisionReason::JudgeOverride,
    ) {
        text.push_str(&format!(
            " LLM judge score {score:.2} stayed below {:.2}.",
            config.llm_threshold
        ));
    }
    text
}
