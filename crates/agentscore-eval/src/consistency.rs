use agentscore_core::{AgentScoreError, ConsistencyMode, EvaluationConfig, SimilarityScorer};

use crate::text::split_sentences;
use crate::with_timeout;

/// Agreement among a set of texts, normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsistencyScore {
    pub mode: ConsistencyMode,
    pub score: f64,
    pub pair_count: usize,
    /// Raw mean pairwise cosine, in `[-1, 1]`.
    pub mean_similarity: f64,
}

/// Map a mean cosine in `[-1, 1]` onto `[0, 1]`.
pub fn normalize_similarity(mean: f64) -> f64 {
    ((mean + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Mean similarity over all unordered pairs of `texts`.
///
/// Fewer than two texts have nothing to disagree with and score 1.0.
/// Identical pairs count as 1.0 without calling the scorer.
pub async fn pairwise_consistency(
    scorer: &dyn SimilarityScorer,
    texts: &[String],
    mode: ConsistencyMode,
    config: &EvaluationConfig,
) -> Result<ConsistencyScore, AgentScoreError> {
    if texts.len() < 2 {
        return Ok(ConsistencyScore {
            mode,
            score: 1.0,
            pair_count: 0,
            mean_similarity: 1.0,
        });
    }

    let mut total = 0.0;
    let mut pair_count = 0;
    for (i, a) in texts.iter().enumerate() {
        for b in &texts[i + 1..] {
            let similarity = if a == b {
                1.0
            } else {
                with_timeout(config, "consistency similarity", scorer.similarity(a, b))
                    .await?
                    .clamp(-1.0, 1.0)
            };
            total += similarity;
            pair_count += 1;
        }
    }

    let mean_similarity = total / pair_count as f64;
    Ok(ConsistencyScore {
        mode,
        score: normalize_similarity(mean_similarity),
        pair_count,
        mean_similarity,
    })
}

/// Agreement between the outputs of different runs for one query.
pub async fn cross_run_consistency(
    scorer: &dyn SimilarityScorer,
    outputs: &[String],
    config: &EvaluationConfig,
) -> Result<ConsistencyScore, AgentScoreError> {
    pairwise_consistency(scorer, outputs, ConsistencyMode::CrossRun, config).await
}

/// Agreement between the sentences of a single output.
pub async fn internal_consistency(
    scorer: &dyn SimilarityScorer,
    output: &str,
    config: &EvaluationConfig,
) -> Result<ConsistencyScore, AgentScoreError> {
    let sentences = split_sentences(output);
    pairwise_consistency(scorer, &sentences, ConsistencyMode::Internal, config).await
}
