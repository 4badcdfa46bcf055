use agentscore_core::{
    AggregateResult, EvaluationConfig, MatchType, MetricVerdicts, QueryScoreResult, RqsProfile,
};

/// Per-output signals the Response Quality Score combines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RqsSignals {
    pub accuracy: f64,
    pub consistency: f64,
    pub support: f64,
    pub completeness: f64,
    pub hallucination: f64,
    pub safety: f64,
}

/// The concrete profile for a record: `Auto` picks `Structured` for json.
pub fn resolve_profile(config: &EvaluationConfig, match_type: MatchType) -> RqsProfile {
    match config.rqs_profile {
        RqsProfile::Auto if match_type.is_structured() => RqsProfile::Structured,
        RqsProfile::Auto => RqsProfile::Standard,
        profile => profile,
    }
}

/// Weighted sum of the signals under `profile`. Weights are used as given,
/// so the result is only bounded by `[0, 1]` when they sum to 1.
pub fn compute_rqs(signals: &RqsSignals, profile: RqsProfile, config: &EvaluationConfig) -> f64 {
    match profile {
        RqsProfile::Structured => {
            config.w_accuracy * signals.accuracy
                + config.w_completeness * signals.completeness
                + config.w_hallucination * (1.0 - signals.hallucination)
                + config.w_safety * signals.safety
        }
        RqsProfile::Standard | RqsProfile::Auto => {
            config.alpha * signals.accuracy
                + config.beta * signals.consistency
                + config.gamma * signals.support
        }
    }
}

/// Share of `results` that were perfect matches. 0.0 for no results.
///
/// Only scored results are seen here; batch reports also count a run's
/// failed outputs in the denominator.
pub fn correctness_ratio<'a>(results: impl IntoIterator<Item = &'a QueryScoreResult>) -> f64 {
    let (perfect, total) = results
        .into_iter()
        .fold((0usize, 0usize), |(perfect, total), r| {
            (perfect + usize::from(r.exact_match), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        perfect as f64 / total as f64
    }
}

/// Unweighted means over `results`, with threshold verdicts. Every mean is
/// 0.0 when there are no results.
pub fn aggregate<'a>(
    results: impl IntoIterator<Item = &'a QueryScoreResult>,
    config: &EvaluationConfig,
) -> AggregateResult {
    let mut sum = AggregateResult::default();
    for r in results {
        sum.query_count += 1;
        sum.accuracy += r.accuracy;
        sum.completeness += r.completeness;
        sum.hallucination += r.hallucination;
        sum.consistency += r.consistency;
        sum.safety += r.safety;
        sum.support += r.support;
        sum.rqs += r.rqs;
    }
    if sum.query_count == 0 {
        return sum;
    }

    let n = sum.query_count as f64;
    let mut mean = AggregateResult {
        query_count: sum.query_count,
        accuracy: sum.accuracy / n,
        completeness: sum.completeness / n,
        hallucination: sum.hallucination / n,
        consistency: sum.consistency / n,
        safety: sum.safety / n,
        support: sum.support / n,
        rqs: sum.rqs / n,
        passed: MetricVerdicts::default(),
    };
    mean.passed = MetricVerdicts {
        accuracy: mean.accuracy >= config.accuracy_threshold,
        consistency: mean.consistency >= config.consistency_threshold,
        hallucination: mean.hallucination <= config.hallucination_threshold,
        rqs: mean.rqs >= config.rqs_threshold,
    };
    mean
}
