use std::collections::BTreeMap;

use agentscore_core::{EvaluationConfig, EvaluationResult, QueryFailure, RunSummary};
use chrono::Utc;
use uuid::Uuid;

use crate::engine::QueryScore;
use crate::rqs::aggregate;

/// Merge per-query scores into an [`EvaluationResult`].
///
/// A run's correctness ratio is its exact matches over all of its queries,
/// failed ones included. Support falls back to that ratio for outputs
/// without context. Results and failures are sorted by `(query_id, run_id)`
/// so the output does not depend on completion order.
pub fn build_evaluation_result(
    scores: Vec<QueryScore>,
    mut failures: Vec<QueryFailure>,
    skipped_queries: Vec<String>,
    cancelled: bool,
    config: &EvaluationConfig,
) -> EvaluationResult {
    failures.extend(scores.iter().flat_map(|s| s.failures.iter().cloned()));

    // Outputs that could not be scored still count as queries of their run.
    let mut per_run: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for output in scores.iter().flat_map(|s| &s.outputs) {
        let entry = per_run.entry(output.run_id.clone()).or_default();
        entry.0 += usize::from(output.exact_match);
        entry.1 += 1;
    }
    for run_id in failures.iter().filter_map(|f| f.run_id.as_ref()) {
        per_run.entry(run_id.clone()).or_default().1 += 1;
    }
    let ratios: BTreeMap<String, f64> = per_run
        .into_iter()
        .map(|(run_id, (perfect, total))| (run_id, perfect as f64 / total as f64))
        .collect();

    let mut results = Vec::new();
    let mut consistency = Vec::new();
    for score in scores {
        let query_consistency = score.consistency.as_ref().map_or(1.0, |c| c.score);
        if let Some(c) = score.consistency {
            consistency.push(c);
        }
        for output in score.outputs {
            let support = output
                .context_support
                .or_else(|| ratios.get(&output.run_id).copied())
                .unwrap_or_default();
            results.push(output.finalize(query_consistency, support, config));
        }
    }

    results.sort_by(|a, b| (&a.query_id, &a.run_id).cmp(&(&b.query_id, &b.run_id)));
    failures.sort_by(|a, b| (&a.query_id, &a.run_id).cmp(&(&b.query_id, &b.run_id)));
    consistency.sort_by(|a, b| a.query_id.cmp(&b.query_id));

    let runs = ratios
        .iter()
        .map(|(run_id, ratio)| RunSummary {
            run_id: run_id.clone(),
            correctness_ratio: *ratio,
            aggregate: aggregate(results.iter().filter(|r| &r.run_id == run_id), config),
        })
        .collect();

    let mut error_summary = BTreeMap::new();
    for error_type in results
        .iter()
        .map(|r| r.error_type)
        .chain(failures.iter().map(|f| f.error_type))
    {
        *error_summary.entry(error_type).or_insert(0) += 1;
    }

    EvaluationResult {
        evaluation_id: Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        aggregate: aggregate(&results, config),
        results,
        failures,
        consistency,
        runs,
        error_summary,
        cancelled,
        skipped_queries,
        config: config.clone(),
    }
}

