use std::sync::Arc;
use std::time::Duration;

use agentscore::callbacks::{RecordingHandler, TracingHandler};
use agentscore::core::{
    AgentScoreError, CandidateOutput, EvaluationConfig, GroundTruthRecord, HistoryStore,
    MatchType, ProgressStatus,
};
use agentscore::embeddings::{CacheBackedEmbeddings, FakeEmbeddings};
use agentscore::eval::{
    convert_records, BatchEvaluator, CancellationFlag, ConvertMode, EmbeddingSimilarity,
    EvaluationRequest, InMemoryHistoryStore, KeyMapping, LlmJudge, ScoringEngine,
};
use agentscore::models::{RetryChatModel, RetryPolicy, ScriptedChatModel};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), AgentScoreError> {
    tracing_subscriber::fmt::init();

    let embeddings = Arc::new(CacheBackedEmbeddings::new(Arc::new(FakeEmbeddings::new(64))));
    let similarity = Arc::new(EmbeddingSimilarity::new(embeddings));
    // Swap the scripted model for `OpenAiChatModel` over `HttpBackend` to use a real judge.
    let judge_model = Arc::new(ScriptedChatModel::from_replies(["2", "3", "2", "3"]));
    let judge = Arc::new(LlmJudge::new(Arc::new(RetryChatModel::new(
        judge_model,
        RetryPolicy::new(3, Duration::from_millis(200)),
    ))));
    let engine = Arc::new(ScoringEngine::new(similarity).with_judge(judge));

    let recorder = Arc::new(RecordingHandler::new());
    let history = Arc::new(InMemoryHistoryStore::new());
    let evaluator = BatchEvaluator::new(engine)
        .with_handler(Arc::new(TracingHandler::new()))
        .with_handler(recorder.clone())
        .with_history(history.clone())
        .with_agent_name("demo");

    // --- Typed and free-text records across two runs ---
    println!("=== Batch Evaluation ===");
    let ground_truth = vec![
        GroundTruthRecord::new("capital", "The Eiffel Tower is in Paris, France.", MatchType::Text)
            .with_query("Where is the Eiffel Tower?"),
        GroundTruthRecord::new("pi", json!(3.14159), MatchType::Number),
        GroundTruthRecord::new("launch", "1969-07-20", MatchType::Date),
        GroundTruthRecord::new(
            "profile",
            json!({"name": "Ada Lovelace", "born": 1815, "fields": ["mathematics"]}),
            MatchType::Json,
        ),
    ];
    let outputs = vec![
        CandidateOutput::new("capital", "run_1", "The Eiffel Tower is in Paris, France."),
        CandidateOutput::new("capital", "run_2", "The Eiffel Tower is in Berlin, Germany."),
        CandidateOutput::new("pi", "run_1", json!("3.14")),
        CandidateOutput::new("pi", "run_2", json!(3.14159)),
        CandidateOutput::new("launch", "run_1", "July 20, 1969"),
        CandidateOutput::new("launch", "run_2", "20 July 1969"),
        CandidateOutput::new(
            "profile",
            "run_1",
            json!({"name": "Ada Lovelace", "born": 1815, "fields": ["mathematics"]}),
        ),
        CandidateOutput::new(
            "profile",
            "run_2",
            json!({"name": "Ada Lovelace", "born": 1816, "spouse": "William King"}),
        ),
    ];

    let config = EvaluationConfig::default()
        .with_numeric_tolerance(0.01)
        .with_llm_judge(0.75);
    let result = evaluator
        .evaluate(&ground_truth, &outputs, &config, &CancellationFlag::new())
        .await?;

    for r in &result.results {
        println!(
            "  [{:<13}] {:<8} {:<5} accuracy={:.0} rqs={:.3} :: {}",
            r.error_type.as_str(), r.query_id, r.run_id, r.accuracy, r.rqs, r.explanation
        );
    }
    for run in &result.runs {
        println!(
            "  {}: correctness={:.2} accuracy={:.2} rqs={:.3}",
            run.run_id, run.correctness_ratio, run.aggregate.accuracy, run.aggregate.rqs
        );
    }
    println!(
        "Global: accuracy={:.2} consistency={:.2} hallucination={:.2} rqs={:.3}",
        result.aggregate.accuracy,
        result.aggregate.consistency,
        result.aggregate.hallucination,
        result.aggregate.rqs
    );
    println!("Outcomes: {:?}", result.error_summary);
    println!(
        "Progress events: {} in progress, {} failed",
        recorder.count(ProgressStatus::InProgress).await,
        recorder.count(ProgressStatus::Failed).await
    );

    // --- JSON request with renamed keys ---
    println!("\n=== JSON Request ===");
    let mapping = KeyMapping {
        query_id_key: "id".into(),
        expected_output_key: "answer".into(),
        ..KeyMapping::default()
    };
    let raw_ground_truth = vec![json!({"id": "email", "answer": "ada@example.com", "match_type": "email"})];
    let converted = convert_records(&raw_ground_truth, ConvertMode::GroundTruth, &mapping)?;
    println!("Converted: {}", json!(converted));

    let request = EvaluationRequest::new(
        raw_ground_truth,
        vec![json!({"id": "email", "outputs": ["mailto:Ada@Example.com", "ada@example.org"]})],
    )
    .with_mapping(mapping);
    let result = evaluator
        .evaluate_request(&request, &CancellationFlag::new())
        .await?;
    for r in &result.results {
        println!("  {} {}: {}", r.query_id, r.run_id, r.error_type);
    }

    // --- History ---
    println!("\n=== History ===");
    for summary in history.list().await? {
        println!(
            "  {} at {}: {} results, rqs={:.3}",
            summary.evaluation_id,
            summary.created_at.to_rfc3339(),
            summary.result_count,
            summary.aggregate.rqs
        );
    }

    println!("\nEvaluation demo completed successfully!");
    Ok(())
}
