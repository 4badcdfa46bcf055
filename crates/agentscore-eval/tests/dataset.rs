use std::path::Path;

use agentscore_core::{AgentScoreError, CandidateOutput, GroundTruthRecord, MatchType};
use agentscore_eval::{
    convert_records, load_records, parse_candidate_outputs, parse_ground_truth, resolve_within,
    validate_batch, ConvertMode, EvaluationRequest, KeyMapping,
};
use serde_json::json;

#[test]
fn parses_ground_truth_with_defaults() {
    let records = vec![
        json!({"query_id": "q1", "expected_output": "Paris", "query": "Capital of France?"}),
        json!({"query_id": 7, "expected_output": 42, "match_type": "NUMBER", "context": ["a", "b"]}),
    ];
    let parsed = parse_ground_truth(&records, &KeyMapping::default()).unwrap();

    assert_eq!(parsed[0].match_type, MatchType::Text);
    assert_eq!(parsed[0].query.as_deref(), Some("Capital of France?"));
    assert_eq!(parsed[1].query_id, "7");
    assert_eq!(parsed[1].match_type, MatchType::Number);
    assert_eq!(parsed[1].context.as_deref(), Some("a\n\nb"));
}

#[test]
fn malformed_ground_truth_names_the_record() {
    let mapping = KeyMapping::default();

    let err = parse_ground_truth(
        &[json!({"query_id": "q1", "expected_output": 1}), json!({"query_id": "q2"})],
        &mapping,
    )
    .unwrap_err();
    assert!(matches!(err, AgentScoreError::Validation(_)));
    assert!(err.to_string().contains("record 1"));
    assert!(err.to_string().contains("expected_output"));

    let err = parse_ground_truth(
        &[json!({"query_id": "q1", "expected_output": 1, "match_type": "fuzzy"})],
        &mapping,
    )
    .unwrap_err();
    assert!(err.to_string().contains("fuzzy"));

    let err = parse_ground_truth(&[json!("just a string")], &mapping).unwrap_err();
    assert!(err.to_string().contains("not a JSON object"));
}

#[test]
fn output_arrays_expand_into_runs() {
    let records = vec![
        json!({"query_id": "q1", "outputs": ["a", "b", "c"]}),
        json!({"query_id": "q2", "output": "x"}),
        json!({"query_id": "q3", "output": "y", "run_id": "nightly"}),
    ];
    let parsed = parse_candidate_outputs(&records, &KeyMapping::default()).unwrap();

    let runs: Vec<(&str, &str)> = parsed
        .iter()
        .map(|o| (o.query_id.as_str(), o.run_id.as_str()))
        .collect();
    assert_eq!(
        runs,
        vec![
            ("q1", "run_1"),
            ("q1", "run_2"),
            ("q1", "run_3"),
            ("q2", "run_1"),
            ("q3", "nightly"),
        ]
    );
}

#[test]
fn custom_key_mapping() {
    let mapping = KeyMapping {
        query_id_key: "id".into(),
        output_key: "response".into(),
        run_id_key: "attempt".into(),
        ..KeyMapping::default()
    };
    let parsed =
        parse_candidate_outputs(&[json!({"id": "q1", "response": "hi", "attempt": 2})], &mapping)
            .unwrap();
    assert_eq!(parsed, vec![CandidateOutput::new("q1", "2", "hi")]);
}

#[test]
fn converts_records_to_canonical_shape() {
    let mapping = KeyMapping {
        query_id_key: "id".into(),
        expected_output_key: "gold".into(),
        ..KeyMapping::default()
    };
    let converted = convert_records(
        &[json!({"id": "q1", "gold": "Paris", "extra": true})],
        ConvertMode::GroundTruth,
        &mapping,
    )
    .unwrap();
    assert_eq!(
        converted,
        vec![json!({"query_id": "q1", "expected_output": "Paris", "match_type": "text"})]
    );

    let converted = convert_records(
        &[json!({"query_id": "q1", "outputs": ["a"]})],
        ConvertMode::AiOutput,
        &KeyMapping::default(),
    )
    .unwrap();
    assert_eq!(
        converted,
        vec![json!({"query_id": "q1", "run_id": "run_1", "output": "a"})]
    );
}

#[test]
fn convert_mode_uses_short_names() {
    assert_eq!(serde_json::from_value::<ConvertMode>(json!("gt")).unwrap(), ConvertMode::GroundTruth);
    assert_eq!(serde_json::from_value::<ConvertMode>(json!("ai")).unwrap(), ConvertMode::AiOutput);
}

#[test]
fn batch_validation() {
    let gt = vec![GroundTruthRecord::new("q1", "a", MatchType::Text)];
    assert!(validate_batch(&gt, &[CandidateOutput::new("q1", "run_1", "a")]).is_ok());

    let duplicate_runs = vec![
        CandidateOutput::new("q1", "run_1", "a"),
        CandidateOutput::new("q1", "run_1", "b"),
    ];
    let err = validate_batch(&gt, &duplicate_runs).unwrap_err();
    assert!(err.to_string().contains("duplicate output"));
}

#[test]
fn request_flattens_mapping_and_config() {
    let request: EvaluationRequest = serde_json::from_value(json!({
        "ground_truth": [],
        "ai_outputs": [],
        "semantic_threshold": 0.8,
        "use_llm_judge": true,
        "output_key": "answer"
    }))
    .unwrap();

    assert_eq!(request.config.semantic_threshold, 0.8);
    assert!(request.config.use_llm_judge);
    assert_eq!(request.config.entity_threshold, 0.5);
    assert_eq!(request.mapping.output_key, "answer");
    assert_eq!(request.mapping.query_id_key, "query_id");
}

#[test]
fn paths_must_stay_inside_base_directory() {
    let base = Path::new("/data");
    assert_eq!(
        resolve_within(base, "runs/gt.json").unwrap(),
        Path::new("/data/runs/gt.json")
    );
    for bad in ["../secrets.json", "runs/../../etc/passwd", "/etc/passwd", ""] {
        let err = resolve_within(base, bad).unwrap_err();
        assert!(matches!(err, AgentScoreError::Validation(_)), "{bad}");
    }
}

#[tokio::test]
async fn loads_record_arrays_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("ok.json"), r#"[{"query_id": "q1"}]"#)
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("object.json"), r#"{"query_id": "q1"}"#)
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("broken.json"), "[{")
        .await
        .unwrap();

    assert_eq!(load_records(dir.path(), "ok.json").await.unwrap().len(), 1);
    assert!(matches!(
        load_records(dir.path(), "object.json").await.unwrap_err(),
        AgentScoreError::Validation(_)
    ));
    assert!(matches!(
        load_records(dir.path(), "broken.json").await.unwrap_err(),
        AgentScoreError::Parsing(_)
    ));
    assert!(matches!(
        load_records(dir.path(), "absent.json").await.unwrap_err(),
        AgentScoreError::Io(_)
    ));
}
