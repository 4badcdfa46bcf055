use agentscore_core::{AgentScoreError, EvaluationConfig, RqsProfile, MAX_WORKERS};

#[test]
fn default_config_matches_documented_values() {
    let config = EvaluationConfig::default();
    assert_eq!(config.semantic_threshold, 0.72);
    assert_eq!(config.entity_threshold, 0.5);
    assert_eq!(config.llm_threshold, 0.75);
    assert!(!config.use_llm_judge);
    assert_eq!((config.alpha, config.beta, config.gamma), (0.6, 0.2, 0.2));
    assert_eq!(config.fuzzy_threshold, 0.85);
    assert_eq!(config.w_accuracy, 0.45);
    assert_eq!(config.w_completeness, 0.25);
    assert_eq!(config.w_hallucination, 0.15);
    assert_eq!(config.w_safety, 0.15);
    assert_eq!(config.numeric_tolerance, 1e-6);
    assert_eq!(config.rqs_profile, RqsProfile::Auto);
    assert_eq!(config.workers, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_json_fills_defaults() {
    let config: EvaluationConfig =
        serde_json::from_str(r#"{"semantic_threshold": 0.8, "rqs_profile": "structured"}"#)
            .unwrap();
    assert_eq!(config.semantic_threshold, 0.8);
    assert_eq!(config.rqs_profile, RqsProfile::Structured);
    assert_eq!(config.entity_threshold, 0.5);
    assert_eq!(config.workers, 5);
}

#[test]
fn config_builder_pattern() {
    let config = EvaluationConfig::default()
        .with_llm_judge(0.9)
        .with_numeric_tolerance(0.01)
        .with_workers(2);
    assert!(config.use_llm_judge);
    assert_eq!(config.llm_threshold, 0.9);
    assert_eq!(config.numeric_tolerance, 0.01);
    assert_eq!(config.workers, 2);
}

#[test]
fn unnormalized_weights_are_accepted() {
    let config = EvaluationConfig::default().with_standard_weights(1.0, 1.0, 1.0);
    assert!(config.validate().is_ok());
}

#[test]
fn negative_weight_is_rejected() {
    let config = EvaluationConfig::default().with_standard_weights(-0.1, 0.5, 0.5);
    let err = config.validate().unwrap_err();
    assert!(matches!(err, AgentScoreError::Config(_)));
    assert!(err.to_string().contains("alpha"));
}

#[test]
fn out_of_range_threshold_is_rejected() {
    let config = EvaluationConfig::default().with_semantic_threshold(1.5);
    assert!(config.validate().is_err());
}

#[test]
fn zero_workers_is_rejected() {
    let config = EvaluationConfig::default().with_workers(0);
    assert!(config.validate().is_err());
}

#[test]
fn worker_count_is_capped() {
    assert!(EvaluationConfig::default()
        .with_workers(MAX_WORKERS)
        .validate()
        .is_ok());

    let config: EvaluationConfig =
        serde_json::from_str(r#"{"workers": 18446744073709551615}"#).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, AgentScoreError::Config(ref msg) if msg.contains("workers")));
}
