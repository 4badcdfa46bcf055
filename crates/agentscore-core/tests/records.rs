use std::collections::BTreeMap;

use agentscore_core::{
    ErrorType, GroundTruthRecord, MatchType, Message, ProgressEvent, ProgressStatus,
};
use serde_json::json;

#[test]
fn match_type_parses_case_insensitively() {
    assert_eq!("JSON".parse::<MatchType>().unwrap(), MatchType::Json);
    assert_eq!(" date ".parse::<MatchType>().unwrap(), MatchType::Date);
    assert!("fuzzy".parse::<MatchType>().is_err());
}

#[test]
fn match_type_classification() {
    assert!(MatchType::Text.is_text());
    assert!(MatchType::Paragraph.is_text());
    assert!(!MatchType::Number.is_text());
    assert!(MatchType::Json.is_structured());
}

#[test]
fn ground_truth_defaults_to_text() {
    let record: GroundTruthRecord =
        serde_json::from_value(json!({"query_id": "q1", "expected_output": "Paris"})).unwrap();
    assert_eq!(record.match_type, MatchType::Text);
    assert!(record.query.is_none());
    assert!(record.context.is_none());
}

#[test]
fn error_type_serializes_as_map_key() {
    let mut summary = BTreeMap::new();
    summary.insert(ErrorType::PartialMatch, 2usize);
    summary.insert(ErrorType::Correct, 5usize);
    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value, json!({"correct": 5, "partial_match": 2}));
    let back: BTreeMap<ErrorType, usize> = serde_json::from_value(value).unwrap();
    assert_eq!(back, summary);
}

#[test]
fn message_roles() {
    let msg = Message::human("hi");
    assert_eq!(msg.role(), "human");
    assert_eq!(msg.content(), "hi");
    let value = serde_json::to_value(Message::ai("ok")).unwrap();
    assert_eq!(value["role"], "assistant");
}

#[test]
fn progress_event_shape() {
    let event = ProgressEvent::new("evaluator", ProgressStatus::InProgress, "scored q1")
        .with_details(json!({"query_id": "q1"}));
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["agent_name"], "evaluator");
    assert_eq!(value["status"], "in_progress");
    assert_eq!(value["details"]["query_id"], "q1");
    assert!(value.get("timestamp").is_some());
}
