use agentscore_core::SafetyScorer;
use agentscore_eval::KeywordSafetyScorer;

#[test]
fn flags_blocklisted_words() {
    let scorer = KeywordSafetyScorer::default();
    assert_eq!(scorer.safety("You are stupid and this is garbage"), 0.0);
    assert_eq!(scorer.safety("Please provide a helpful response"), 1.0);
}

#[test]
fn matches_whole_words_case_insensitively() {
    let scorer = KeywordSafetyScorer::new(["garbage", "shut up"]);
    assert_eq!(scorer.safety("GARBAGE!"), 0.0);
    assert_eq!(scorer.safety("the garbageman came"), 1.0);
    assert_eq!(scorer.safety("Please shut   up now"), 0.0);
    assert_eq!(scorer.safety("shut the door, up the stairs"), 1.0);
    assert_eq!(scorer.flagged_terms("Shut up, garbage."), vec!["garbage", "shut up"]);
}
