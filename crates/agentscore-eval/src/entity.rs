use std::collections::BTreeSet;
use std::sync::LazyLock;

use agentscore_core::EntityExtractor;
use regex::Regex;

use crate::text::split_sentences;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$€£]?[\p{L}\p{N}][\p{L}\p{N}%'’&.,\-]*").expect("valid token regex"));

const LEADING_STOPWORDS: &[&str] = &[
    "a", "an", "and", "at", "but", "for", "he", "her", "his", "i", "if", "in", "it", "its", "of",
    "on", "or", "our", "she", "that", "the", "their", "these", "they", "this", "those", "we",
    "when", "while", "you", "your",
];

/// Heuristic extractor: capitalized word runs (names, places, organisations),
/// numbers, amounts, percentages and tokens like `Q4`.
///
/// A single capitalized word at the start of a sentence is ignored, as are
/// leading determiners of a run (`The Eiffel Tower` yields `eiffel tower`).
#[derive(Debug, Clone)]
pub struct RuleBasedEntityExtractor {
    stopwords: BTreeSet<String>,
}

impl RuleBasedEntityExtractor {
    pub fn new() -> Self {
        Self {
            stopwords: LEADING_STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_stopwords(mut self, words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stopwords
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }

    fn extract_sentence(&self, sentence: &str, entities: &mut BTreeSet<String>) {
        let mut run: Vec<&str> = Vec::new();
        let mut run_start = 0;

        let tokens = TOKEN_RE
            .find_iter(sentence)
            .map(|m| {
                let raw = m.as_str();
                (raw.trim_end_matches(['.', ',', '\'', '’', '-', '&']), raw.ends_with(','))
            })
            .filter(|(t, _)| !t.is_empty());

        for (index, (token, ends_clause)) in tokens.enumerate() {
            if is_numeric(token) {
                flush_run(&mut run, run_start, entities);
                entities.insert(token.to_lowercase());
            } else if starts_uppercase(token) {
                if run.is_empty() {
                    if self.stopwords.contains(&token.to_lowercase()) {
                        continue;
                    }
                    run_start = index;
                }
                run.push(token);
                if ends_clause {
                    flush_run(&mut run, run_start, entities);
                }
            } else {
                flush_run(&mut run, run_start, entities);
            }
        }
        flush_run(&mut run, run_start, entities);
    }
}

impl Default for RuleBasedEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor for RuleBasedEntityExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String> {
        let mut entities = BTreeSet::new();
        for sentence in split_sentences(text) {
            self.extract_sentence(&sentence, &mut entities);
        }
        entities
    }
}

fn flush_run(run: &mut Vec<&str>, run_start: usize, entities: &mut BTreeSet<String>) {
    if run.is_empty() {
        return;
    }
    let sentence_initial_word =
        run_start == 0 && run.len() == 1 && !run[0].chars().any(|c| c.is_ascii_digit());
    if !sentence_initial_word {
        entities.insert(run.join(" ").to_lowercase());
    }
    run.clear();
}

fn is_numeric(token: &str) -> bool {
    let digits = token.trim_start_matches(['$', '€', '£']);
    digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

/// Jaccard overlap of the entity sets of `a` and `b`.
///
/// Two texts with no entities at all agree vacuously (1.0).
pub fn entity_match(extractor: &dyn EntityExtractor, a: &str, b: &str) -> f64 {
    let entities_a = extractor.extract(a);
    let entities_b = extractor.extract(b);
    if entities_a.is_empty() && entities_b.is_empty() {
        return 1.0;
    }
    let shared = entities_a.intersection(&entities_b).count();
    let union = entities_a.union(&entities_b).count();
    shared as f64 / union as f64
}
