use std::collections::BTreeMap;

use agentscore_core::{EvaluationConfig, FieldScore, MatchStrategy};
use serde_json::{Map, Value};

use crate::matcher::parse_number;
use crate::text::fuzzy_ratio;

/// Array indices above this are treated as plain keys when unflattening.
const MAX_ARRAY_INDEX: usize = 65_536;

/// Flatten a JSON value into `path -> leaf`.
///
/// Object keys are joined with `.`, array elements get a 1-based `#i` suffix
/// (`tags#1.name`). A backslash, `.` or `#` inside a key is escaped with a
/// backslash, so `{"a.b": 1}` flattens to `a\.b`. Scalars, empty containers
/// and anything nested deeper than `max_depth` are leaves. A scalar root is
/// stored under the empty path.
pub fn flatten(value: &Value, max_depth: usize) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    flatten_into(value, String::new(), 0, max_depth, &mut flat);
    flat
}

fn flatten_into(
    value: &Value,
    path: String,
    depth: usize,
    max_depth: usize,
    flat: &mut BTreeMap<String, Value>,
) {
    match value {
        Value::Object(map) if !map.is_empty() && depth < max_depth => {
            for (key, child) in map {
                let key = escape_key(key);
                let child_path = if path.is_empty() {
                    key
                } else {
                    format!("{path}.{key}")
                };
                flatten_into(child, child_path, depth + 1, max_depth, flat);
            }
        }
        Value::Array(items) if !items.is_empty() && depth < max_depth => {
            for (index, child) in items.iter().enumerate() {
                let child_path = format!("{path}#{}", index + 1);
                flatten_into(child, child_path, depth + 1, max_depth, flat);
            }
        }
        leaf => {
            flat.insert(path, leaf.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if matches!(c, '\\' | '.' | '#') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `#` at `start`, followed by an in-range index that ends the segment.
fn index_at(chars: &[char], start: usize) -> Option<(usize, usize)> {
    let digits = chars[start + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let end = start + 1 + digits;
    if digits == 0 || !matches!(chars.get(end), None | Some('.') | Some('#')) {
        return None;
    }
    let index: usize = chars[start + 1..end].iter().collect::<String>().parse().ok()?;
    (1..=MAX_ARRAY_INDEX).contains(&index).then_some((index, end))
}

fn parse_path(path: &str) -> Vec<Segment> {
    let chars: Vec<char> = path.chars().collect();
    let mut segments = Vec::new();
    if chars.is_empty() {
        return segments;
    }

    let mut key = String::new();
    // Whether `key` names a segment; false right after an index.
    let mut in_key = true;
    let mut after_dot = false;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                key.push(chars.get(i + 1).copied().unwrap_or('\\'));
                in_key = true;
                i += 2;
            }
            '.' => {
                if in_key {
                    segments.push(Segment::Key(std::mem::take(&mut key)));
                }
                in_key = true;
                after_dot = true;
                i += 1;
            }
            '#' => match index_at(&chars, i) {
                Some((index, end)) => {
                    if in_key && (!key.is_empty() || after_dot) {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    segments.push(Segment::Index(index));
                    in_key = false;
                    i = end;
                }
                None => {
                    key.push('#');
                    in_key = true;
                    i += 1;
                }
            },
            c => {
                key.push(c);
                in_key = true;
                i += 1;
            }
        }
    }
    if in_key {
        segments.push(Segment::Key(key));
    }
    segments
}

/// Rebuild a nested value from a flat map produced by [`flatten`].
///
/// Gaps in array indices are filled with null.
pub fn unflatten(flat: &BTreeMap<String, Value>) -> Value {
    let mut root = Value::Null;
    for (path, leaf) in flat {
        insert_path(&mut root, &parse_path(path), leaf.clone());
    }
    root
}

fn insert_path(node: &mut Value, segments: &[Segment], leaf: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };
    match first {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                insert_path(child, rest, leaf);
            }
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = node {
                if items.len() < *index {
                    items.resize(*index, Value::Null);
                }
                insert_path(&mut items[*index - 1], rest, leaf);
            }
        }
    }
}

/// Field-level comparison of a structured output against its ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralAnalysis {
    pub completeness: f64,
    pub hallucination: f64,
    /// Ground-truth fields absent from the output.
    pub missing_keys: Vec<String>,
    /// Output fields with no ground-truth counterpart.
    pub extra_keys: Vec<String>,
    /// Fields present in both whose values disagree.
    pub incorrect_keys: Vec<String>,
    pub field_scores: Vec<FieldScore>,
}

impl StructuralAnalysis {
    pub fn is_clean(&self) -> bool {
        self.missing_keys.is_empty() && self.extra_keys.is_empty() && self.incorrect_keys.is_empty()
    }

    pub fn summary(&self) -> Option<String> {
        if self.is_clean() {
            return None;
        }
        let mut parts = Vec::new();
        if !self.missing_keys.is_empty() {
            parts.push(format!("missing: {}", self.missing_keys.join(", ")));
        }
        if !self.extra_keys.is_empty() {
            parts.push(format!("extra: {}", self.extra_keys.join(", ")));
        }
        if !self.incorrect_keys.is_empty() {
            parts.push(format!("incorrect: {}", self.incorrect_keys.join(", ")));
        }
        Some(parts.join("; "))
    }
}

/// Compare the flattened fields of `expected` and `actual`.
///
/// `completeness = |gt ∩ out| / |gt|` and
/// `hallucination = (|extra| + |incorrect|) / |gt ∪ out|`.
pub fn analyze(expected: &Value, actual: &Value, config: &EvaluationConfig) -> StructuralAnalysis {
    let gt = flatten(expected, config.max_depth);
    let out = flatten(actual, config.max_depth);

    let mut missing_keys = Vec::new();
    let mut extra_keys = Vec::new();
    let mut incorrect_keys = Vec::new();
    let mut field_scores = Vec::with_capacity(gt.len() + out.len());

    for (key, gt_value) in &gt {
        match out.get(key) {
            Some(out_value) => {
                let score = compare_leaf(key, gt_value, out_value, config);
                if !score.is_match() {
                    incorrect_keys.push(key.clone());
                }
                field_scores.push(score);
            }
            None => {
                missing_keys.push(key.clone());
                field_scores.push(FieldScore {
                    field_name: key.clone(),
                    gt_value: Some(gt_value.clone()),
                    output_value: None,
                    match_strategy: MatchStrategy::Structural,
                    similarity: None,
                    score: 0.0,
                });
            }
        }
    }

    for (key, out_value) in &out {
        if !gt.contains_key(key) {
            extra_keys.push(key.clone());
            field_scores.push(FieldScore {
                field_name: key.clone(),
                gt_value: None,
                output_value: Some(out_value.clone()),
                match_strategy: MatchStrategy::Structural,
                similarity: None,
                score: 0.0,
            });
        }
    }

    let completeness = if gt.is_empty() {
        1.0
    } else {
        (gt.len() - missing_keys.len()) as f64 / gt.len() as f64
    };
    let union = gt.len() + extra_keys.len();
    let hallucination = if union == 0 {
        0.0
    } else {
        (extra_keys.len() + incorrect_keys.len()) as f64 / union as f64
    };

    StructuralAnalysis {
        completeness,
        hallucination,
        missing_keys,
        extra_keys,
        incorrect_keys,
        field_scores,
    }
}

/// Score one leaf present on both sides. Always 0.0 or 1.0; differing
/// strings keep their fuzzy similarity for reporting.
pub fn compare_leaf(
    field_name: &str,
    gt_value: &Value,
    output_value: &Value,
    config: &EvaluationConfig,
) -> FieldScore {
    let (strategy, similarity, matched) = match (gt_value, output_value) {
        (Value::String(e), Value::String(a)) if e == a => (MatchStrategy::Exact, None, true),
        (Value::String(e), Value::String(a)) => {
            let ratio = fuzzy_ratio(e, a);
            (
                MatchStrategy::Semantic,
                Some(ratio),
                ratio >= config.fuzzy_threshold,
            )
        }
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => {
            match (parse_number(gt_value), parse_number(output_value)) {
                (Some(e), Some(a)) => (
                    MatchStrategy::Numeric,
                    None,
                    (e - a).abs() <= config.numeric_tolerance,
                ),
                _ => (MatchStrategy::Structural, None, gt_value == output_value),
            }
        }
        _ if gt_value == output_value => (MatchStrategy::Exact, None, true),
        _ => (MatchStrategy::Structural, None, false),
    };

    FieldScore {
        field_name: field_name.to_string(),
        gt_value: Some(gt_value.clone()),
        output_value: Some(output_value.clone()),
        match_strategy: strategy,
        similarity,
        score: if matched { 1.0 } else { 0.0 },
    }
}
