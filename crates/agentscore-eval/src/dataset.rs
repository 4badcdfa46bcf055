use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

use agentscore_core::{
    AgentScoreError, CandidateOutput, EvaluationConfig, GroundTruthRecord, MatchType,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source key names for loosely-shaped input records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMapping {
    pub query_id_key: String,
    pub expected_output_key: String,
    pub match_type_key: String,
    pub query_key: String,
    pub context_key: String,
    pub output_key: String,
    pub run_id_key: String,
    /// AI records may carry several runs' outputs as an array under this key.
    pub outputs_key: String,
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self {
            query_id_key: "query_id".into(),
            expected_output_key: "expected_output".into(),
            match_type_key: "match_type".into(),
            query_key: "query".into(),
            context_key: "context".into(),
            output_key: "output".into(),
            run_id_key: "run_id".into(),
            outputs_key: "outputs".into(),
        }
    }
}

/// Which kind of record a conversion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertMode {
    #[serde(rename = "gt")]
    GroundTruth,
    #[serde(rename = "ai")]
    AiOutput,
}

/// Inline evaluation request: records plus optional key mapping and config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub ground_truth: Vec<Value>,
    pub ai_outputs: Vec<Value>,
    #[serde(flatten)]
    pub mapping: KeyMapping,
    #[serde(flatten)]
    pub config: EvaluationConfig,
}

impl EvaluationRequest {
    pub fn new(ground_truth: Vec<Value>, ai_outputs: Vec<Value>) -> Self {
        Self {
            ground_truth,
            ai_outputs,
            mapping: KeyMapping::default(),
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_mapping(mut self, mapping: KeyMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse both record sets and check they reference each other correctly.
    pub fn parse(&self) -> Result<(Vec<GroundTruthRecord>, Vec<CandidateOutput>), AgentScoreError> {
        let ground_truth = parse_ground_truth(&self.ground_truth, &self.mapping)?;
        let outputs = parse_candidate_outputs(&self.ai_outputs, &self.mapping)?;
        validate_batch(&ground_truth, &outputs)?;
        Ok((ground_truth, outputs))
    }
}

/// Evaluation request naming JSON files relative to a base directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRequest {
    pub ground_truth_path: String,
    pub ai_outputs_path: String,
    #[serde(flatten)]
    pub mapping: KeyMapping,
    #[serde(flatten)]
    pub config: EvaluationConfig,
}

impl PathRequest {
    pub fn new(ground_truth_path: impl Into<String>, ai_outputs_path: impl Into<String>) -> Self {
        Self {
            ground_truth_path: ground_truth_path.into(),
            ai_outputs_path: ai_outputs_path.into(),
            mapping: KeyMapping::default(),
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mapping(mut self, mapping: KeyMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Read both files from `base_dir` into an inline request.
    pub async fn load(&self, base_dir: &Path) -> Result<EvaluationRequest, AgentScoreError> {
        let ground_truth = load_records(base_dir, &self.ground_truth_path).await?;
        let ai_outputs = load_records(base_dir, &self.ai_outputs_path).await?;
        Ok(EvaluationRequest {
            ground_truth,
            ai_outputs,
            mapping: self.mapping.clone(),
            config: self.config.clone(),
        })
    }
}

/// Join `relative` onto `base_dir`, refusing absolute paths and `..`.
pub fn resolve_within(base_dir: &Path, relative: &str) -> Result<PathBuf, AgentScoreError> {
    let path = Path::new(relative);
    if relative.trim().is_empty() {
        return Err(AgentScoreError::Validation("path must not be empty".into()));
    }
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.is_absolute() || escapes {
        return Err(AgentScoreError::Validation(format!(
            "path {relative:?} must be relative to the data directory"
        )));
    }
    Ok(base_dir.join(path))
}

/// Load a JSON array of records from a file inside `base_dir`.
pub async fn load_records(base_dir: &Path, relative: &str) -> Result<Vec<Value>, AgentScoreError> {
    let path = resolve_within(base_dir, relative)?;
    let data = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AgentScoreError::Io(format!("failed to read {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&data)
        .map_err(|e| AgentScoreError::Parsing(format!("{}: {e}", path.display())))?;
    match value {
        Value::Array(records) => Ok(records),
        _ => Err(AgentScoreError::Validation(format!(
            "{} must contain a JSON array of records",
            path.display()
        ))),
    }
}

pub fn parse_ground_truth(
    records: &[Value],
    mapping: &KeyMapping,
) -> Result<Vec<GroundTruthRecord>, AgentScoreError> {
    records
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let obj = as_record(item, "ground truth", index)?;
            let query_id = required_id(obj, &mapping.query_id_key, "ground truth", index)?;
            let expected_output = obj
                .get(&mapping.expected_output_key)
                .cloned()
                .ok_or_else(|| missing_key("ground truth", index, &mapping.expected_output_key))?;

            let match_type = match obj.get(&mapping.match_type_key) {
                None | Some(Value::Null) => MatchType::default(),
                Some(Value::String(name)) => name.parse().map_err(|e| {
                    AgentScoreError::Validation(format!(
                        "ground truth record {index} ({query_id}): {e}"
                    ))
                })?,
                Some(other) => {
                    return Err(AgentScoreError::Validation(format!(
                        "ground truth record {index}: '{}' must be a string, got {other}",
                        mapping.match_type_key
                    )))
                }
            };

            Ok(GroundTruthRecord {
                query_id,
                query: optional_text(obj, &mapping.query_key),
                expected_output,
                match_type,
                context: optional_text(obj, &mapping.context_key),
            })
        })
        .collect()
}

/// Parse AI output records. An array under `outputs_key` expands into runs
/// `run_1..run_n`; otherwise a missing run id defaults to `run_1`.
pub fn parse_candidate_outputs(
    records: &[Value],
    mapping: &KeyMapping,
) -> Result<Vec<CandidateOutput>, AgentScoreError> {
    let mut outputs = Vec::with_capacity(records.len());
    for (index, item) in records.iter().enumerate() {
        let obj = as_record(item, "output", index)?;
        let query_id = required_id(obj, &mapping.query_id_key, "output", index)?;

        match obj.get(&mapping.outputs_key) {
            Some(Value::Array(runs)) => {
                outputs.extend(runs.iter().enumerate().map(|(run, output)| {
                    CandidateOutput::new(query_id.clone(), format!("run_{}", run + 1), output.clone())
                }));
            }
            Some(other) => {
                return Err(AgentScoreError::Validation(format!(
                    "output record {index}: '{}' must be an array, got {other}",
                    mapping.outputs_key
                )))
            }
            None => {
                let output = obj
                    .get(&mapping.output_key)
                    .cloned()
                    .ok_or_else(|| missing_key("output", index, &mapping.output_key))?;
                let run_id = obj
                    .get(&mapping.run_id_key)
                    .and_then(id_text)
                    .unwrap_or_else(|| "run_1".to_string());
                outputs.push(CandidateOutput::new(query_id, run_id, output));
            }
        }
    }
    Ok(outputs)
}

/// Reject duplicate query ids, outputs for unknown queries and duplicate
/// `(query_id, run_id)` outputs.
pub fn validate_batch(
    ground_truth: &[GroundTruthRecord],
    outputs: &[CandidateOutput],
) -> Result<(), AgentScoreError> {
    let mut query_ids = HashSet::with_capacity(ground_truth.len());
    for record in ground_truth {
        if !query_ids.insert(record.query_id.as_str()) {
            return Err(AgentScoreError::Validation(format!(
                "duplicate query_id {:?} in ground truth",
                record.query_id
            )));
        }
    }

    let mut seen = BTreeSet::new();
    for (index, output) in outputs.iter().enumerate() {
        if !query_ids.contains(output.query_id.as_str()) {
            return Err(AgentScoreError::Validation(format!(
                "output {index} references unknown query_id {:?}",
                output.query_id
            )));
        }
        if !seen.insert((output.query_id.as_str(), output.run_id.as_str())) {
            return Err(AgentScoreError::Validation(format!(
                "duplicate output for query_id {:?} in run {:?}",
                output.query_id, output.run_id
            )));
        }
    }
    Ok(())
}

/// Normalize loosely-keyed records into canonical ground-truth or output
/// records.
pub fn convert_records(
    records: &[Value],
    mode: ConvertMode,
    mapping: &KeyMapping,
) -> Result<Vec<Value>, AgentScoreError> {
    let converted = match mode {
        ConvertMode::GroundTruth => parse_ground_truth(records, mapping)?
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>(),
        ConvertMode::AiOutput => parse_candidate_outputs(records, mapping)?
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>(),
    };
    converted.map_err(|e| AgentScoreError::Parsing(e.to_string()))
}

fn as_record<'a>(
    item: &'a Value,
    kind: &str,
    index: usize,
) -> Result<&'a Map<String, Value>, AgentScoreError> {
    item.as_object().ok_or_else(|| {
        AgentScoreError::Validation(format!("{kind} record {index} is not a JSON object"))
    })
}

fn required_id(
    obj: &Map<String, Value>,
    key: &str,
    kind: &str,
    index: usize,
) -> Result<String, AgentScoreError> {
    obj.get(key)
        .and_then(id_text)
        .ok_or_else(|| missing_key(kind, index, key))
}

/// Ids may be non-empty strings or numbers.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strings are taken as-is; arrays of strings are joined by blank lines.
fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("\n\n"))
        }
        _ => None,
    }
}

fn missing_key(kind: &str, index: usize, key: &str) -> AgentScoreError {
    AgentScoreError::Validation(format!("{kind} record {index} is missing '{key}'"))
}
