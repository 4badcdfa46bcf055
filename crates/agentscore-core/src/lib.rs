use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// MatchType
// ---------------------------------------------------------------------------

/// Declared comparison strategy for a ground-truth record's expected value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Text,
    Paragraph,
    Number,
    Json,
    Email,
    Date,
    Exact,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Text => "text",
            MatchType::Paragraph => "paragraph",
            MatchType::Number => "number",
            MatchType::Json => "json",
            MatchType::Email => "email",
            MatchType::Date => "date",
            MatchType::Exact => "exact",
        }
    }

    /// Free-text types are decided by the accuracy decision tree rather than a comparator.
    pub fn is_text(&self) -> bool {
        matches!(self, MatchType::Text | MatchType::Paragraph)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, MatchType::Json)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = AgentScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(MatchType::Text),
            "paragraph" => Ok(MatchType::Paragraph),
            "number" => Ok(MatchType::Number),
            "json" => Ok(MatchType::Json),
            "email" => Ok(MatchType::Email),
            "date" => Ok(MatchType::Date),
            "exact" => Ok(MatchType::Exact),
            other => Err(AgentScoreError::Validation(format!(
                "unknown match type: {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// The reference answer for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub query_id: String,
    /// The prompt that produced the outputs. Only the LLM judge reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub expected_output: Value,
    #[serde(default)]
    pub match_type: MatchType,
    /// Retrieval context the answer should be grounded in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl GroundTruthRecord {
    pub fn new(
        query_id: impl Into<String>,
        expected_output: impl Into<Value>,
        match_type: MatchType,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            query: None,
            expected_output: expected_output.into(),
            match_type,
            context: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// One agent answer for a query, produced by a particular run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutput {
    pub query_id: String,
    pub run_id: String,
    pub output: Value,
}

impl CandidateOutput {
    pub fn new(
        query_id: impl Into<String>,
        run_id: impl Into<String>,
        output: impl Into<Value>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            run_id: run_id.into(),
            output: output.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Which comparator produced a field score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Semantic,
    Numeric,
    Structural,
}

/// Per-field comparison inside a structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldScore {
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_value: Option<Value>,
    pub match_strategy: MatchStrategy,
    /// Only populated for the semantic strategy. Kept for partial-credit reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub score: f64,
}

impl FieldScore {
    pub fn is_match(&self) -> bool {
        self.score >= 1.0
    }
}

/// Outcome kind of a scored (or unscorable) output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Correct,
    Hallucination,
    PartialMatch,
    Missing,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Correct => "correct",
            ErrorType::Hallucination => "hallucination",
            ErrorType::PartialMatch => "partial_match",
            ErrorType::Missing => "missing",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The branch of the scoring logic that settled an accuracy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    EmptyOutput,
    ExactMatch,
    SemanticBelowThreshold,
    EntityMismatch,
    SemanticAndEntityPass,
    JudgeOverride,
    TypedMatch,
    TypedMismatch,
}

/// Per-(query, run) score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryScoreResult {
    pub query_id: String,
    pub run_id: String,
    pub match_type: MatchType,
    pub accuracy: f64,
    /// Byte-equal text or a typed comparator match; feeds the correctness ratio.
    pub exact_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_score: Option<f64>,
    pub completeness: f64,
    pub hallucination: f64,
    pub safety: f64,
    pub consistency: f64,
    pub support: f64,
    pub rqs: f64,
    pub error_type: ErrorType,
    pub reason: DecisionReason,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_scores: Vec<FieldScore>,
}

/// An output that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub query_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub error_type: ErrorType,
    pub message: String,
}

impl QueryFailure {
    pub fn missing(
        query_id: impl Into<String>,
        run_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            run_id,
            error_type: ErrorType::Missing,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Agreement between outputs of different runs.
    CrossRun,
    /// Agreement between sentences of a single output.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConsistency {
    pub query_id: String,
    pub mode: ConsistencyMode,
    pub score: f64,
    pub pair_count: usize,
}

/// Pass/fail of each headline metric against its configured threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricVerdicts {
    pub accuracy: bool,
    pub consistency: bool,
    pub hallucination: bool,
    pub rqs: bool,
}

/// Arithmetic means over a set of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub query_count: usize,
    pub accuracy: f64,
    pub completeness: f64,
    pub hallucination: f64,
    pub consistency: f64,
    pub safety: f64,
    pub support: f64,
    pub rqs: f64,
    pub passed: MetricVerdicts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub correctness_ratio: f64,
    pub aggregate: AggregateResult,
}

/// Everything produced by one evaluation submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluation_id: String,
    pub created_at: DateTime<Utc>,
    pub results: Vec<QueryScoreResult>,
    #[serde(default)]
    pub failures: Vec<QueryFailure>,
    #[serde(default)]
    pub consistency: Vec<QueryConsistency>,
    pub runs: Vec<RunSummary>,
    pub aggregate: AggregateResult,
    pub error_summary: BTreeMap<ErrorType, usize>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub skipped_queries: Vec<String>,
    pub config: EvaluationConfig,
}

impl EvaluationResult {
    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            evaluation_id: self.evaluation_id.clone(),
            created_at: self.created_at,
            result_count: self.results.len(),
            failure_count: self.failures.len(),
            run_count: self.runs.len(),
            cancelled: self.cancelled,
            aggregate: self.aggregate.clone(),
        }
    }

    pub fn run(&self, run_id: &str) -> Option<&RunSummary> {
        self.runs.iter().find(|r| r.run_id == run_id)
    }
}

/// History list entry for a past evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluation_id: String,
    pub created_at: DateTime<Utc>,
    pub result_count: usize,
    pub failure_count: usize,
    pub run_count: usize,
    pub cancelled: bool,
    pub aggregate: AggregateResult,
}

// ---------------------------------------------------------------------------
// EvaluationConfig
// ---------------------------------------------------------------------------

/// How per-query signals are combined into the Response Quality Score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RqsProfile {
    /// `alpha * accuracy + beta * consistency + gamma * support`.
    Standard,
    /// Accuracy, completeness, inverted hallucination and safety.
    Structured,
    /// `Structured` for json records, `Standard` for everything else.
    #[default]
    Auto,
}

/// Upper bound for [`EvaluationConfig::workers`].
pub const MAX_WORKERS: usize = 1024;

/// Thresholds, weights and limits for one evaluation call.
///
/// Passed explicitly into every scoring function; there is no global state.
/// Weights are not required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub semantic_threshold: f64,
    pub entity_threshold: f64,
    pub llm_threshold: f64,
    pub use_llm_judge: bool,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub accuracy_threshold: f64,
    pub consistency_threshold: f64,
    pub hallucination_threshold: f64,
    pub rqs_threshold: f64,
    pub fuzzy_threshold: f64,
    pub w_accuracy: f64,
    pub w_completeness: f64,
    pub w_hallucination: f64,
    pub w_safety: f64,
    pub numeric_tolerance: f64,
    pub rqs_profile: RqsProfile,
    /// Maximum number of queries scored concurrently, `1..=MAX_WORKERS`.
    pub workers: usize,
    /// Per-call timeout for embedding and judge calls. 0 disables the timeout.
    pub scorer_timeout_ms: u64,
    /// Nesting limit for structured comparison and flattening.
    pub max_depth: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            semantic_threshold: 0.72,
            entity_threshold: 0.5,
            llm_threshold: 0.75,
            use_llm_judge: false,
            alpha: 0.6,
            beta: 0.2,
            gamma: 0.2,
            accuracy_threshold: 0.5,
            consistency_threshold: 0.5,
            hallucination_threshold: 0.5,
            rqs_threshold: 0.5,
            fuzzy_threshold: 0.85,
            w_accuracy: 0.45,
            w_completeness: 0.25,
            w_hallucination: 0.15,
            w_safety: 0.15,
            numeric_tolerance: 1e-6,
            rqs_profile: RqsProfile::Auto,
            workers: 5,
            scorer_timeout_ms: 30_000,
            max_depth: 64,
        }
    }
}

impl EvaluationConfig {
    pub fn with_semantic_threshold(mut self, threshold: f64) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    pub fn with_entity_threshold(mut self, threshold: f64) -> Self {
        self.entity_threshold = threshold;
        self
    }

    pub fn with_llm_judge(mut self, threshold: f64) -> Self {
        self.use_llm_judge = true;
        self.llm_threshold = threshold;
        self
    }

    pub fn with_numeric_tolerance(mut self, tolerance: f64) -> Self {
        self.numeric_tolerance = tolerance;
        self
    }

    pub fn with_standard_weights(mut self, alpha: f64, beta: f64, gamma: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self.gamma = gamma;
        self
    }

    pub fn with_structured_weights(
        mut self,
        accuracy: f64,
        completeness: f64,
        hallucination: f64,
        safety: f64,
    ) -> Self {
        self.w_accuracy = accuracy;
        self.w_completeness = completeness;
        self.w_hallucination = hallucination;
        self.w_safety = safety;
        self
    }

    pub fn with_rqs_profile(mut self, profile: RqsProfile) -> Self {
        self.rqs_profile = profile;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_scorer_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.scorer_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reject values no evaluation can run with.
    ///
    /// Weights that do not sum to 1 are accepted: the RQS is then an
    /// unnormalized weighted sum.
    pub fn validate(&self) -> Result<(), AgentScoreError> {
        let thresholds = [
            ("semantic_threshold", self.semantic_threshold),
            ("entity_threshold", self.entity_threshold),
            ("llm_threshold", self.llm_threshold),
            ("accuracy_threshold", self.accuracy_threshold),
            ("consistency_threshold", self.consistency_threshold),
            ("hallucination_threshold", self.hallucination_threshold),
            ("rqs_threshold", self.rqs_threshold),
            ("fuzzy_threshold", self.fuzzy_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AgentScoreError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let weights = [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("w_accuracy", self.w_accuracy),
            ("w_completeness", self.w_completeness),
            ("w_hallucination", self.w_hallucination),
            ("w_safety", self.w_safety),
            ("numeric_tolerance", self.numeric_tolerance),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(AgentScoreError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.workers == 0 {
            return Err(AgentScoreError::Config("workers must be at least 1".into()));
        }
        if self.workers > MAX_WORKERS {
            return Err(AgentScoreError::Config(format!(
                "workers must be at most {MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.max_depth == 0 {
            return Err(AgentScoreError::Config(
                "max_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chat messages (LLM judge transport)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },
    #[serde(rename = "human")]
    Human { content: String },
    #[serde(rename = "assistant")]
    AI { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::AI {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content } | Message::Human { content } | Message::AI { content } => {
                content
            }
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::Human { .. } => "human",
            Message::AI { .. } => "assistant",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Progress notification emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub agent_name: String,
    pub message: String,
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(
        agent_name: impl Into<String>,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: message.into(),
            status,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type with variants covering each subsystem.
#[derive(Debug, Error)]
pub enum AgentScoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("model error: {0}")]
    Model(String),
    #[error("judge error: {0}")]
    Judge(String),
    #[error("rate limit: {0}")]
    RateLimit(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("callback error: {0}")]
    Callback(String),
    #[error("history error: {0}")]
    History(String),
}

impl AgentScoreError {
    /// Errors from an external scorer that leave a query unscored rather than wrong.
    pub fn is_scorer_failure(&self) -> bool {
        matches!(
            self,
            AgentScoreError::Embedding(_)
                | AgentScoreError::Model(_)
                | AgentScoreError::Judge(_)
                | AgentScoreError::RateLimit(_)
                | AgentScoreError::Timeout(_)
                | AgentScoreError::Parsing(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Trait for embedding text into vectors.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts in one call.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AgentScoreError>;

    /// Embed a single text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentScoreError>;
}

/// Semantic similarity between two texts, as a cosine in `[-1, 1]`.
///
/// Results are only stable within a tolerance across model versions.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f64, AgentScoreError>;
}

/// Extracts named-entity surface strings (people, places, orgs, dates, figures).
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> BTreeSet<String>;
}

/// Scores how safe an output is, in `[0, 1]` (1.0 is safe).
pub trait SafetyScorer: Send + Sync {
    fn safety(&self, text: &str) -> f64;
}

/// Scores an answer against a reference, in `[0, 1]`.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, query: &str, expected: &str, actual: &str)
        -> Result<f64, AgentScoreError>;
}

/// Language model provider used by the LLM judge.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentScoreError>;
}

/// Receives progress events during batch evaluation.
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn on_event(&self, event: ProgressEvent) -> Result<(), AgentScoreError>;
}

/// Persistence for past evaluation results.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, result: &EvaluationResult) -> Result<(), AgentScoreError>;

    /// Summaries of stored evaluations, newest first.
    async fn list(&self) -> Result<Vec<EvaluationSummary>, AgentScoreError>;

    async fn get(&self, evaluation_id: &str) -> Result<Option<EvaluationResult>, AgentScoreError>;

    async fn latest(&self) -> Result<Option<EvaluationResult>, AgentScoreError>;
}
