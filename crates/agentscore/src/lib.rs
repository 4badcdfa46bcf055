//! agentscore: an evaluation scoring engine for AI agent outputs.
//!
//! This crate re-exports the agentscore sub-crates for single-import usage.
//! Enable features to control which modules are available.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `eval`, `embeddings`, `callbacks` |
//! | `eval` | `ScoringEngine`, `BatchEvaluator`, matchers, consistency, RQS, history stores |
//! | `embeddings` | `FakeEmbeddings`, `CacheBackedEmbeddings`, `OpenAiEmbeddings` |
//! | `models` | `ProviderBackend`, `OpenAiChatModel`, `ScriptedChatModel`, `RetryChatModel` |
//! | `callbacks` | `RecordingHandler`, `TracingHandler`, `ChannelHandler` |
//! | `openai` | `models` + `embeddings` (remote judge and embeddings) |
//! | `full` | All features enabled |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agentscore::core::{CandidateOutput, EvaluationConfig, GroundTruthRecord, MatchType};
//! use agentscore::embeddings::FakeEmbeddings;
//! use agentscore::eval::{BatchEvaluator, CancellationFlag, EmbeddingSimilarity, ScoringEngine};
//!
//! let similarity = Arc::new(EmbeddingSimilarity::new(Arc::new(FakeEmbeddings::default())));
//! let evaluator = BatchEvaluator::new(Arc::new(ScoringEngine::new(similarity)));
//! let result = evaluator
//!     .evaluate(&ground_truth, &outputs, &EvaluationConfig::default(), &CancellationFlag::new())
//!     .await?;
//! ```

/// Data model, `EvaluationConfig`, `AgentScoreError` and collaborator traits.
/// Always available.
pub use agentscore_core as core;

/// Scoring engine: type-dispatch matcher, accuracy decision tree, entity
/// checker, consistency, structure analysis, RQS, batch runner, datasets and
/// history.
#[cfg(feature = "eval")]
pub use agentscore_eval as eval;

/// Embedding backends for semantic similarity.
#[cfg(feature = "embeddings")]
pub use agentscore_embeddings as embeddings;

/// ProviderBackend abstraction and chat models for the LLM judge.
#[cfg(feature = "models")]
pub use agentscore_models as models;

/// Progress event handlers.
#[cfg(feature = "callbacks")]
pub use agentscore_callbacks as callbacks;
