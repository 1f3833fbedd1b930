//! Redline Engine Library
//!
//! The prompt-orchestration core: converter pipelines, the request
//! normalizer, diff-based scoring and the `PromptSendingOrchestrator` that
//! composes them, plus a SQLite memory store and an OpenAI-compatible target.

/// Configuration management module
pub mod config;

/// Prompt converter pipeline and built-in converters
pub mod converters;

/// Database persistence module
pub mod db;

/// Request building and batched dispatch
pub mod normalizer;

/// Orchestrators
pub mod orchestrator;

/// Incremental scoring and built-in scorers
pub mod scoring;

/// Built-in prompt targets
pub mod targets;

/// Telemetry and Observability
pub mod telemetry;
