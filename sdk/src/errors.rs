//! Error types and handling
//!
//! This module provides the error taxonomy shared by the orchestration core and
//! its collaborators (converters, targets, scorers, memory stores). Every error
//! implements the `HarnessErrorExt` trait which provides a user-friendly hint and
//! indicates whether the error is recoverable.
//!
//! # Propagation
//!
//! - `ConversionError` aborts one request before dispatch. Siblings are unaffected.
//! - `TargetError` is reported per request, inside a `RequestError::Dispatch` slot.
//! - `ScoringError` propagates out of the send call. Scores already persisted stay.
//! - `MemoryError::IdentityCollision` is the duplicate-id case; random v4 ids keep
//!   it practically unreachable.

use thiserror::Error;

use crate::types::PromptDataType;

/// Trait for harness error extensions
///
/// Hints are static strings, safe to show to an operator. They never include
/// prompt contents, API keys or response bodies.
pub trait HarnessErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller. Non-recoverable errors
    /// need a configuration or code change.
    fn is_recoverable(&self) -> bool;
}

/// A converter rejected its input
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("Converter {converter} does not accept input type {input_type}")]
    UnsupportedInputType {
        converter: String,
        input_type: PromptDataType,
    },

    #[error("Invalid converter input: {0}")]
    InvalidInput(String),
}

/// A target failed to produce a response for one request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TargetError {
    #[error("Target unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request blocked by target: {0}")]
    Blocked(String),
}

/// A scorer failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("Invalid score value '{value}' for score type {score_type}")]
    InvalidScoreValue { value: String, score_type: String },

    #[error("Scorer does not support data type {0}")]
    UnsupportedDataType(PromptDataType),

    #[error("Scoring failed: {0}")]
    Failed(String),
}

/// The memory store failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MemoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Identifier already present in memory: {0}")]
    IdentityCollision(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Serialization(e.to_string())
    }
}

/// A caller-built request is malformed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("No request pieces provided")]
    EmptyRequest,

    #[error("Prompt value is empty")]
    EmptyPromptValue,

    #[error("File not found for {data_type} prompt: {path}")]
    MissingFile {
        data_type: PromptDataType,
        path: String,
    },
}

/// Error marker for one slot of a batch
///
/// A failed slot never aborts its siblings. The caller sees one
/// `Result<PromptRequestResponse, RequestError>` per request sent.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Dispatch(#[from] TargetError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Errors propagated out of an orchestrator send call
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarnessErrorExt for ConversionError {
    fn user_hint(&self) -> &str {
        match self {
            Self::UnsupportedInputType { .. } => {
                "A converter does not accept this prompt data type. Reorder or remove it"
            }
            Self::InvalidInput(_) => "The prompt could not be converted",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

impl HarnessErrorExt for TargetError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Unavailable(_) => "Target unavailable. Check the endpoint and try again",
            Self::AuthenticationFailed(_) => "Target rejected the credentials. Check the API key",
            Self::RateLimited => "Target rate limit hit. Lower the batch size or wait",
            Self::InvalidRequest(_) => "Target rejected the request format",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Timeout => "Target took too long to respond. Try again",
            Self::Parse(_) => "Target returned a response that could not be read",
            Self::Blocked(_) => "Target refused to answer this prompt",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AuthenticationFailed(_) | Self::InvalidRequest(_))
    }
}

impl HarnessErrorExt for ScoringError {
    fn user_hint(&self) -> &str {
        match self {
            Self::InvalidScoreValue { .. } => "Scorer produced a value that does not match its type",
            Self::UnsupportedDataType(_) => "Scorer cannot evaluate this kind of response",
            Self::Failed(_) => "Scoring failed. Check scorer logs",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl HarnessErrorExt for MemoryError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Database(_) => "Memory store operation failed. Check the database file",
            Self::IdentityCollision(_) => "Duplicate record id. Retry with a fresh request",
            Self::Serialization(_) => "A stored record could not be decoded",
            Self::NotFound(_) => "Requested record is not in memory",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Serialization(_))
    }
}

impl HarnessErrorExt for ValidationError {
    fn user_hint(&self) -> &str {
        match self {
            Self::EmptyRequest => "A request needs at least one piece",
            Self::EmptyPromptValue => "Prompt value must not be empty",
            Self::MissingFile { .. } => "Referenced prompt file does not exist",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

impl HarnessErrorExt for RequestError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(e) => e.user_hint(),
            Self::Conversion(e) => e.user_hint(),
            Self::Dispatch(e) => e.user_hint(),
            Self::Memory(e) => e.user_hint(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_recoverable(),
            Self::Conversion(e) => e.is_recoverable(),
            Self::Dispatch(e) => e.is_recoverable(),
            Self::Memory(e) => e.is_recoverable(),
        }
    }
}

impl HarnessErrorExt for OrchestratorError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(e) => e.user_hint(),
            Self::Scoring(e) => e.user_hint(),
            Self::Memory(e) => e.user_hint(),
            Self::Request(e) => e.user_hint(),
            Self::Config(_) => "Check your config.toml file for errors",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_recoverable(),
            Self::Scoring(e) => e.is_recoverable(),
            Self::Memory(e) => e.is_recoverable(),
            Self::Request(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_delegates_hint() {
        let err = RequestError::from(TargetError::RateLimited);
        assert_eq!(err.user_hint(), TargetError::RateLimited.user_hint());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_authentication_is_not_recoverable() {
        let err = TargetError::AuthenticationFailed("401".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_conversion_error_message() {
        let err = ConversionError::UnsupportedInputType {
            converter: "Base64Converter".to_string(),
            input_type: PromptDataType::ImagePath,
        };
        assert_eq!(
            err.to_string(),
            "Converter Base64Converter does not accept input type image_path"
        );
    }

    #[test]
    fn test_orchestrator_error_wraps_scoring() {
        let err: OrchestratorError = ScoringError::Failed("boom".to_string()).into();
        assert!(matches!(err, OrchestratorError::Scoring(_)));
        assert!(err.to_string().contains("boom"));
    }
}
