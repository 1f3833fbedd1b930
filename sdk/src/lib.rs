//! Redline SDK
//!
//! Shared library providing the data model and the collaborator contracts
//! (converters, targets, scorers, memory stores) of the Redline orchestration
//! engine. Converter, target and scorer implementations depend on this crate
//! only.

/// Prompt converter trait
pub mod converter;

/// Error types and handling
pub mod errors;

/// Component identity
pub mod identifier;

/// Memory store contract
pub mod memory;

/// Score records
pub mod score;

/// Scorer trait
pub mod scorer;

/// Prompt target trait
pub mod target;

/// Conversation data model
pub mod types;

// Re-export commonly used types
pub use converter::{ConverterResult, PromptConverter};
pub use errors::{
    ConversionError, HarnessErrorExt, MemoryError, OrchestratorError, RequestError, ScoringError,
    TargetError, ValidationError,
};
pub use identifier::Identifier;
pub use memory::MemoryInterface;
pub use score::{Score, ScoreType, ScoreValue};
pub use scorer::Scorer;
pub use target::PromptTarget;
pub use types::{
    construct_response_from_request, ChatMessageRole, PromptDataType, PromptRequestPiece,
    PromptRequestResponse, PromptResponseError,
};
