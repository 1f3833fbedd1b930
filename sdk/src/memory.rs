//! Memory store contract
//!
//! The memory store is the durable, append-mostly log of request/response
//! pieces and scores. Writes are durable before the call returns. No row is
//! ever updated in place, so instances sharing one store need no locking
//! beyond what each single write does.

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::MemoryError;
use crate::score::Score;
use crate::types::{PromptRequestPiece, PromptRequestResponse};

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Trait that all memory stores must implement
#[async_trait]
pub trait MemoryInterface: Send + Sync {
    /// Append one turn to its conversation
    ///
    /// Assigns the conversation's next sequence number to every piece of
    /// `request` before writing it, so the caller's copy matches what is stored.
    async fn add_request_response_to_memory(&self, request: &mut PromptRequestResponse)
        -> Result<()>;

    /// Append several turns in one write, numbering them in slice order
    ///
    /// Either every turn is stored or none is. A request and its response
    /// appended together always get consecutive sequence numbers.
    async fn add_turns_to_memory(&self, turns: &mut [PromptRequestResponse]) -> Result<()>;

    /// Append pieces exactly as given
    async fn add_request_pieces_to_memory(&self, pieces: &[PromptRequestPiece]) -> Result<()>;

    /// Append scores
    async fn add_scores_to_memory(&self, scores: &[Score]) -> Result<()>;

    /// All turns of a conversation, ordered by sequence
    async fn get_conversation(&self, conversation_id: &str) -> Result<Vec<PromptRequestResponse>>;

    /// Pieces with the given ids, in the order requested; unknown ids are skipped
    async fn get_prompt_request_pieces_by_id(&self, ids: &[Uuid])
        -> Result<Vec<PromptRequestPiece>>;

    /// Pieces tagged with the given orchestrator id
    async fn get_prompt_request_pieces_by_orchestrator(
        &self,
        orchestrator_id: &str,
    ) -> Result<Vec<PromptRequestPiece>>;

    /// Pieces whose labels contain every given key/value pair
    async fn get_prompt_request_pieces_by_labels(
        &self,
        labels: &HashMap<String, String>,
    ) -> Result<Vec<PromptRequestPiece>>;

    /// Scores attached to pieces tagged with the given orchestrator id
    async fn get_scores_by_orchestrator_id(&self, orchestrator_id: &str) -> Result<Vec<Score>>;

    /// Scores attached to the given pieces
    async fn get_scores_by_prompt_ids(&self, ids: &[Uuid]) -> Result<Vec<Score>>;
}
