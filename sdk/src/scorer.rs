//! Scorer trait

use async_trait::async_trait;

use crate::errors::ScoringError;
use crate::identifier::Identifier;
use crate::score::Score;
use crate::types::PromptRequestResponse;

/// Trait that all scorers must implement
///
/// The coordinator hands a scorer one response piece wrapped in a
/// `PromptRequestResponse`. Scorers must not mutate it; the returned scores
/// are persisted by the caller.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Returns the identifier stored as `scorer_class_identifier`
    fn identifier(&self) -> &Identifier;

    /// Evaluate a response
    async fn score_async(
        &self,
        request_response: &PromptRequestResponse,
    ) -> Result<Vec<Score>, ScoringError>;
}
