//! Scoring Coordinator
//!
//! Runs the configured scorers over assistant pieces that this coordinator has
//! not seen before. The already-scored set lives only as long as the
//! coordinator; a fresh instance starts with an empty set.
//!
//! # Candidate discovery
//!
//! 1. The pieces returned by a dispatch are looked up in memory, in
//!    dispatch-return order.
//! 2. Each conversation those pieces belong to is read back from memory, in
//!    discovery order, and its assistant pieces are appended.
//!
//! Every assistant piece without a response error that is not yet in the
//! scored set is claimed, then handed to each scorer in configured order.

use sdk::{
    ChatMessageRole, MemoryInterface, OrchestratorError, PromptRequestPiece,
    PromptRequestResponse, Score, Scorer,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

pub mod substring_scorer;

pub use substring_scorer::SubStringScorer;

/// Scores each new assistant piece exactly once per scorer
pub struct ScoringCoordinator {
    scorers: Vec<Arc<dyn Scorer>>,
    memory: Arc<dyn MemoryInterface>,
    scored: Mutex<HashSet<Uuid>>,
}

impl ScoringCoordinator {
    pub fn new(scorers: Vec<Arc<dyn Scorer>>, memory: Arc<dyn MemoryInterface>) -> Self {
        Self {
            scorers,
            memory,
            scored: Mutex::new(HashSet::new()),
        }
    }

    pub fn scorers(&self) -> &[Arc<dyn Scorer>] {
        &self.scorers
    }

    /// Whether `piece_id` has already been claimed by a scoring pass
    pub async fn is_scored(&self, piece_id: &Uuid) -> bool {
        self.scored.lock().await.contains(piece_id)
    }

    /// Score the unscored assistant pieces touched by `responses`
    ///
    /// Returns the scores persisted by this pass. The first scorer or memory
    /// error aborts the pass; scores already persisted stay in memory and the
    /// piece being scored stays claimed.
    pub async fn score_responses_async(
        &self,
        responses: &[PromptRequestResponse],
    ) -> Result<Vec<Score>, OrchestratorError> {
        if self.scorers.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.discover_candidates(responses).await?;
        let mut persisted = Vec::new();
        let mut pieces_scored = 0usize;

        for piece in candidates {
            if !self.claim(piece.id).await {
                continue;
            }

            let request_response = piece.to_prompt_request_response();
            for scorer in &self.scorers {
                let scores = scorer.score_async(&request_response).await?;
                debug!(
                    "{} produced {} score(s) for piece {}",
                    scorer.identifier().type_name,
                    scores.len(),
                    piece.id
                );
                self.memory.add_scores_to_memory(&scores).await?;
                persisted.extend(scores);
            }
            pieces_scored += 1;
        }

        info!(
            "Scoring pass finished: {} piece(s), {} score(s)",
            pieces_scored,
            persisted.len()
        );
        Ok(persisted)
    }

    async fn discover_candidates(
        &self,
        responses: &[PromptRequestResponse],
    ) -> Result<Vec<PromptRequestPiece>, OrchestratorError> {
        let ids: Vec<Uuid> = responses
            .iter()
            .flat_map(|response| response.request_pieces.iter().map(|piece| piece.id))
            .collect();

        let dispatched = self.memory.get_prompt_request_pieces_by_id(&ids).await?;

        let mut conversation_ids: Vec<String> = Vec::new();
        for piece in &dispatched {
            if !conversation_ids.contains(&piece.conversation_id) {
                conversation_ids.push(piece.conversation_id.clone());
            }
        }

        let mut history = Vec::new();
        for conversation_id in &conversation_ids {
            for turn in self.memory.get_conversation(conversation_id).await? {
                history.extend(turn.request_pieces);
            }
        }

        let mut seen = HashSet::new();
        Ok(dispatched
            .into_iter()
            .chain(history)
            .filter(|piece| piece.role == ChatMessageRole::Assistant && !piece.has_error())
            .filter(|piece| seen.insert(piece.id))
            .collect())
    }

    /// Mark `piece_id` as scored; false if it already was
    async fn claim(&self, piece_id: Uuid) -> bool {
        self.scored.lock().await.insert(piece_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteMemory;
    use async_trait::async_trait;
    use sdk::{
        construct_response_from_request, Identifier, PromptDataType, PromptResponseError,
        ScoreType, ScoringError,
    };

    /// Scores every piece `true` and records which piece ids it saw
    struct CountingScorer {
        identifier: Identifier,
        seen: std::sync::Mutex<Vec<Uuid>>,
    }

    impl CountingScorer {
        fn new() -> Self {
            Self {
                identifier: Identifier::of::<Self>(),
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<Uuid> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Scorer for CountingScorer {
        fn identifier(&self) -> &Identifier {
            &self.identifier
        }

        async fn score_async(
            &self,
            request_response: &PromptRequestResponse,
        ) -> Result<Vec<Score>, ScoringError> {
            let piece = &request_response.request_pieces[0];
            self.seen.lock().unwrap().push(piece.id);
            Ok(vec![Score::new(
                ScoreType::TrueFalse,
                "true",
                "counting",
                self.identifier.clone(),
                piece.id,
            )?])
        }
    }

    /// Store one user turn and its reply; returns the reply
    async fn exchange(
        memory: &SqliteMemory,
        conversation_id: &str,
        text: &str,
        error: PromptResponseError,
    ) -> PromptRequestResponse {
        let mut request =
            PromptRequestPiece::new(ChatMessageRole::User, text, conversation_id)
                .to_prompt_request_response();
        memory.add_request_response_to_memory(&mut request).await.unwrap();

        let mut response = construct_response_from_request(
            &request.request_pieces[0],
            &[format!("re: {}", text)],
            PromptDataType::Text,
            error,
        );
        memory.add_request_response_to_memory(&mut response).await.unwrap();
        response
    }

    async fn setup() -> (Arc<SqliteMemory>, Arc<CountingScorer>, ScoringCoordinator) {
        let memory = Arc::new(SqliteMemory::in_memory().await.unwrap());
        let scorer = Arc::new(CountingScorer::new());
        let memory_dyn: Arc<dyn MemoryInterface> = Arc::<SqliteMemory>::clone(&memory);
        let scorer_dyn: Arc<dyn Scorer> = Arc::<CountingScorer>::clone(&scorer);
        let coordinator = ScoringCoordinator::new(vec![scorer_dyn], memory_dyn);
        (memory, scorer, coordinator)
    }

    #[tokio::test]
    async fn test_each_assistant_piece_scored_once() {
        let (memory, scorer, coordinator) = setup().await;
        let first = exchange(&memory, "c-1", "one", PromptResponseError::None).await;

        let scores = coordinator
            .score_responses_async(std::slice::from_ref(&first))
            .await
            .unwrap();
        assert_eq!(scores.len(), 1);

        let again = coordinator
            .score_responses_async(std::slice::from_ref(&first))
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(scorer.seen(), vec![first.request_pieces[0].id]);
    }

    #[tokio::test]
    async fn test_history_in_touched_conversation_is_picked_up() {
        let (memory, scorer, coordinator) = setup().await;
        let old = exchange(&memory, "c-1", "old", PromptResponseError::None).await;
        let new = exchange(&memory, "c-1", "new", PromptResponseError::None).await;

        // Only the newest reply is reported, but the older one was never scored
        coordinator
            .score_responses_async(std::slice::from_ref(&new))
            .await
            .unwrap();
        assert_eq!(
            scorer.seen(),
            vec![new.request_pieces[0].id, old.request_pieces[0].id]
        );
    }

    #[tokio::test]
    async fn test_error_pieces_are_skipped() {
        let (memory, scorer, coordinator) = setup().await;
        let failed = exchange(&memory, "c-1", "x", PromptResponseError::Processing).await;

        let scores = coordinator.score_responses_async(&[failed]).await.unwrap();
        assert!(scores.is_empty());
        assert!(scorer.seen().is_empty());
    }

    #[tokio::test]
    async fn test_scores_are_persisted() {
        let (memory, _scorer, coordinator) = setup().await;
        let response = exchange(&memory, "c-1", "one", PromptResponseError::None).await;
        let piece_id = response.request_pieces[0].id;

        coordinator.score_responses_async(&[response]).await.unwrap();

        let stored = memory.get_scores_by_prompt_ids(&[piece_id]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].prompt_request_response_id, piece_id);
        assert!(coordinator.is_scored(&piece_id).await);
    }

    #[tokio::test]
    async fn test_no_scorers_is_a_no_op() {
        let memory = Arc::new(SqliteMemory::in_memory().await.unwrap());
        let response = exchange(&memory, "c-1", "one", PromptResponseError::None).await;
        let memory_dyn: Arc<dyn MemoryInterface> = memory;
        let coordinator = ScoringCoordinator::new(vec![], memory_dyn);

        assert!(coordinator
            .score_responses_async(&[response])
            .await
            .unwrap()
            .is_empty());
    }
}
