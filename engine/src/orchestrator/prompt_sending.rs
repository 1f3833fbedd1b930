//! Prompt Sending Orchestrator
//!
//! Sends prompts through the configured converters to one target, records
//! every exchange in memory, then scores whatever new assistant pieces the
//! exchange produced.
//!
//! # Results
//!
//! Batch sends return one `RequestOutcome` per input, in input order. A failed
//! slot is an `Err` in that vector, never a missing entry. Errors that abort
//! the whole call (invalid requests, scorer failures, memory failures while
//! scoring) come back as `OrchestratorError`.

use sdk::{
    Identifier, MemoryError, MemoryInterface, OrchestratorError, PromptConverter,
    PromptRequestPiece, PromptRequestResponse, PromptTarget, Score, Scorer,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::merge_labels;
use crate::config::OrchestratorConfig;
use crate::normalizer::{NormalizerRequest, PromptNormalizer, RequestOutcome};
use crate::scoring::ScoringCoordinator;

/// Requests dispatched concurrently when no batch size is configured
pub const DEFAULT_BATCH_SIZE: usize = 10;

pub struct PromptSendingOrchestrator {
    identifier: Identifier,
    target: Arc<dyn PromptTarget>,
    memory: Arc<dyn MemoryInterface>,
    normalizer: PromptNormalizer,
    scoring: ScoringCoordinator,

    /// Applied to every prompt sent through `send_prompts_async` / `send_prompt_async`
    converters: Vec<Arc<dyn PromptConverter>>,
    memory_labels: HashMap<String, String>,
    batch_size: usize,
}

impl PromptSendingOrchestrator {
    pub fn new(target: Arc<dyn PromptTarget>, memory: Arc<dyn MemoryInterface>) -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
            target,
            normalizer: PromptNormalizer::new(Arc::clone(&memory)),
            scoring: ScoringCoordinator::new(Vec::new(), Arc::clone(&memory)),
            memory,
            converters: Vec::new(),
            memory_labels: HashMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Build from the `[orchestrator]` config section
    pub fn from_config(
        config: &OrchestratorConfig,
        target: Arc<dyn PromptTarget>,
        memory: Arc<dyn MemoryInterface>,
    ) -> Self {
        Self::new(target, memory)
            .with_batch_size(config.batch_size)
            .with_memory_labels(config.memory_labels.clone())
    }

    pub fn with_converters(mut self, converters: Vec<Arc<dyn PromptConverter>>) -> Self {
        self.converters = converters;
        self
    }

    /// Replace the scorers; resets the already-scored set
    pub fn with_scorers(mut self, scorers: Vec<Arc<dyn Scorer>>) -> Self {
        self.scoring = ScoringCoordinator::new(scorers, Arc::clone(&self.memory));
        self
    }

    pub fn with_memory_labels(mut self, memory_labels: HashMap<String, String>) -> Self {
        self.memory_labels = memory_labels;
        self
    }

    /// Values below 1 are treated as 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn get_identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn target(&self) -> &Arc<dyn PromptTarget> {
        &self.target
    }

    pub fn memory(&self) -> &Arc<dyn MemoryInterface> {
        &self.memory
    }

    /// Send each prompt as the first turn of a new conversation
    pub async fn send_prompts_async<S: AsRef<str>>(
        &self,
        prompt_list: &[S],
        memory_labels: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RequestOutcome>, OrchestratorError> {
        let requests: Vec<NormalizerRequest> = prompt_list
            .iter()
            .map(|prompt| NormalizerRequest::from_text(prompt.as_ref(), self.converters.clone(), None))
            .collect();

        self.send_normalizer_requests_async(&requests, memory_labels)
            .await
    }

    /// Send caller-built requests as they are, with their own converters
    ///
    /// Every request is validated before anything is dispatched.
    pub async fn send_normalizer_requests_async(
        &self,
        prompt_request_list: &[NormalizerRequest],
        memory_labels: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RequestOutcome>, OrchestratorError> {
        for request in prompt_request_list {
            request.validate()?;
        }

        let labels = merge_labels(&self.memory_labels, memory_labels);
        info!(
            "{} sending {} request(s) to {}",
            self.identifier.type_name,
            prompt_request_list.len(),
            self.target.identifier().type_name
        );

        let outcomes = self
            .normalizer
            .send_prompt_batch_to_target_async(
                prompt_request_list,
                self.target.as_ref(),
                &labels,
                &self.identifier,
                self.batch_size,
            )
            .await;

        let responses: Vec<PromptRequestResponse> = outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok().cloned())
            .collect();
        self.scoring.score_responses_async(&responses).await?;

        Ok(outcomes)
    }

    /// Send one prompt, appending to `conversation_id` when given
    pub async fn send_prompt_async(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
    ) -> Result<PromptRequestResponse, OrchestratorError> {
        let request = NormalizerRequest::from_text(
            prompt,
            self.converters.clone(),
            conversation_id.map(str::to_string),
        );
        request.validate()?;

        debug!(
            "Sending single prompt on conversation {}",
            conversation_id.unwrap_or("<new>")
        );

        let response = self
            .normalizer
            .send_prompt_async(
                &request,
                self.target.as_ref(),
                &self.memory_labels,
                &self.identifier,
            )
            .await?;

        self.scoring
            .score_responses_async(std::slice::from_ref(&response))
            .await?;
        Ok(response)
    }

    /// Every piece this orchestrator sent or received
    pub async fn get_memory(&self) -> Result<Vec<PromptRequestPiece>, MemoryError> {
        self.memory
            .get_prompt_request_pieces_by_orchestrator(&self.identifier.id)
            .await
    }

    /// Every score attached to a piece this orchestrator sent or received
    pub async fn get_score_memory(&self) -> Result<Vec<Score>, MemoryError> {
        self.memory
            .get_scores_by_orchestrator_id(&self.identifier.id)
            .await
    }
}
