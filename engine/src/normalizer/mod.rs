//! Request Normalizer
//!
//! Turns caller-facing `NormalizerRequest`s into persisted
//! `PromptRequestResponse`s: every piece runs through its own converter
//! pipeline, the turn is dispatched to the target, and the request/response
//! pair is written to memory as soon as it completes.
//!
//! # Batching
//!
//! A batch is split into chunks of `batch_size` requests. The requests of a
//! chunk run as concurrent futures joined with `join_all` on the caller's task;
//! chunks run one after another. Results come back in input order whatever the
//! completion order, one `RequestOutcome` per request.

use futures::future::join_all;
use sdk::{
    construct_response_from_request, ChatMessageRole, ConversionError, Identifier,
    MemoryError, MemoryInterface, PromptDataType, PromptRequestPiece, PromptRequestResponse,
    PromptResponseError, PromptTarget, RequestError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod request;

pub use request::{NormalizerRequest, NormalizerRequestPiece};

/// Outcome of one request in a batch
pub type RequestOutcome = Result<PromptRequestResponse, RequestError>;

/// Builds, dispatches and records requests
pub struct PromptNormalizer {
    memory: Arc<dyn MemoryInterface>,
}

impl PromptNormalizer {
    pub fn new(memory: Arc<dyn MemoryInterface>) -> Self {
        Self { memory }
    }

    /// Send one request and record it
    ///
    /// A malformed request or a conversion failure returns before anything is
    /// dispatched or written. A dispatch failure still records the request,
    /// followed by an assistant piece flagged `processing` that carries the
    /// error text. The request and its response are written together.
    pub async fn send_prompt_async(
        &self,
        request: &NormalizerRequest,
        target: &dyn PromptTarget,
        labels: &HashMap<String, String>,
        orchestrator_identifier: &Identifier,
    ) -> RequestOutcome {
        request.validate()?;
        let prompt_request = build_request(request, target, labels, orchestrator_identifier)?;
        let conversation_id = prompt_request
            .conversation_id()
            .unwrap_or_default()
            .to_string();

        debug!(
            "Dispatching {} piece(s) on conversation {}",
            prompt_request.request_pieces.len(),
            conversation_id
        );

        match target.send_prompt_async(&prompt_request).await {
            Ok(mut response) => {
                stamp_response(&mut response, labels, orchestrator_identifier);
                let mut turns = [prompt_request, response];
                self.memory.add_turns_to_memory(&mut turns).await?;
                let [_, response] = turns;
                Ok(response)
            }
            Err(e) => {
                warn!("Dispatch failed on conversation {}: {}", conversation_id, e);
                if let Err(memory_error) = self.record_failure(prompt_request, &e.to_string()).await
                {
                    warn!(
                        "Could not record failed request on conversation {}: {}",
                        conversation_id, memory_error
                    );
                }
                Err(RequestError::Dispatch(e))
            }
        }
    }

    /// Record a request whose dispatch failed, followed by its error marker
    async fn record_failure(
        &self,
        prompt_request: PromptRequestResponse,
        error_text: &str,
    ) -> Result<(), MemoryError> {
        let Some(first) = prompt_request.request_pieces.first() else {
            return Ok(());
        };
        let error_response = construct_response_from_request(
            first,
            &[error_text.to_string()],
            PromptDataType::Error,
            PromptResponseError::Processing,
        );
        self.memory
            .add_turns_to_memory(&mut [prompt_request, error_response])
            .await
    }

    /// Send many requests to `target` concurrently
    ///
    /// Returns exactly one outcome per request, in input order. One request
    /// failing does not affect the others.
    pub async fn send_prompt_batch_to_target_async(
        &self,
        requests: &[NormalizerRequest],
        target: &dyn PromptTarget,
        labels: &HashMap<String, String>,
        orchestrator_identifier: &Identifier,
        batch_size: usize,
    ) -> Vec<RequestOutcome> {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(requests.len());

        for chunk in requests.chunks(batch_size.max(1)) {
            let chunk_outcomes = join_all(chunk.iter().map(|request| {
                self.send_prompt_async(request, target, labels, orchestrator_identifier)
            }))
            .await;
            outcomes.extend(chunk_outcomes);
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(
            "Sent {} request(s) to {} in {:.1}s ({} failed)",
            outcomes.len(),
            target.identifier().type_name,
            start.elapsed().as_secs_f64(),
            failed
        );

        outcomes
    }
}

/// Build the persisted form of a request, running every piece's converters
fn build_request(
    request: &NormalizerRequest,
    target: &dyn PromptTarget,
    labels: &HashMap<String, String>,
    orchestrator_identifier: &Identifier,
) -> Result<PromptRequestResponse, ConversionError> {
    let conversation_id = request
        .conversation_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let pieces = request
        .request_pieces
        .iter()
        .map(|piece| {
            let converted = piece
                .request_converters
                .run(&piece.prompt_value, piece.prompt_data_type)?;

            Ok(PromptRequestPiece::new(
                ChatMessageRole::User,
                piece.prompt_value.clone(),
                conversation_id.clone(),
            )
            .with_original(piece.prompt_value.clone(), piece.prompt_data_type)
            .with_converted(converted.output_text, converted.output_type)
            .with_converter_identifiers(piece.request_converters.identifiers())
            .with_labels(labels.clone())
            .with_orchestrator_identifier(orchestrator_identifier.clone())
            .with_target_identifier(target.identifier().clone()))
        })
        .collect::<Result<Vec<_>, ConversionError>>()?;

    Ok(PromptRequestResponse::new(pieces))
}

/// Make sure every response piece is attributed to this orchestrator and carries the call labels
///
/// Call labels overwrite any label the target set under the same key.
fn stamp_response(
    response: &mut PromptRequestResponse,
    labels: &HashMap<String, String>,
    orchestrator_identifier: &Identifier,
) {
    for piece in &mut response.request_pieces {
        piece
            .orchestrator_identifier
            .get_or_insert_with(|| orchestrator_identifier.clone());
        piece
            .labels
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::{Base64Converter, StringJoinConverter};
    use crate::db::SqliteMemory;
    use async_trait::async_trait;
    use sdk::{TargetError, ValidationError};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echoes the converted value back; values starting with "fail" are rejected
    struct EchoTarget {
        identifier: Identifier,
        sent: Mutex<Vec<String>>,
    }

    impl EchoTarget {
        fn new() -> Self {
            Self {
                identifier: Identifier::of::<Self>(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PromptTarget for EchoTarget {
        fn identifier(&self) -> &Identifier {
            &self.identifier
        }

        async fn send_prompt_async(
            &self,
            request: &PromptRequestResponse,
        ) -> Result<PromptRequestResponse, TargetError> {
            let piece = &request.request_pieces[0];
            // Shorter prompts take longer, so completion order is reversed
            let delay = 40u64.saturating_sub(piece.converted_value.len() as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.sent.lock().unwrap().push(piece.converted_value.clone());
            if piece.converted_value.starts_with("fail") {
                return Err(TargetError::Unavailable("scripted failure".to_string()));
            }
            Ok(construct_response_from_request(
                piece,
                &[format!("re: {}", piece.converted_value)],
                PromptDataType::Text,
                PromptResponseError::None,
            ))
        }
    }

    fn orchestrator_id() -> Identifier {
        Identifier::new("orch-1", "PromptSendingOrchestrator", "tests")
    }

    async fn setup() -> (PromptNormalizer, Arc<SqliteMemory>, EchoTarget) {
        let memory = Arc::new(SqliteMemory::in_memory().await.unwrap());
        let memory_dyn: Arc<dyn MemoryInterface> = Arc::<SqliteMemory>::clone(&memory);
        (PromptNormalizer::new(memory_dyn), memory, EchoTarget::new())
    }

    #[tokio::test]
    async fn test_send_prompt_persists_request_and_response() {
        let (normalizer, memory, target) = setup().await;
        let request = NormalizerRequest::from_text(
            "Hello",
            vec![Arc::new(Base64Converter::new())],
            Some("conv-1".to_string()),
        );

        let response = normalizer
            .send_prompt_async(&request, &target, &HashMap::new(), &orchestrator_id())
            .await
            .unwrap();

        assert_eq!(response.request_pieces[0].converted_value, "re: SGVsbG8=");

        let conversation = memory.get_conversation("conv-1").await.unwrap();
        assert_eq!(conversation.len(), 2);
        let sent = &conversation[0].request_pieces[0];
        assert_eq!(sent.original_value, "Hello");
        assert_eq!(sent.converted_value, "SGVsbG8=");
        assert_eq!(sent.converter_identifiers[0].type_name, "Base64Converter");
        assert_eq!(sent.sequence, 0);
        assert_eq!(conversation[1].request_pieces[0].sequence, 1);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let (normalizer, _memory, target) = setup().await;
        let prompts = ["a", "bbbb", "cccccccc"];
        let requests: Vec<NormalizerRequest> = prompts
            .iter()
            .map(|p| NormalizerRequest::from_text(*p, vec![], None))
            .collect();

        let outcomes = normalizer
            .send_prompt_batch_to_target_async(
                &requests,
                &target,
                &HashMap::new(),
                &orchestrator_id(),
                10,
            )
            .await;

        let replies: Vec<String> = outcomes
            .into_iter()
            .map(|o| o.unwrap().request_pieces[0].converted_value.clone())
            .collect();
        assert_eq!(replies, vec!["re: a", "re: bbbb", "re: cccccccc"]);

        // Completion order was the reverse of the input order
        let sent = target.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["cccccccc", "bbbb", "a"]);
    }

    #[tokio::test]
    async fn test_batch_failure_is_isolated_and_recorded() {
        let (normalizer, memory, target) = setup().await;
        let requests = vec![
            NormalizerRequest::from_text("ok-1", vec![], Some("c-ok".to_string())),
            NormalizerRequest::from_text("fail-now", vec![], Some("c-fail".to_string())),
            NormalizerRequest::from_text("ok-2", vec![], None),
        ];

        let outcomes = normalizer
            .send_prompt_batch_to_target_async(
                &requests,
                &target,
                &HashMap::new(),
                &orchestrator_id(),
                2,
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1],
            Err(RequestError::Dispatch(TargetError::Unavailable(_)))
        ));
        assert!(outcomes[2].is_ok());

        let failed = memory.get_conversation("c-fail").await.unwrap();
        assert_eq!(failed.len(), 2);
        let error_piece = &failed[1].request_pieces[0];
        assert_eq!(error_piece.response_error, PromptResponseError::Processing);
        assert_eq!(error_piece.converted_value_data_type, PromptDataType::Error);
    }

    #[tokio::test]
    async fn test_conversion_failure_skips_dispatch() {
        let (normalizer, memory, target) = setup().await;
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"test").unwrap();

        let image = NormalizerRequest::new(vec![NormalizerRequestPiece::new(
            file.path().to_string_lossy(),
            PromptDataType::ImagePath,
            vec![Arc::new(Base64Converter::new())],
        )])
        .with_conversation_id("c-image");
        let text = NormalizerRequest::from_text(
            "hi",
            vec![Arc::new(StringJoinConverter::new("-"))],
            None,
        );

        let outcomes = normalizer
            .send_prompt_batch_to_target_async(
                &[image, text],
                &target,
                &HashMap::new(),
                &orchestrator_id(),
                10,
            )
            .await;

        assert!(matches!(outcomes[0], Err(RequestError::Conversion(_))));
        assert_eq!(
            outcomes[1].as_ref().unwrap().request_pieces[0].converted_value,
            "re: h-i"
        );
        assert_eq!(target.sent.lock().unwrap().clone(), vec!["h-i"]);
        assert!(memory.get_conversation("c-image").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_labels_stamped_on_both_sides() {
        let (normalizer, memory, target) = setup().await;
        let mut labels = HashMap::new();
        labels.insert("op_name".to_string(), "op1".to_string());

        normalizer
            .send_prompt_async(
                &NormalizerRequest::from_text("hello", vec![], None),
                &target,
                &labels,
                &orchestrator_id(),
            )
            .await
            .unwrap();

        let pieces = memory
            .get_prompt_request_pieces_by_orchestrator("orch-1")
            .await
            .unwrap();
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.labels == labels));
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_before_dispatch() {
        let (normalizer, _memory, target) = setup().await;

        let outcome = normalizer
            .send_prompt_async(
                &NormalizerRequest::new(vec![]),
                &target,
                &HashMap::new(),
                &orchestrator_id(),
            )
            .await;

        assert_eq!(
            outcome.unwrap_err(),
            RequestError::Validation(ValidationError::EmptyRequest)
        );
        assert!(target.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_on_one_conversation_keeps_pairs_adjacent() {
        let (normalizer, memory, target) = setup().await;
        // Equal lengths, so both replies arrive together and their writes race
        let requests = vec![
            NormalizerRequest::from_text("aaaa", vec![], Some("c-shared".to_string())),
            NormalizerRequest::from_text("bbbb", vec![], Some("c-shared".to_string())),
        ];

        let outcomes = normalizer
            .send_prompt_batch_to_target_async(
                &requests,
                &target,
                &HashMap::new(),
                &orchestrator_id(),
                10,
            )
            .await;
        assert!(outcomes.iter().all(|o| o.is_ok()));

        let conversation = memory.get_conversation("c-shared").await.unwrap();
        assert_eq!(conversation.len(), 4);
        for (n, pair) in conversation.chunks(2).enumerate() {
            let sent = &pair[0].request_pieces[0];
            let reply = &pair[1].request_pieces[0];
            assert_eq!(sent.role, ChatMessageRole::User);
            assert_eq!(reply.role, ChatMessageRole::Assistant);
            assert_eq!(reply.converted_value, format!("re: {}", sent.converted_value));
            assert_eq!(sent.sequence, 2 * n as i64);
            assert_eq!(reply.sequence, 2 * n as i64 + 1);
        }
    }

    #[test]
    fn test_call_labels_overwrite_target_labels() {
        let mut target_labels = HashMap::new();
        target_labels.insert("op_name".to_string(), "from-target".to_string());
        target_labels.insert("region".to_string(), "eu".to_string());
        let mut response = PromptRequestPiece::new(ChatMessageRole::Assistant, "hi", "c-1")
            .with_labels(target_labels)
            .to_prompt_request_response();

        let mut labels = HashMap::new();
        labels.insert("op_name".to_string(), "op1".to_string());
        stamp_response(&mut response, &labels, &orchestrator_id());

        let piece = &response.request_pieces[0];
        assert_eq!(piece.labels["op_name"], "op1");
        assert_eq!(piece.labels["region"], "eu");
        assert_eq!(piece.orchestrator_identifier.as_ref().unwrap().id, "orch-1");
    }
}
