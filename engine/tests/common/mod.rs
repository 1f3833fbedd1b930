//! Mock collaborators shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sdk::{
    construct_response_from_request, Identifier, MemoryInterface, PromptDataType,
    PromptRequestResponse, PromptResponseError, PromptTarget, Score, ScoreType, Scorer,
    ScoringError, TargetError,
};
use std::sync::{Arc, Mutex};

use redline_engine::db::SqliteMemory;

/// Target that records every converted value it receives and replies with a canned text
///
/// Prompts containing `fail_on` are rejected with `TargetError::Unavailable`.
pub struct MockPromptTarget {
    identifier: Identifier,
    pub prompt_sent: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl MockPromptTarget {
    pub fn new() -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
            prompt_sent: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.prompt_sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptTarget for MockPromptTarget {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    async fn send_prompt_async(
        &self,
        request: &PromptRequestResponse,
    ) -> Result<PromptRequestResponse, TargetError> {
        let piece = &request.request_pieces[0];
        self.prompt_sent
            .lock()
            .unwrap()
            .push(piece.converted_value.clone());

        if let Some(marker) = &self.fail_on {
            if piece.converted_value.contains(marker.as_str()) {
                return Err(TargetError::Unavailable("mock failure".to_string()));
            }
        }

        Ok(construct_response_from_request(
            piece,
            &[format!("response to {}", piece.converted_value)],
            PromptDataType::Text,
            PromptResponseError::None,
        ))
    }
}

/// Shared, ordered record of `name:value` entries written by scorers
pub type ScoreLog = Arc<Mutex<Vec<String>>>;

/// Scorer that records every request/response it is handed
pub struct RecordingScorer {
    identifier: Identifier,
    pub calls: Mutex<Vec<PromptRequestResponse>>,
    log: Option<(String, ScoreLog)>,
}

impl RecordingScorer {
    pub fn new() -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
            calls: Mutex::new(Vec::new()),
            log: None,
        }
    }

    /// Also append `name:<scored value>` to `log` on every call
    pub fn logging_to(name: &str, log: &ScoreLog) -> Self {
        Self {
            log: Some((name.to_string(), Arc::clone(log))),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<PromptRequestResponse> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Scorer for RecordingScorer {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    async fn score_async(
        &self,
        request_response: &PromptRequestResponse,
    ) -> Result<Vec<Score>, ScoringError> {
        self.calls.lock().unwrap().push(request_response.clone());
        let piece = &request_response.request_pieces[0];
        if let Some((name, log)) = &self.log {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", name, piece.converted_value));
        }
        Ok(vec![Score::new(
            ScoreType::FloatScale,
            "1",
            "mock",
            self.identifier.clone(),
            piece.id,
        )?])
    }
}

/// Scorer that always fails
pub struct FailingScorer {
    identifier: Identifier,
}

impl FailingScorer {
    pub fn new() -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
        }
    }
}

#[async_trait]
impl Scorer for FailingScorer {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    async fn score_async(
        &self,
        _request_response: &PromptRequestResponse,
    ) -> Result<Vec<Score>, ScoringError> {
        Err(ScoringError::Failed("scorer exploded".to_string()))
    }
}

pub async fn memory() -> Arc<dyn MemoryInterface> {
    Arc::new(SqliteMemory::in_memory().await.unwrap())
}
