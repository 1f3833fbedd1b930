//! Caller-facing request descriptions
//!
//! A `NormalizerRequest` describes one multi-part user turn before it becomes
//! persisted `PromptRequestPiece`s. Each piece carries its own converter list.

use sdk::{PromptConverter, PromptDataType, ValidationError};
use std::path::Path;
use std::sync::Arc;

use crate::converters::ConverterPipeline;

/// One part of a user turn
#[derive(Clone)]
pub struct NormalizerRequestPiece {
    /// Text, or a reference such as a file path for `*_path` data types
    pub prompt_value: String,
    pub prompt_data_type: PromptDataType,

    /// Converters applied to this piece only
    pub request_converters: ConverterPipeline,
}

impl NormalizerRequestPiece {
    pub fn new(
        prompt_value: impl Into<String>,
        prompt_data_type: PromptDataType,
        request_converters: Vec<Arc<dyn PromptConverter>>,
    ) -> Self {
        Self {
            prompt_value: prompt_value.into(),
            prompt_data_type,
            request_converters: ConverterPipeline::new(request_converters),
        }
    }

    pub fn text(prompt_value: impl Into<String>) -> Self {
        Self::new(prompt_value, PromptDataType::Text, Vec::new())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt_value.is_empty() {
            return Err(ValidationError::EmptyPromptValue);
        }

        if self.prompt_data_type.is_path() && !Path::new(&self.prompt_value).is_file() {
            return Err(ValidationError::MissingFile {
                data_type: self.prompt_data_type,
                path: self.prompt_value.clone(),
            });
        }

        Ok(())
    }
}

/// One user turn, possibly multi-modal
#[derive(Clone)]
pub struct NormalizerRequest {
    pub request_pieces: Vec<NormalizerRequestPiece>,

    /// Conversation to append to; a fresh one is started when `None`
    pub conversation_id: Option<String>,
}

impl NormalizerRequest {
    pub fn new(request_pieces: Vec<NormalizerRequestPiece>) -> Self {
        Self {
            request_pieces,
            conversation_id: None,
        }
    }

    /// Single text piece with the given converters
    pub fn from_text(
        prompt: impl Into<String>,
        converters: Vec<Arc<dyn PromptConverter>>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            request_pieces: vec![NormalizerRequestPiece::new(
                prompt,
                PromptDataType::Text,
                converters,
            )],
            conversation_id,
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_pieces.is_empty() {
            return Err(ValidationError::EmptyRequest);
        }
        self.request_pieces
            .iter()
            .try_for_each(NormalizerRequestPiece::validate)
    }
}
