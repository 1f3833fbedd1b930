//! Conversation data model
//!
//! A `PromptRequestPiece` is one atomic unit of a conversation turn. A
//! `PromptRequestResponse` groups the pieces of a single turn (for example a
//! text piece plus an image piece, or the reply to them).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::identifier::Identifier;

/// Kind of payload carried by a piece
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PromptDataType {
    Text,
    ImagePath,
    AudioPath,
    Url,
    Error,
}

impl PromptDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptDataType::Text => "text",
            PromptDataType::ImagePath => "image_path",
            PromptDataType::AudioPath => "audio_path",
            PromptDataType::Url => "url",
            PromptDataType::Error => "error",
        }
    }

    /// Whether the value is a reference to a file on disk
    pub fn is_path(&self) -> bool {
        matches!(self, PromptDataType::ImagePath | PromptDataType::AudioPath)
    }
}

impl fmt::Display for PromptDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PromptDataType::Text),
            "image_path" => Ok(PromptDataType::ImagePath),
            "audio_path" => Ok(PromptDataType::AudioPath),
            "url" => Ok(PromptDataType::Url),
            "error" => Ok(PromptDataType::Error),
            other => Err(format!("unknown prompt data type: {}", other)),
        }
    }
}

/// Role of the piece author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageRole {
    User,
    Assistant,
    System,
}

impl ChatMessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMessageRole::User => "user",
            ChatMessageRole::Assistant => "assistant",
            ChatMessageRole::System => "system",
        }
    }
}

impl fmt::Display for ChatMessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatMessageRole::User),
            "assistant" => Ok(ChatMessageRole::Assistant),
            "system" => Ok(ChatMessageRole::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Error state of a response piece
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptResponseError {
    #[default]
    None,
    Blocked,
    Processing,
    Empty,
    Unknown,
}

impl PromptResponseError {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptResponseError::None => "none",
            PromptResponseError::Blocked => "blocked",
            PromptResponseError::Processing => "processing",
            PromptResponseError::Empty => "empty",
            PromptResponseError::Unknown => "unknown",
        }
    }
}

impl FromStr for PromptResponseError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PromptResponseError::None),
            "blocked" => Ok(PromptResponseError::Blocked),
            "processing" => Ok(PromptResponseError::Processing),
            "empty" => Ok(PromptResponseError::Empty),
            "unknown" => Ok(PromptResponseError::Unknown),
            other => Err(format!("unknown response error: {}", other)),
        }
    }
}

/// One atomic unit of a conversation turn
///
/// Pieces are never mutated once persisted. Scores reference them by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptRequestPiece {
    pub id: Uuid,
    pub role: ChatMessageRole,
    pub conversation_id: String,

    /// Position of the turn inside its conversation, assigned by the memory store
    pub sequence: i64,
    pub timestamp: DateTime<Utc>,
    pub labels: HashMap<String, String>,

    /// Converters applied to produce `converted_value`, in order
    pub converter_identifiers: Vec<Identifier>,
    pub prompt_target_identifier: Option<Identifier>,
    pub orchestrator_identifier: Option<Identifier>,

    pub original_value_data_type: PromptDataType,
    pub original_value: String,
    pub original_value_sha256: String,

    pub converted_value_data_type: PromptDataType,
    pub converted_value: String,
    pub converted_value_sha256: String,

    pub response_error: PromptResponseError,
}

impl PromptRequestPiece {
    /// Create a text piece whose converted value equals its original value
    pub fn new(
        role: ChatMessageRole,
        original_value: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        let original_value = original_value.into();
        let sha = sha256_hex(&original_value);
        Self {
            id: Uuid::new_v4(),
            role,
            conversation_id: conversation_id.into(),
            sequence: 0,
            timestamp: Utc::now(),
            labels: HashMap::new(),
            converter_identifiers: Vec::new(),
            prompt_target_identifier: None,
            orchestrator_identifier: None,
            original_value_data_type: PromptDataType::Text,
            converted_value: original_value.clone(),
            converted_value_sha256: sha.clone(),
            original_value,
            original_value_sha256: sha,
            converted_value_data_type: PromptDataType::Text,
            response_error: PromptResponseError::None,
        }
    }

    pub fn with_orchestrator_identifier(mut self, identifier: Identifier) -> Self {
        self.orchestrator_identifier = Some(identifier);
        self
    }

    pub fn with_target_identifier(mut self, identifier: Identifier) -> Self {
        self.prompt_target_identifier = Some(identifier);
        self
    }

    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_original(mut self, value: impl Into<String>, data_type: PromptDataType) -> Self {
        self.original_value = value.into();
        self.original_value_sha256 = sha256_hex(&self.original_value);
        self.original_value_data_type = data_type;
        self
    }

    pub fn with_converted(mut self, value: impl Into<String>, data_type: PromptDataType) -> Self {
        self.converted_value = value.into();
        self.converted_value_sha256 = sha256_hex(&self.converted_value);
        self.converted_value_data_type = data_type;
        self
    }

    pub fn with_converter_identifiers(mut self, identifiers: Vec<Identifier>) -> Self {
        self.converter_identifiers = identifiers;
        self
    }

    pub fn with_response_error(mut self, error: PromptResponseError) -> Self {
        self.response_error = error;
        self
    }

    pub fn has_error(&self) -> bool {
        self.response_error != PromptResponseError::None
    }

    /// Wrap this piece alone into a `PromptRequestResponse`
    pub fn to_prompt_request_response(&self) -> PromptRequestResponse {
        PromptRequestResponse::new(vec![self.clone()])
    }
}

/// The pieces of a single logical exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptRequestResponse {
    pub request_pieces: Vec<PromptRequestPiece>,
}

impl PromptRequestResponse {
    pub fn new(request_pieces: Vec<PromptRequestPiece>) -> Self {
        Self { request_pieces }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.request_pieces
            .first()
            .map(|piece| piece.conversation_id.as_str())
    }

    /// Assign one sequence number to every piece of the turn
    pub fn set_sequence(&mut self, sequence: i64) {
        for piece in &mut self.request_pieces {
            piece.sequence = sequence;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.request_pieces.is_empty()
    }
}

/// Build the assistant reply to `request`, one piece per response text
///
/// The reply inherits conversation id, labels and provenance from the request.
pub fn construct_response_from_request(
    request: &PromptRequestPiece,
    response_texts: &[String],
    data_type: PromptDataType,
    error: PromptResponseError,
) -> PromptRequestResponse {
    let pieces = response_texts
        .iter()
        .map(|text| {
            let mut piece = PromptRequestPiece::new(
                ChatMessageRole::Assistant,
                text.clone(),
                request.conversation_id.clone(),
            )
            .with_original(text.clone(), data_type)
            .with_converted(text.clone(), data_type)
            .with_labels(request.labels.clone())
            .with_response_error(error);
            piece.orchestrator_identifier = request.orchestrator_identifier.clone();
            piece.prompt_target_identifier = request.prompt_target_identifier.clone();
            piece
        })
        .collect();

    PromptRequestResponse::new(pieces)
}

/// Hex-encoded SHA-256 of a text value
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
