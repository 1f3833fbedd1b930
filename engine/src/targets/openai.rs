//! OpenAI-compatible chat target
//!
//! Sends the conversation so far plus the new user turn to
//! `{base_url}/chat/completions` and records the first choice as the reply.

use async_trait::async_trait;
use sdk::{
    construct_response_from_request, ChatMessageRole, Identifier, MemoryInterface,
    PromptDataType, PromptRequestPiece, PromptRequestResponse, PromptResponseError,
    PromptTarget, TargetError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::TargetConfig;

pub struct OpenAIChatTarget {
    identifier: Identifier,
    config: TargetConfig,
    api_key: String,
    memory: Arc<dyn MemoryInterface>,
    client: reqwest::Client,
}

impl OpenAIChatTarget {
    pub fn new(
        config: TargetConfig,
        api_key: impl Into<String>,
        memory: Arc<dyn MemoryInterface>,
    ) -> Result<Self, TargetError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TargetError::Unavailable(e.to_string()))?;

        Ok(Self {
            identifier: Identifier::of::<Self>(),
            config,
            api_key: api_key.into(),
            memory,
            client,
        })
    }

    /// Build the target with the API key read from `config.api_key_env`
    pub fn from_env(
        config: TargetConfig,
        memory: Arc<dyn MemoryInterface>,
    ) -> Result<Self, TargetError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            TargetError::AuthenticationFailed(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key, memory)
    }

    /// Chat messages for the stored history of the conversation plus `piece`
    async fn build_messages(&self, piece: &PromptRequestPiece) -> Result<Vec<Value>, TargetError> {
        let history = self
            .memory
            .get_conversation(&piece.conversation_id)
            .await
            .map_err(|e| TargetError::Unavailable(format!("conversation history: {}", e)))?;

        let mut messages: Vec<Value> = history
            .iter()
            .flat_map(|turn| turn.request_pieces.iter())
            .filter(|p| !p.has_error() && p.converted_value_data_type == PromptDataType::Text)
            .map(chat_message)
            .collect();
        messages.push(chat_message(piece));
        Ok(messages)
    }
}

fn chat_message(piece: &PromptRequestPiece) -> Value {
    json!({
        "role": piece.role.as_str(),
        "content": piece.converted_value,
    })
}

fn validate_request(request: &PromptRequestResponse) -> Result<&PromptRequestPiece, TargetError> {
    let [piece] = request.request_pieces.as_slice() else {
        return Err(TargetError::InvalidRequest(format!(
            "expected exactly one piece, got {}",
            request.request_pieces.len()
        )));
    };
    if piece.converted_value_data_type != PromptDataType::Text {
        return Err(TargetError::InvalidRequest(format!(
            "unsupported data type {}",
            piece.converted_value_data_type
        )));
    }
    if piece.role != ChatMessageRole::User {
        return Err(TargetError::InvalidRequest(format!(
            "expected a user piece, got {}",
            piece.role
        )));
    }
    Ok(piece)
}

/// Map a non-success response onto the target error taxonomy
fn status_error(status: reqwest::StatusCode, body: String) -> TargetError {
    match status.as_u16() {
        401 | 403 => TargetError::AuthenticationFailed(body),
        429 => TargetError::RateLimited,
        400 if is_content_filter(&body) => TargetError::Blocked(body),
        400 => TargetError::InvalidRequest(body),
        _ => TargetError::Unavailable(format!("HTTP {}: {}", status, body)),
    }
}

fn is_content_filter(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("code"))
                .and_then(|c| c.as_str())
                .map(|code| code == "content_filter")
        })
        .unwrap_or(false)
}

fn transport_error(e: reqwest::Error) -> TargetError {
    if e.is_timeout() {
        TargetError::Timeout
    } else {
        TargetError::Network(e.to_string())
    }
}

#[async_trait]
impl PromptTarget for OpenAIChatTarget {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    async fn send_prompt_async(
        &self,
        request: &PromptRequestResponse,
    ) -> Result<PromptRequestResponse, TargetError> {
        let piece = validate_request(request)?;
        let messages = self.build_messages(piece).await?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.config.model,
            "messages": messages,
        });

        debug!(
            "POST {} with {} message(s) for conversation {}",
            url,
            messages.len(),
            piece.conversation_id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| TargetError::Parse(e.to_string()))?;

        let choice = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| TargetError::Parse("No choices in response".to_string()))?;

        if choice.get("finish_reason").and_then(|r| r.as_str()) == Some("content_filter") {
            return Ok(construct_response_from_request(
                piece,
                &[choice.to_string()],
                PromptDataType::Error,
                PromptResponseError::Blocked,
            ));
        }

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| TargetError::Parse("No message content in choice".to_string()))?;

        let error = if content.is_empty() {
            PromptResponseError::Empty
        } else {
            PromptResponseError::None
        };

        Ok(construct_response_from_request(
            piece,
            &[content.to_string()],
            PromptDataType::Text,
            error,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let code = |c: u16| reqwest::StatusCode::from_u16(c).unwrap();

        assert!(matches!(
            status_error(code(401), String::new()),
            TargetError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(code(403), String::new()),
            TargetError::AuthenticationFailed(_)
        ));
        assert_eq!(status_error(code(429), String::new()), TargetError::RateLimited);
        assert!(matches!(
            status_error(code(503), "down".to_string()),
            TargetError::Unavailable(_)
        ));
    }

    #[test]
    fn test_content_filter_detection() {
        let filtered = r#"{"error": {"code": "content_filter", "message": "no"}}"#;
        let other = r#"{"error": {"code": "context_length_exceeded"}}"#;
        let code = reqwest::StatusCode::BAD_REQUEST;

        assert!(matches!(
            status_error(code, filtered.to_string()),
            TargetError::Blocked(_)
        ));
        assert!(matches!(
            status_error(code, other.to_string()),
            TargetError::InvalidRequest(_)
        ));
        assert!(!is_content_filter("not json"));
    }

    #[test]
    fn test_multi_piece_request_rejected() {
        let a = PromptRequestPiece::new(ChatMessageRole::User, "a", "c-1");
        let b = PromptRequestPiece::new(ChatMessageRole::User, "b", "c-1");
        let request = PromptRequestResponse::new(vec![a, b]);

        assert!(matches!(
            validate_request(&request),
            Err(TargetError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_image_request_rejected() {
        let piece = PromptRequestPiece::new(ChatMessageRole::User, "/tmp/a.png", "c-1")
            .with_converted("/tmp/a.png", PromptDataType::ImagePath);

        assert!(matches!(
            validate_request(&piece.to_prompt_request_response()),
            Err(TargetError::InvalidRequest(_))
        ));
    }
}
