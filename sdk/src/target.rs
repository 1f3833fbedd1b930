//! Prompt target trait
//!
//! A target is the system under test. The orchestration core only depends on
//! this contract: a request goes in, a correlated response (or a per-request
//! error) comes out.

use async_trait::async_trait;
use futures::future::join_all;

use crate::errors::TargetError;
use crate::identifier::Identifier;
use crate::types::PromptRequestResponse;

/// Trait that all prompt targets must implement
#[async_trait]
pub trait PromptTarget: Send + Sync {
    /// Returns the identifier recorded on every piece sent to this target
    fn identifier(&self) -> &Identifier;

    /// Send one request and return its response
    ///
    /// The response pieces must carry the request's conversation id.
    async fn send_prompt_async(
        &self,
        request: &PromptRequestResponse,
    ) -> Result<PromptRequestResponse, TargetError>;

    /// Send a batch of requests concurrently
    ///
    /// Returns exactly one result per request, in request order. A failure
    /// only affects its own slot.
    async fn send_prompts_async(
        &self,
        requests: &[PromptRequestResponse],
    ) -> Vec<Result<PromptRequestResponse, TargetError>> {
        join_all(requests.iter().map(|request| self.send_prompt_async(request))).await
    }
}
