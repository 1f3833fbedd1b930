//! Orchestrators
//!
//! An orchestrator owns no durable state. It holds its identifier, its
//! collaborators and its configuration; every record it produces lives in the
//! memory store, tagged with the orchestrator's id.

use std::collections::HashMap;

pub mod prompt_sending;

pub use prompt_sending::PromptSendingOrchestrator;

/// Combine instance labels with call labels; the call value wins on a shared key
pub fn merge_labels(
    instance: &HashMap<String, String>,
    call: Option<&HashMap<String, String>>,
) -> HashMap<String, String> {
    let mut merged = instance.clone();
    if let Some(call) = call {
        merged.extend(call.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}
