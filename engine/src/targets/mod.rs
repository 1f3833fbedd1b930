//! Prompt targets shipped with the engine
//!
//! Any `sdk::PromptTarget` can be handed to an orchestrator; these are the
//! ones that talk to real endpoints.

pub mod openai;

pub use openai::OpenAIChatTarget;
