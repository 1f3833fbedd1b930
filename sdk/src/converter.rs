//! Prompt converter trait
//!
//! A converter is a pure transform applied to a prompt payload before it is
//! dispatched. It receives the value together with its data type and returns a
//! new value and data type. Converters are chained by the engine's pipeline;
//! each stage consumes the previous stage's output.

use crate::errors::ConversionError;
use crate::identifier::Identifier;
use crate::types::PromptDataType;

/// Output of one conversion stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterResult {
    pub output_text: String,
    pub output_type: PromptDataType,
}

impl ConverterResult {
    pub fn new(output_text: impl Into<String>, output_type: PromptDataType) -> Self {
        Self {
            output_text: output_text.into(),
            output_type,
        }
    }

    pub fn text(output_text: impl Into<String>) -> Self {
        Self::new(output_text, PromptDataType::Text)
    }
}

/// Trait that all prompt converters must implement
///
/// Implementations must be deterministic and free of side effects.
pub trait PromptConverter: Send + Sync {
    /// Returns the identifier recorded on every piece this converter touched
    fn identifier(&self) -> &Identifier;

    /// Returns true if this converter accepts values of `input_type`
    fn input_supported(&self, input_type: PromptDataType) -> bool;

    /// Convert `prompt`, which has data type `input_type`
    fn convert(
        &self,
        prompt: &str,
        input_type: PromptDataType,
    ) -> Result<ConverterResult, ConversionError>;
}
