//! Converter Pipeline
//!
//! Applies an ordered list of `PromptConverter`s to a prompt payload. Stage N
//! receives the value and data type produced by stage N-1. An empty pipeline
//! is the identity transform.

use sdk::{ConversionError, ConverterResult, Identifier, PromptConverter, PromptDataType};
use std::sync::Arc;
use tracing::debug;

pub mod base64_converter;
pub mod rot13_converter;
pub mod search_replace_converter;
pub mod string_join_converter;

pub use base64_converter::Base64Converter;
pub use rot13_converter::Rot13Converter;
pub use search_replace_converter::SearchReplaceConverter;
pub use string_join_converter::StringJoinConverter;

/// Ordered sequence of converters applied left to right
#[derive(Clone, Default)]
pub struct ConverterPipeline {
    converters: Vec<Arc<dyn PromptConverter>>,
}

impl ConverterPipeline {
    pub fn new(converters: Vec<Arc<dyn PromptConverter>>) -> Self {
        Self { converters }
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Identifiers of every stage, in application order
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.converters
            .iter()
            .map(|c| c.identifier().clone())
            .collect()
    }

    /// Run every stage over `value`
    ///
    /// Fails on the first stage that does not accept the data type it receives.
    pub fn run(
        &self,
        value: &str,
        data_type: PromptDataType,
    ) -> Result<ConverterResult, ConversionError> {
        let mut current = ConverterResult::new(value, data_type);

        for converter in &self.converters {
            if !converter.input_supported(current.output_type) {
                return Err(ConversionError::UnsupportedInputType {
                    converter: converter.identifier().type_name.clone(),
                    input_type: current.output_type,
                });
            }

            current = converter.convert(&current.output_text, current.output_type)?;
            debug!(
                "Applied {} -> {}",
                converter.identifier().type_name,
                current.output_type
            );
        }

        Ok(current)
    }
}

/// Reject any input type other than text
pub(crate) fn require_text(
    identifier: &Identifier,
    input_type: PromptDataType,
) -> Result<(), ConversionError> {
    if input_type == PromptDataType::Text {
        Ok(())
    } else {
        Err(ConversionError::UnsupportedInputType {
            converter: identifier.type_name.clone(),
            input_type,
        })
    }
}
