use base64::{engine::general_purpose, Engine as _};
use sdk::{ConversionError, ConverterResult, Identifier, PromptConverter, PromptDataType};

/// Encodes text as standard, padded base64
pub struct Base64Converter {
    identifier: Identifier,
}

impl Base64Converter {
    pub fn new() -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
        }
    }
}

impl Default for Base64Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptConverter for Base64Converter {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn input_supported(&self, input_type: PromptDataType) -> bool {
        input_type == PromptDataType::Text
    }

    fn convert(
        &self,
        prompt: &str,
        input_type: PromptDataType,
    ) -> Result<ConverterResult, ConversionError> {
        super::require_text(&self.identifier, input_type)?;
        Ok(ConverterResult::text(
            general_purpose::STANDARD.encode(prompt.as_bytes()),
        ))
    }
}
