use sdk::{ConversionError, ConverterResult, Identifier, PromptConverter, PromptDataType};

/// Rotates ASCII letters by 13 places; everything else passes through
pub struct Rot13Converter {
    identifier: Identifier,
}

impl Rot13Converter {
    pub fn new() -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
        }
    }
}

impl Default for Rot13Converter {
    fn default() -> Self {
        Self::new()
    }
}

fn rotate(c: char) -> char {
    match c {
        'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
        'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
        _ => c,
    }
}

impl PromptConverter for Rot13Converter {
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
        Ok(ConverterResult::text(prompt.chars().map(rotate).collect::<String>()))
    }
}
