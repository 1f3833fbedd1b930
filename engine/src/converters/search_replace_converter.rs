use regex::Regex;
use sdk::{ConversionError, ConverterResult, Identifier, PromptConverter, PromptDataType};

/// Replaces every match of a regular expression
pub struct SearchReplaceConverter {
    identifier: Identifier,
    pattern: Regex,
    replace: String,
}

impl SearchReplaceConverter {
    /// Compile `pattern`; an invalid pattern is rejected here, not at conversion time
    pub fn new(pattern: &str, replace: impl Into<String>) -> Result<Self, ConversionError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ConversionError::InvalidInput(format!("invalid pattern: {}", e)))?;
        Ok(Self {
            identifier: Identifier::of::<Self>(),
            pattern,
            replace: replace.into(),
        })
    }
}

impl PromptConverter for SearchReplaceConverter {
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
        let replaced = self.pattern.replace_all(prompt, self.replace.as_str());
        Ok(ConverterResult::text(replaced.into_owned()))
    }
}
