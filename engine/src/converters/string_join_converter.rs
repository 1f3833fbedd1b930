use sdk::{ConversionError, ConverterResult, Identifier, PromptConverter, PromptDataType};

/// Joins the characters of the prompt with a separator
///
/// `"abc"` joined with `"_"` becomes `"a_b_c"`.
pub struct StringJoinConverter {
    identifier: Identifier,
    join_value: String,
}

impl StringJoinConverter {
    pub fn new(join_value: impl Into<String>) -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
            join_value: join_value.into(),
        }
    }
}

impl Default for StringJoinConverter {
    fn default() -> Self {
        Self::new("-")
    }
}

impl PromptConverter for StringJoinConverter {
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

        let joined = prompt
            .chars()
            .map(String::from)
            .collect::<Vec<String>>()
            .join(&self.join_value);

        Ok(ConverterResult::text(joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_characters() {
        let converter = StringJoinConverter::new("_");
        let result = converter.convert("SGVsbG8=", PromptDataType::Text).unwrap();
        assert_eq!(result.output_text, "S_G_V_s_b_G_8_=");
    }

    #[test]
    fn test_join_empty_and_single() {
        let converter = StringJoinConverter::default();
        assert_eq!(converter.convert("", PromptDataType::Text).unwrap().output_text, "");
        assert_eq!(converter.convert("x", PromptDataType::Text).unwrap().output_text, "x");
    }

    #[test]
    fn test_join_multibyte() {
        let converter = StringJoinConverter::new(" ");
        let result = converter.convert("日本", PromptDataType::Text).unwrap();
        assert_eq!(result.output_text, "日 本");
    }
}
