use async_trait::async_trait;
use sdk::{
    Identifier, PromptDataType, PromptRequestResponse, Score, ScoreType, Scorer, ScoringError,
};

/// True/false scorer: does the response contain a substring?
pub struct SubStringScorer {
    identifier: Identifier,
    substring: String,
    category: String,
}

impl SubStringScorer {
    pub fn new(substring: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            identifier: Identifier::of::<Self>(),
            substring: substring.into(),
            category: category.into(),
        }
    }
}

#[async_trait]
impl Scorer for SubStringScorer {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    async fn score_async(
        &self,
        request_response: &PromptRequestResponse,
    ) -> Result<Vec<Score>, ScoringError> {
        request_response
            .request_pieces
            .iter()
            .map(|piece| {
                if piece.converted_value_data_type != PromptDataType::Text {
                    return Err(ScoringError::UnsupportedDataType(
                        piece.converted_value_data_type,
                    ));
                }

                let found = piece.converted_value.contains(&self.substring);
                let rationale = if found {
                    format!("Found '{}' in the response", self.substring)
                } else {
                    format!("'{}' not present in the response", self.substring)
                };

                Ok(Score::new(
                    ScoreType::TrueFalse,
                    found.to_string(),
                    self.category.clone(),
                    self.identifier.clone(),
                    piece.id,
                )?
                .with_rationale(rationale))
            })
            .collect()
    }
}
