//! Score records produced by scorers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ScoringError;
use crate::identifier::Identifier;

/// How `score_value` is to be read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    TrueFalse,
    FloatScale,
}

impl ScoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::TrueFalse => "true_false",
            ScoreType::FloatScale => "float_scale",
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true_false" => Ok(ScoreType::TrueFalse),
            "float_scale" => Ok(ScoreType::FloatScale),
            other => Err(format!("unknown score type: {}", other)),
        }
    }
}

/// Parsed score value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreValue {
    Bool(bool),
    Float(f64),
}

/// Result of evaluating one response piece
///
/// `prompt_request_response_id` is a lookup-only back-reference to the scored
/// piece. A score never owns or mutates the piece.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub id: Uuid,
    pub score_type: ScoreType,
    pub score_value: String,
    pub score_value_description: Option<String>,
    pub score_category: String,
    pub score_rationale: Option<String>,
    pub score_metadata: Option<String>,
    pub scorer_class_identifier: Identifier,
    pub prompt_request_response_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl Score {
    /// Create a score, rejecting values that do not match `score_type`
    pub fn new(
        score_type: ScoreType,
        score_value: impl Into<String>,
        score_category: impl Into<String>,
        scorer_class_identifier: Identifier,
        prompt_request_response_id: Uuid,
    ) -> Result<Self, ScoringError> {
        let score = Self {
            id: Uuid::new_v4(),
            score_type,
            score_value: score_value.into(),
            score_value_description: None,
            score_category: score_category.into(),
            score_rationale: None,
            score_metadata: None,
            scorer_class_identifier,
            prompt_request_response_id,
            timestamp: Utc::now(),
        };
        score.value()?;
        Ok(score)
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.score_rationale = Some(rationale.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.score_value_description = Some(description.into());
        self
    }

    /// Parse `score_value` according to `score_type`
    pub fn value(&self) -> Result<ScoreValue, ScoringError> {
        let invalid = || ScoringError::InvalidScoreValue {
            value: self.score_value.clone(),
            score_type: self.score_type.to_string(),
        };

        match self.score_type {
            ScoreType::TrueFalse => match self.score_value.to_lowercase().as_str() {
                "true" => Ok(ScoreValue::Bool(true)),
                "false" => Ok(ScoreValue::Bool(false)),
                _ => Err(invalid()),
            },
            ScoreType::FloatScale => {
                let value: f64 = self.score_value.parse().map_err(|_| invalid())?;
                if (0.0..=1.0).contains(&value) {
                    Ok(ScoreValue::Float(value))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}
