//! Feature vectors supplied with each forecast request.
//!
//! Features arrive either as a comma-separated string (the form field the
//! web front-end posts) or as a JSON array. Semantics are owned by the
//! training pipeline; only well-formedness is checked here.

use crate::error::FeatureError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ordered numeric inputs for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Build from already-numeric values, rejecting empty or non-finite input.
    pub fn new(values: Vec<f64>) -> Result<Self, FeatureError> {
        if values.is_empty() {
            return Err(FeatureError::Empty);
        }
        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite { position });
        }
        Ok(Self(values))
    }

    /// Parse a comma-separated list such as `"1.5, 2, 3e2"`.
    ///
    /// Whitespace around each item is ignored, and so is a single trailing comma.
    pub fn parse_csv(input: &str) -> Result<Self, FeatureError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
        if trimmed.trim().is_empty() {
            return Err(FeatureError::Empty);
        }

        let values = trimmed
            .split(',')
            .enumerate()
            .map(|(position, raw)| {
                let item = raw.trim();
                item.parse::<f64>().map_err(|_| FeatureError::Malformed {
                    position,
                    value: item.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl FromStr for FeatureVector {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_csv(s)
    }
}

/// Feature payload as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    Csv(String),
    Values(Vec<f64>),
    /// Form-style list of individually submitted fields
    Fields(Vec<String>),
}

impl FeatureInput {
    pub fn into_vector(self) -> Result<FeatureVector, FeatureError> {
        match self {
            FeatureInput::Csv(text) => FeatureVector::parse_csv(&text),
            FeatureInput::Values(values) => FeatureVector::new(values),
            FeatureInput::Fields(fields) => {
                let values = fields
                    .iter()
                    .enumerate()
                    .map(|(position, raw)| {
                        raw.trim().parse::<f64>().map_err(|_| FeatureError::Malformed {
                            position,
                            value: raw.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                FeatureVector::new(values)
            }
        }
    }
}
