//! Feature scalers fitted alongside the sequence model

use crate::error::ModelError;
use crate::models::Validate;
use serde::{Deserialize, Serialize};

/// Column-wise feature scaler.
///
/// Mirrors the two scalers the training pipeline exports: standardization
/// (`(x - mean) / scale`) and min-max (`x * scale + min`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureScaler {
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl FeatureScaler {
    /// Number of columns the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        match self {
            FeatureScaler::Standard { mean, .. } => mean.len(),
            FeatureScaler::MinMax { min, .. } => min.len(),
        }
    }

    /// Scale a single feature row.
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        let expected = self.n_features();
        if row.len() != expected {
            return Err(ModelError::Shape {
                expected,
                actual: row.len(),
            });
        }

        let scaled = match self {
            FeatureScaler::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            FeatureScaler::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };

        Ok(scaled)
    }
}

impl Validate for FeatureScaler {
    fn validate(&self) -> Result<(), ModelError> {
        let (offsets, scale) = match self {
            FeatureScaler::Standard { mean, scale } => (mean, scale),
            FeatureScaler::MinMax { min, scale } => (min, scale),
        };

        if offsets.is_empty() {
            return Err(ModelError::Invalid("scaler has no columns".to_string()));
        }
        if offsets.len() != scale.len() {
            return Err(ModelError::Invalid(format!(
                "scaler has {} offsets but {} scale factors",
                offsets.len(),
                scale.len()
            )));
        }
        if offsets.iter().chain(scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid("scaler contains non-finite values".to_string()));
        }
        if matches!(self, FeatureScaler::Standard { .. }) && scale.iter().any(|s| *s == 0.0) {
            return Err(ModelError::Invalid("standard scaler has zero scale".to_string()));
        }

        Ok(())
    }
}
