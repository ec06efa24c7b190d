//! Typed errors for artifact loading, model invocation and request handling.

use crate::canonical::AssetKey;
use crate::models::artifact::ArtifactKind;
use std::path::PathBuf;
use thiserror::Error;

/// An artifact file existed but could not be turned into a usable model.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {kind} artifact at {}: {source}", path.display())]
    Io {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt {kind} artifact at {}: {reason}", path.display())]
    Corrupt {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },
}

impl ArtifactError {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactError::Io { kind, .. } | ArtifactError::Corrupt { kind, .. } => *kind,
        }
    }
}

/// Failure raised by a single model while validating or computing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    Shape { expected: usize, actual: usize },

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("computation failed: {0}")]
    Compute(String),
}

/// Failure of one predictor inside the ensemble. Never aborts siblings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictError {
    #[error("input shape mismatch for {kind}: expected {expected} features, got {actual}")]
    InputShape {
        kind: ArtifactKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} invocation failed: {reason}")]
    Invocation { kind: ArtifactKind, reason: String },
}

impl PredictError {
    pub fn from_model(kind: ArtifactKind, err: ModelError) -> Self {
        match err {
            ModelError::Shape { expected, actual } => PredictError::InputShape {
                kind,
                expected,
                actual,
            },
            other => PredictError::Invocation {
                kind,
                reason: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            PredictError::InputShape { kind, .. } | PredictError::Invocation { kind, .. } => *kind,
        }
    }
}

/// Request-level outcome that reaches the caller.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No artifact could be loaded for the product.
    #[error("no model bundle found for '{product}' (asset key '{asset_key}')")]
    BundleNotFound {
        product: String,
        asset_key: AssetKey,
        /// Kinds whose files existed but failed to load.
        corrupt: Vec<ArtifactKind>,
    },

    /// Artifacts loaded but every predictor failed.
    #[error("all {} predictors failed for asset key '{asset_key}'", failures.len())]
    ComputeFailure {
        asset_key: AssetKey,
        failures: Vec<PredictError>,
    },
}

/// Malformed feature input supplied by a client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    #[error("feature list is empty")]
    Empty,

    #[error("feature {position} is not a number: '{value}'")]
    Malformed { position: usize, value: String },

    #[error("feature {position} is not finite")]
    NonFinite { position: usize },
}
