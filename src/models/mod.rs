//! Per-product forecasting models, artifact discovery and ensemble inference

pub mod arima;
pub mod artifact;
pub mod forest;
pub mod inference;
pub mod loader;
pub mod network;
pub mod scaler;

pub use arima::Arima;
pub use artifact::{locate, ArtifactKind, ArtifactPaths};
pub use forest::RandomForest;
pub use inference::{EnsembleOutput, EnsemblePredictor, PredictionSet};
pub use loader::{BundleLoad, ModelBundle, ModelBundleLoader};
pub use network::{LstmNetwork, SequenceNetwork};
pub use scaler::FeatureScaler;

use crate::error::ModelError;

/// Internal consistency check run on every decoded artifact.
///
/// A file that deserializes but fails validation is treated as corrupt.
pub trait Validate {
    fn validate(&self) -> Result<(), ModelError>;
}
