//! Product Forecast Service Library
//!
//! Resolves per-product bundles of ARIMA, random forest and LSTM models from
//! disk and combines whichever subset is present into a single forecast.

pub mod audit;
pub mod canonical;
pub mod catalog;
pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod registry;
pub mod service;
pub mod types;

pub use canonical::{canonicalize, AssetKey};
pub use catalog::CatalogMap;
pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactError, FeatureError, ForecastError, PredictError};
pub use features::FeatureVector;
pub use models::{ArtifactKind, EnsemblePredictor, ModelBundleLoader, PredictionSet};
pub use producer::ReplyPublisher;
pub use service::PredictionService;
pub use types::{ForecastRequest, ForecastResponse};
