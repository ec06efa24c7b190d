//! Request orchestration: canonicalize → locate → load → predict

use crate::canonical::AssetKey;
use crate::catalog::CatalogMap;
use crate::config::{LoadingStrategy, ModelsConfig};
use crate::error::ForecastError;
use crate::features::FeatureVector;
use crate::metrics::ServiceMetrics;
use crate::models::artifact::{locate, ArtifactKind};
use crate::models::inference::{EnsemblePredictor, PredictionSet};
use crate::models::loader::{ModelBundle, ModelBundleLoader};
use crate::registry::BundleRegistry;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Where bundles come from for each request
pub enum BundleSource {
    /// Fresh load from disk per request
    OnDemand {
        models_dir: PathBuf,
        loader: ModelBundleLoader,
    },
    /// Immutable registry built at startup
    Preloaded(BundleRegistry),
}

/// Serves forecasts for named products.
pub struct PredictionService {
    source: BundleSource,
    predictor: EnsemblePredictor,
    metrics: Option<Arc<ServiceMetrics>>,
}

impl PredictionService {
    pub fn new(source: BundleSource) -> Self {
        Self {
            source,
            predictor: EnsemblePredictor::new(),
            metrics: None,
        }
    }

    /// Service loading bundles from `models_dir` on every request
    pub fn on_demand<P: Into<PathBuf>>(models_dir: P, loader: ModelBundleLoader) -> Self {
        Self::new(BundleSource::OnDemand {
            models_dir: models_dir.into(),
            loader,
        })
    }

    /// Build the service described by the models configuration
    pub fn from_config(config: &ModelsConfig, catalog: &CatalogMap) -> Result<Self> {
        let loader = ModelBundleLoader::with_runtime(config.network_runtime, config.onnx_threads)?;

        let source = match config.loading {
            LoadingStrategy::OnDemand => BundleSource::OnDemand {
                models_dir: PathBuf::from(&config.models_dir),
                loader,
            },
            LoadingStrategy::Preload => {
                BundleSource::Preloaded(BundleRegistry::build(catalog, &config.models_dir, &loader))
            }
        };

        info!(
            strategy = ?config.loading,
            models_dir = %config.models_dir,
            "Prediction service initialized"
        );
        Ok(Self::new(source))
    }

    /// Record load and predictor failures into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Forecast `product` from `features`.
    ///
    /// `BundleNotFound` when nothing could be loaded, `ComputeFailure` when
    /// artifacts loaded but every predictor failed.
    pub fn handle(
        &self,
        product: &str,
        features: &FeatureVector,
    ) -> Result<PredictionSet, ForecastError> {
        let asset_key = AssetKey::from_product(product);
        let not_found = |corrupt: Vec<ArtifactKind>| ForecastError::BundleNotFound {
            product: product.to_string(),
            asset_key: asset_key.clone(),
            corrupt,
        };

        if asset_key.is_empty() {
            return Err(not_found(Vec::new()));
        }

        let (bundle, corrupt) = self.resolve(&asset_key);
        if bundle.is_empty() {
            return Err(not_found(corrupt));
        }

        let output = self.predictor.predict(&bundle, features);
        if let Some(metrics) = &self.metrics {
            for (kind, elapsed) in &output.timings {
                metrics.record_model_time(*kind, *elapsed);
            }
            for failure in &output.failures {
                metrics.record_predictor_failure(failure.kind());
            }
        }

        if output.predictions.is_empty() {
            return Err(ForecastError::ComputeFailure {
                asset_key,
                failures: output.failures,
            });
        }

        debug!(
            product = %product,
            asset_key = %asset_key,
            predictions = output.predictions.len(),
            "Forecast served"
        );
        Ok(output.predictions)
    }

    fn resolve(&self, key: &AssetKey) -> (Arc<ModelBundle>, Vec<ArtifactKind>) {
        let (bundle, corrupt) = match &self.source {
            BundleSource::OnDemand { models_dir, loader } => {
                let load = loader.load(&locate(key, models_dir));
                let corrupt = load.failed_kinds();
                (Arc::new(load.bundle), corrupt)
            }
            BundleSource::Preloaded(registry) => match registry.get(key) {
                Some((bundle, corrupt)) => (bundle, corrupt.to_vec()),
                None => (Arc::new(ModelBundle::empty(key.clone())), Vec::new()),
            },
        };

        // Preloaded failures are counted per request, same as on-demand ones
        if let Some(metrics) = &self.metrics {
            for kind in &corrupt {
                metrics.record_load_failure(*kind);
            }
        }
        (bundle, corrupt)
    }
}
