//! Per-product model bundle loader
//!
//! Every artifact kind is loaded on its own: a missing file is simply absent,
//! a broken file is recorded as a failure for that kind only.

use crate::canonical::AssetKey;
use crate::error::ArtifactError;
use crate::models::artifact::{ArtifactKind, ArtifactPaths};
use crate::models::network::{LstmNetwork, SequenceNetwork};
use crate::models::{Arima, FeatureScaler, RandomForest, Validate};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Runtime used to decode and execute the sequence network archive
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkRuntime {
    /// JSON weight archive evaluated by the built-in LSTM
    #[default]
    Native,
    /// ONNX graph executed by ONNX Runtime
    #[cfg(feature = "onnx")]
    Onnx,
}

/// Models loaded for one product. Any subset may be present.
pub struct ModelBundle {
    pub asset_key: AssetKey,
    pub time_series: Option<Arima>,
    pub tree_ensemble: Option<RandomForest>,
    pub scaler: Option<FeatureScaler>,
    pub sequence: Option<Box<dyn SequenceNetwork>>,
}

impl ModelBundle {
    pub fn empty(asset_key: AssetKey) -> Self {
        Self {
            asset_key,
            time_series: None,
            tree_ensemble: None,
            scaler: None,
            sequence: None,
        }
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::TimeSeriesModel => self.time_series.is_some(),
            ArtifactKind::TreeEnsemble => self.tree_ensemble.is_some(),
            ArtifactKind::Scaler => self.scaler.is_some(),
            ArtifactKind::SequenceModel => self.sequence.is_some(),
        }
    }

    /// Kinds present in the bundle
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kinds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("asset_key", &self.asset_key)
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Result of loading one bundle, including what was missing or broken.
#[derive(Debug)]
pub struct BundleLoad {
    pub bundle: ModelBundle,
    /// Kinds whose artifact file does not exist
    pub absent: Vec<ArtifactKind>,
    /// Kinds whose artifact file exists but could not be loaded
    pub failed: Vec<ArtifactError>,
}

impl BundleLoad {
    pub fn failed_kinds(&self) -> Vec<ArtifactKind> {
        self.failed.iter().map(ArtifactError::kind).collect()
    }
}

/// Stateless loader for per-product bundles.
///
/// Holds only runtime settings, so one instance can be shared across
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct ModelBundleLoader {
    runtime: NetworkRuntime,
    onnx_threads: usize,
}

impl ModelBundleLoader {
    /// Loader using the native network runtime
    pub fn new() -> Self {
        Self {
            runtime: NetworkRuntime::Native,
            onnx_threads: 1,
        }
    }

    /// Loader for a specific network runtime
    pub fn with_runtime(runtime: NetworkRuntime, onnx_threads: usize) -> Result<Self> {
        init_runtime(runtime, onnx_threads)?;

        info!(runtime = ?runtime, "Model bundle loader ready");
        Ok(Self {
            runtime,
            onnx_threads,
        })
    }

    pub fn runtime(&self) -> NetworkRuntime {
        self.runtime
    }

    pub fn onnx_threads(&self) -> usize {
        self.onnx_threads
    }

    /// Load every artifact kind found at `paths`.
    pub fn load(&self, paths: &ArtifactPaths) -> BundleLoad {
        let mut bundle = ModelBundle::empty(paths.asset_key.clone());
        let mut absent = Vec::new();
        let mut failed = Vec::new();

        for (kind, path) in paths.iter() {
            match path.try_exists() {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        asset_key = %paths.asset_key,
                        kind = %kind,
                        path = %path.display(),
                        "Artifact absent"
                    );
                    absent.push(kind);
                    continue;
                }
                // Present or not, the file cannot be reached
                Err(source) => {
                    warn!(
                        asset_key = %paths.asset_key,
                        kind = %kind,
                        path = %path.display(),
                        error = %source,
                        "Artifact path unreadable, skipping"
                    );
                    failed.push(ArtifactError::Io {
                        kind,
                        path: path.to_path_buf(),
                        source,
                    });
                    continue;
                }
            }

            let outcome = match kind {
                ArtifactKind::TimeSeriesModel => {
                    load_object::<Arima>(kind, path).map(|m| bundle.time_series = Some(m))
                }
                ArtifactKind::TreeEnsemble => {
                    load_object::<RandomForest>(kind, path).map(|m| bundle.tree_ensemble = Some(m))
                }
                ArtifactKind::Scaler => {
                    load_object::<FeatureScaler>(kind, path).map(|m| bundle.scaler = Some(m))
                }
                ArtifactKind::SequenceModel => {
                    self.load_network(path).map(|m| bundle.sequence = Some(m))
                }
            };

            match outcome {
                Ok(()) => debug!(asset_key = %paths.asset_key, kind = %kind, "Artifact loaded"),
                Err(e) => {
                    warn!(
                        asset_key = %paths.asset_key,
                        kind = %kind,
                        error = %e,
                        "Failed to load artifact, skipping"
                    );
                    failed.push(e);
                }
            }
        }

        debug!(
            asset_key = %paths.asset_key,
            loaded = ?bundle.kinds(),
            absent = ?absent,
            failed = failed.len(),
            "Bundle load complete"
        );

        BundleLoad {
            bundle,
            absent,
            failed,
        }
    }

    /// Decode the sequence network archive with the configured runtime
    fn load_network(&self, path: &Path) -> Result<Box<dyn SequenceNetwork>, ArtifactError> {
        let kind = ArtifactKind::SequenceModel;
        let corrupt = |e: anyhow::Error| ArtifactError::Corrupt {
            kind,
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        };

        match self.runtime {
            NetworkRuntime::Native => LstmNetwork::from_archive(path)
                .map(|n| Box::new(n) as Box<dyn SequenceNetwork>)
                .map_err(corrupt),
            #[cfg(feature = "onnx")]
            NetworkRuntime::Onnx => {
                crate::models::network::OnnxNetwork::load(path, self.onnx_threads)
                    .map(|n| Box::new(n) as Box<dyn SequenceNetwork>)
                    .map_err(corrupt)
            }
        }
    }
}

impl Default for ModelBundleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "onnx")]
fn init_runtime(runtime: NetworkRuntime, onnx_threads: usize) -> Result<()> {
    if runtime == NetworkRuntime::Onnx {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
    }
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn init_runtime(_runtime: NetworkRuntime, _onnx_threads: usize) -> Result<()> {
    Ok(())
}

/// Generic object decoding shared by the ARIMA, forest and scaler artifacts
fn load_object<T>(kind: ArtifactKind, path: &Path) -> Result<T, ArtifactError>
where
    T: DeserializeOwned + Validate,
{
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;

    let corrupt = |reason: String| ArtifactError::Corrupt {
        kind,
        path: path.to_path_buf(),
        reason,
    };

    let model: T = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    model.validate().map_err(|e| corrupt(e.to_string()))?;
    Ok(model)
}
