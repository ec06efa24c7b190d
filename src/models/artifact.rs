//! Artifact kinds and their on-disk naming conventions

use crate::canonical::AssetKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four per-product artifacts produced by the training pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// ARIMA model forecasting from its own fitted history
    TimeSeriesModel,
    /// Random forest regressor over the raw feature row
    TreeEnsemble,
    /// Feature scaler feeding the sequence model
    Scaler,
    /// LSTM network archive
    SequenceModel,
}

impl ArtifactKind {
    /// Every kind, in the order the audit report lists them.
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::TimeSeriesModel,
        ArtifactKind::TreeEnsemble,
        ArtifactKind::SequenceModel,
        ArtifactKind::Scaler,
    ];

    /// Filename suffix appended to `<asset_key>`.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::TimeSeriesModel => "_arima_model.pkl",
            ArtifactKind::TreeEnsemble => "_rf_model.pkl",
            ArtifactKind::Scaler => "_scaler.pkl",
            ArtifactKind::SequenceModel => "_lstm_model.h5",
        }
    }

    /// Short name used by the audit tool and in metrics.
    pub fn short_name(&self) -> &'static str {
        match self {
            ArtifactKind::TimeSeriesModel => "arima",
            ArtifactKind::TreeEnsemble => "rf",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::SequenceModel => "lstm",
        }
    }

    /// Label of the prediction this kind contributes, if it predicts at all.
    pub fn prediction_label(&self) -> Option<&'static str> {
        match self {
            ArtifactKind::TimeSeriesModel => Some("ARIMA Forecast"),
            ArtifactKind::TreeEnsemble => Some("Random Forest Prediction"),
            ArtifactKind::SequenceModel => Some("LSTM Prediction"),
            ArtifactKind::Scaler => None,
        }
    }

    /// Artifact filename for an asset key.
    pub fn file_name(&self, key: &AssetKey) -> String {
        format!("{}{}", key.as_str(), self.suffix())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::TimeSeriesModel => "time_series_model",
            ArtifactKind::TreeEnsemble => "tree_ensemble",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::SequenceModel => "sequence_model",
        };
        f.write_str(name)
    }
}

/// Candidate artifact paths for one asset key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub asset_key: AssetKey,
    pub time_series: PathBuf,
    pub tree_ensemble: PathBuf,
    pub scaler: PathBuf,
    pub sequence: PathBuf,
}

impl ArtifactPaths {
    pub fn get(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::TimeSeriesModel => &self.time_series,
            ArtifactKind::TreeEnsemble => &self.tree_ensemble,
            ArtifactKind::Scaler => &self.scaler,
            ArtifactKind::SequenceModel => &self.sequence,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &Path)> + '_ {
        ArtifactKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Compute the expected path of every artifact kind under `root`.
///
/// Pure path arithmetic; existence is the loader's concern.
pub fn locate<P: AsRef<Path>>(key: &AssetKey, root: P) -> ArtifactPaths {
    let root = root.as_ref();
    let path_for = |kind: ArtifactKind| root.join(kind.file_name(key));

    ArtifactPaths {
        asset_key: key.clone(),
        time_series: path_for(ArtifactKind::TimeSeriesModel),
        tree_ensemble: path_for(ArtifactKind::TreeEnsemble),
        scaler: path_for(ArtifactKind::Scaler),
        sequence: path_for(ArtifactKind::SequenceModel),
    }
}
