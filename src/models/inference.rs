//! Ensemble inference over a per-product model bundle

use crate::error::{ModelError, PredictError};
use crate::features::FeatureVector;
use crate::models::artifact::ArtifactKind;
use crate::models::loader::ModelBundle;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Label → forecast for every predictor that produced a usable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionSet(BTreeMap<String, f64>);

impl PredictionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ArtifactKind, value: f64) {
        if let Some(label) = kind.prediction_label() {
            self.0.insert(label.to_string(), value);
        }
    }

    /// Forecast contributed by `kind`, if any
    pub fn get(&self, kind: ArtifactKind) -> Option<f64> {
        kind.prediction_label()
            .and_then(|label| self.0.get(label).copied())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(label, value)| (label.as_str(), *value))
    }

    pub fn into_map(self) -> BTreeMap<String, f64> {
        self.0
    }
}

/// Everything one ensemble pass produced.
#[derive(Debug, Clone, Default)]
pub struct EnsembleOutput {
    pub predictions: PredictionSet,
    /// Predictors that were invoked and failed
    pub failures: Vec<PredictError>,
    /// Predictors present in the bundle but not invoked
    pub skipped: Vec<ArtifactKind>,
    /// Wall time per invoked predictor
    pub timings: Vec<(ArtifactKind, Duration)>,
}

/// Runs every available model in a bundle through its own input shaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsemblePredictor;

impl EnsemblePredictor {
    pub fn new() -> Self {
        Self
    }

    /// Invoke each model in `bundle`. One predictor failing never stops the
    /// others; failures are collected alongside the successful forecasts.
    pub fn predict(&self, bundle: &ModelBundle, features: &FeatureVector) -> EnsembleOutput {
        let mut output = EnsembleOutput::default();

        if bundle.sequence.is_some() && bundle.scaler.is_none() {
            debug!(
                asset_key = %bundle.asset_key,
                "Sequence model present without scaler, skipping"
            );
            output.skipped.push(ArtifactKind::SequenceModel);
        }

        let predictors = [
            ArtifactKind::SequenceModel,
            ArtifactKind::TreeEnsemble,
            ArtifactKind::TimeSeriesModel,
        ];

        for kind in predictors {
            let start = Instant::now();
            let result = match kind {
                ArtifactKind::SequenceModel => self.run_sequence(bundle, features),
                ArtifactKind::TreeEnsemble => self.run_forest(bundle, features),
                ArtifactKind::TimeSeriesModel => self.run_time_series(bundle),
                ArtifactKind::Scaler => None,
            };

            let Some(result) = result else {
                continue;
            };
            output.timings.push((kind, start.elapsed()));

            match result.and_then(|value| finite(kind, value)) {
                Ok(value) => {
                    output.predictions.insert(kind, value);
                }
                Err(e) => {
                    error!(
                        asset_key = %bundle.asset_key,
                        kind = %kind,
                        error = %e,
                        "Predictor failed"
                    );
                    output.failures.push(e);
                }
            }
        }

        debug!(
            asset_key = %bundle.asset_key,
            predictions = ?output.predictions,
            failures = output.failures.len(),
            "Ensemble inference complete"
        );

        output
    }

    /// Scale, reshape to `(1, n_features, 1)` and run the sequence network.
    fn run_sequence(
        &self,
        bundle: &ModelBundle,
        features: &FeatureVector,
    ) -> Option<Result<f64, PredictError>> {
        let kind = ArtifactKind::SequenceModel;
        let network = bundle.sequence.as_ref()?;
        let scaler = bundle.scaler.as_ref()?;

        let run = || -> Result<f64, ModelError> {
            let scaled = scaler.transform(features.as_slice())?;
            let steps = scaled.len();
            let tensor = Array3::from_shape_vec((1, steps, 1), scaled)
                .map_err(|e| ModelError::Compute(e.to_string()))?;
            let out = network.predict(&tensor)?;
            out.get((0, 0))
                .copied()
                .ok_or_else(|| ModelError::Compute("network returned no output".to_string()))
        };

        Some(run().map_err(|e| PredictError::from_model(kind, e)))
    }

    /// Run the forest on the raw `(1, n_features)` row.
    fn run_forest(
        &self,
        bundle: &ModelBundle,
        features: &FeatureVector,
    ) -> Option<Result<f64, PredictError>> {
        let kind = ArtifactKind::TreeEnsemble;
        let forest = bundle.tree_ensemble.as_ref()?;

        let run = || -> Result<f64, ModelError> {
            let row = Array2::from_shape_vec((1, features.len()), features.to_vec())
                .map_err(|e| ModelError::Compute(e.to_string()))?;
            let out = forest.predict(&row)?;
            out.first()
                .copied()
                .ok_or_else(|| ModelError::Compute("forest returned no output".to_string()))
        };

        Some(run().map_err(|e| PredictError::from_model(kind, e)))
    }

    /// One-step-ahead forecast from the model's own history. Features unused.
    fn run_time_series(&self, bundle: &ModelBundle) -> Option<Result<f64, PredictError>> {
        let model = bundle.time_series.as_ref()?;
        Some(
            model
                .forecast_next()
                .map_err(|e| PredictError::from_model(ArtifactKind::TimeSeriesModel, e)),
        )
    }
}

fn finite(kind: ArtifactKind, value: f64) -> Result<f64, PredictError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictError::Invocation {
            kind,
            reason: "prediction is not finite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::AssetKey;
    use crate::models::forest::{RandomForest, RegressionTree, TreeNode};
    use crate::models::network::{tests::tiny_archive, LstmNetwork};
    use crate::models::{Arima, FeatureScaler};

    fn bundle() -> ModelBundle {
        ModelBundle::empty(AssetKey::from_product("Teff"))
    }

    fn forest(value: f64) -> RandomForest {
        RandomForest {
            n_features: None,
            trees: vec![RegressionTree {
                nodes: vec![TreeNode::Leaf { value }],
            }],
        }
    }

    fn arima() -> Arima {
        Arima {
            p: 0,
            d: 1,
            q: 0,
            constant: 1.0,
            ar_coeffs: vec![],
            ma_coeffs: vec![],
            history: vec![10.0, 11.0],
            residuals: vec![],
        }
    }

    fn scaler(n: usize) -> FeatureScaler {
        FeatureScaler::Standard {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    fn features(values: &[f64]) -> FeatureVector {
        FeatureVector::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_empty_bundle_predicts_nothing() {
        let out = EnsemblePredictor::new().predict(&bundle(), &features(&[1.0]));
        assert!(out.predictions.is_empty());
        assert!(out.failures.is_empty());
    }

    #[test]
    fn test_full_bundle_yields_three_predictions() {
        let mut b = bundle();
        b.tree_ensemble = Some(forest(4.0));
        b.time_series = Some(arima());
        b.scaler = Some(scaler(3));
        b.sequence = Some(Box::new(LstmNetwork::from_spec(tiny_archive()).unwrap()));

        let out = EnsemblePredictor::new().predict(&b, &features(&[1.0, 2.0, 3.0]));
        assert_eq!(out.predictions.len(), 3);
        assert_eq!(out.predictions.get(ArtifactKind::TreeEnsemble), Some(4.0));
        assert_eq!(out.predictions.get(ArtifactKind::TimeSeriesModel), Some(12.0));
        assert!(out.predictions.get(ArtifactKind::SequenceModel).is_some());
        assert_eq!(out.timings.len(), 3);
    }

    #[test]
    fn test_sequence_without_scaler_is_skipped() {
        let mut b = bundle();
        b.sequence = Some(Box::new(LstmNetwork::from_spec(tiny_archive()).unwrap()));

        let out = EnsemblePredictor::new().predict(&b, &features(&[1.0]));
        assert!(out.predictions.is_empty());
        assert!(out.failures.is_empty());
        assert_eq!(out.skipped, vec![ArtifactKind::SequenceModel]);
    }

    #[test]
    fn test_scaler_mismatch_scoped_to_sequence() {
        let mut b = bundle();
        b.tree_ensemble = Some(forest(4.0));
        b.time_series = Some(arima());
        b.scaler = Some(scaler(5));
        b.sequence = Some(Box::new(LstmNetwork::from_spec(tiny_archive()).unwrap()));

        let out = EnsemblePredictor::new().predict(&b, &features(&[1.0, 2.0, 3.0]));
        assert_eq!(out.predictions.len(), 2);
        assert_eq!(
            out.failures,
            vec![PredictError::InputShape {
                kind: ArtifactKind::SequenceModel,
                expected: 5,
                actual: 3
            }]
        );
    }

    #[test]
    fn test_time_series_ignores_features() {
        let mut b = bundle();
        b.time_series = Some(arima());

        let short = EnsemblePredictor::new().predict(&b, &features(&[1.0]));
        let long = EnsemblePredictor::new().predict(&b, &features(&[5.0; 40]));
        assert_eq!(short.predictions, long.predictions);
    }

    #[test]
    fn test_non_finite_prediction_is_failure() {
        let mut b = bundle();
        b.tree_ensemble = Some(forest(f64::INFINITY));

        let out = EnsemblePredictor::new().predict(&b, &features(&[1.0]));
        assert!(out.predictions.is_empty());
        assert!(matches!(
            out.failures.as_slice(),
            [PredictError::Invocation {
                kind: ArtifactKind::TreeEnsemble,
                ..
            }]
        ));
    }
}
