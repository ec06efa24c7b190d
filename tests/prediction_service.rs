//! End-to-end checks of bundle resolution and ensemble prediction against
//! artifact directories built on the fly.

use product_forecast::catalog::CatalogMap;
use product_forecast::config::{LoadingStrategy, ModelsConfig};
use product_forecast::error::{ForecastError, PredictError};
use product_forecast::features::FeatureVector;
use product_forecast::metrics::ServiceMetrics;
use product_forecast::models::loader::NetworkRuntime;
use product_forecast::models::{ArtifactKind, ModelBundleLoader};
use product_forecast::service::PredictionService;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_artifact(dir: &Path, key: &str, kind: ArtifactKind, value: &Value) {
    let path = dir.join(format!("{}{}", key, kind.suffix()));
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

fn forest() -> Value {
    json!({
        "n_features": 3,
        "trees": [
            {"nodes": [
                {"type": "split", "feature": 0, "threshold": 5.0, "left": 1, "right": 2},
                {"type": "leaf", "value": 10.0},
                {"type": "leaf", "value": 20.0}
            ]},
            {"nodes": [{"type": "leaf", "value": 30.0}]}
        ]
    })
}

fn arima() -> Value {
    json!({
        "p": 1, "d": 0, "q": 0,
        "constant": 0.0,
        "ar_coeffs": [0.5],
        "ma_coeffs": [],
        "history": [100.0, 104.0, 102.0]
    })
}

fn scaler(n: usize) -> Value {
    json!({"type": "standard", "mean": vec![1.0; n], "scale": vec![2.0; n]})
}

fn network() -> Value {
    json!({
        "layers": [
            {
                "type": "lstm",
                "units": 1,
                "kernel": [[0.5, 0.5, 1.0, 0.5]],
                "recurrent_kernel": [[0.1, 0.1, 0.1, 0.1]],
                "bias": [0.0, 1.0, 0.0, 0.0]
            },
            {"type": "dense", "kernel": [[2.0]], "bias": [0.25]}
        ]
    })
}

fn write_full_bundle(dir: &Path, key: &str, scaler_width: usize) {
    write_artifact(dir, key, ArtifactKind::TimeSeriesModel, &arima());
    write_artifact(dir, key, ArtifactKind::TreeEnsemble, &forest());
    write_artifact(dir, key, ArtifactKind::Scaler, &scaler(scaler_width));
    write_artifact(dir, key, ArtifactKind::SequenceModel, &network());
}

fn features() -> FeatureVector {
    FeatureVector::parse_csv("3.0,4.0,5.0").unwrap()
}

#[test]
fn test_tree_ensemble_only() {
    let dir = TempDir::new().unwrap();
    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());

    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    let predictions = service.handle("Teff", &features()).unwrap();

    assert_eq!(predictions.len(), 1);
    // (10 + 30) / 2, first feature is below the split threshold
    assert_eq!(predictions.get(ArtifactKind::TreeEnsemble), Some(20.0));
    assert!(predictions.get(ArtifactKind::SequenceModel).is_none());
}

#[test]
fn test_zero_artifacts_is_not_found() {
    let dir = TempDir::new().unwrap();
    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());

    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    let result = service.handle("Cheese (Ayib)", &features());

    assert!(matches!(result, Err(ForecastError::BundleNotFound { .. })));
}

#[test]
fn test_full_bundle_yields_three_forecasts() {
    let dir = TempDir::new().unwrap();
    write_full_bundle(dir.path(), "Cheese_Ayib", 3);

    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    let predictions = service.handle("Cheese (Ayib)", &features()).unwrap();

    assert_eq!(predictions.len(), 3);
    let labels: Vec<&str> = predictions.iter().map(|(label, _)| label).collect();
    assert!(labels.contains(&"ARIMA Forecast"));
    assert!(labels.contains(&"Random Forest Prediction"));
    assert!(labels.contains(&"LSTM Prediction"));
    assert!(predictions.iter().all(|(_, value)| value.is_finite()));
}

#[test]
fn test_corrupt_scaler_skips_sequence_path_only() {
    let dir = TempDir::new().unwrap();
    write_full_bundle(dir.path(), "Teff", 3);
    std::fs::write(
        dir.path().join(format!("Teff{}", ArtifactKind::Scaler.suffix())),
        b"\x80\x04not a scaler",
    )
    .unwrap();

    let metrics = Arc::new(ServiceMetrics::new());
    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new())
        .with_metrics(metrics.clone());
    let predictions = service.handle("Teff", &features()).unwrap();

    assert_eq!(predictions.len(), 2);
    assert!(predictions.get(ArtifactKind::SequenceModel).is_none());
    assert!(predictions.get(ArtifactKind::TimeSeriesModel).is_some());
    assert_eq!(metrics.load_failures()[&ArtifactKind::Scaler], 1);
}

#[test]
fn test_scaler_width_mismatch_is_scoped_to_sequence_path() {
    let dir = TempDir::new().unwrap();
    write_full_bundle(dir.path(), "Teff", 4);

    let metrics = Arc::new(ServiceMetrics::new());
    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new())
        .with_metrics(metrics.clone());
    let predictions = service.handle("Teff", &features()).unwrap();

    assert_eq!(predictions.len(), 2);
    assert!(predictions.get(ArtifactKind::TreeEnsemble).is_some());
    assert!(predictions.get(ArtifactKind::SequenceModel).is_none());
    assert_eq!(metrics.predictor_failures()[&ArtifactKind::SequenceModel], 1);
}

#[test]
fn test_every_predictor_failing_is_compute_failure() {
    let dir = TempDir::new().unwrap();
    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());

    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    // Forest declares three features
    let result = service.handle("Teff", &FeatureVector::new(vec![1.0]).unwrap());

    match result {
        Err(ForecastError::ComputeFailure { failures, .. }) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                failures[0],
                PredictError::InputShape {
                    kind: ArtifactKind::TreeEnsemble,
                    ..
                }
            ));
        }
        other => panic!("expected ComputeFailure, got {:?}", other),
    }
}

#[test]
fn test_all_artifacts_corrupt_reports_kinds() {
    let dir = TempDir::new().unwrap();
    for kind in ArtifactKind::ALL {
        std::fs::write(dir.path().join(format!("Teff{}", kind.suffix())), b"garbage").unwrap();
    }

    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    match service.handle("Teff", &features()) {
        Err(ForecastError::BundleNotFound { corrupt, .. }) => {
            assert_eq!(corrupt.len(), 4);
        }
        other => panic!("expected BundleNotFound, got {:?}", other),
    }
}

#[test]
fn test_on_demand_sees_new_artifacts() {
    let dir = TempDir::new().unwrap();
    let service = PredictionService::on_demand(dir.path(), ModelBundleLoader::new());
    assert!(service.handle("Teff", &features()).is_err());

    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());
    assert_eq!(service.handle("Teff", &features()).unwrap().len(), 1);
}

#[test]
fn test_preload_serves_catalog_products_only() {
    let dir = TempDir::new().unwrap();
    write_full_bundle(dir.path(), "Cheese_Ayib", 3);
    write_artifact(dir.path(), "Honey", ArtifactKind::TreeEnsemble, &forest());

    let catalog: CatalogMap =
        serde_json::from_value(json!({"Dairy": ["Cheese (Ayib)"], "Cereals": ["Teff"]})).unwrap();
    let config = ModelsConfig {
        models_dir: dir.path().to_string_lossy().into_owned(),
        loading: LoadingStrategy::Preload,
        network_runtime: NetworkRuntime::Native,
        onnx_threads: 1,
    };
    let service = PredictionService::from_config(&config, &catalog).unwrap();

    assert_eq!(service.handle("Cheese (Ayib)", &features()).unwrap().len(), 3);
    // Present on disk but not in the catalog
    assert!(matches!(
        service.handle("Honey", &features()),
        Err(ForecastError::BundleNotFound { .. })
    ));

    // Registry is fixed at startup
    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());
    assert!(service.handle("Teff", &features()).is_err());
}

#[test]
fn test_preload_counts_load_failures() {
    let dir = TempDir::new().unwrap();
    write_artifact(dir.path(), "Teff", ArtifactKind::TreeEnsemble, &forest());
    std::fs::write(
        dir.path().join(format!("Teff{}", ArtifactKind::Scaler.suffix())),
        b"garbage",
    )
    .unwrap();

    let catalog: CatalogMap = serde_json::from_value(json!({"Cereals": ["Teff"]})).unwrap();
    let config = ModelsConfig {
        models_dir: dir.path().to_string_lossy().into_owned(),
        loading: LoadingStrategy::Preload,
        network_runtime: NetworkRuntime::Native,
        onnx_threads: 1,
    };
    let metrics = Arc::new(ServiceMetrics::new());
    let service = PredictionService::from_config(&config, &catalog)
        .unwrap()
        .with_metrics(metrics.clone());

    assert_eq!(service.handle("Teff", &features()).unwrap().len(), 1);
    assert_eq!(metrics.load_failures()[&ArtifactKind::Scaler], 1);
}
