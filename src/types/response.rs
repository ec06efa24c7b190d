//! Forecast response payload

use crate::canonical::AssetKey;
use crate::error::{FeatureError, ForecastError};
use crate::models::inference::PredictionSet;
use crate::metrics::RequestOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome category of a forecast request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    NotFound,
    ComputeFailure,
    BadRequest,
}

impl ResponseStatus {
    /// HTTP-style status code for gateway front-ends
    pub fn code(&self) -> u16 {
        match self {
            ResponseStatus::Ok => 200,
            ResponseStatus::BadRequest => 400,
            ResponseStatus::NotFound => 404,
            ResponseStatus::ComputeFailure => 500,
        }
    }

    pub fn outcome(&self) -> RequestOutcome {
        match self {
            ResponseStatus::Ok => RequestOutcome::Predicted,
            ResponseStatus::NotFound => RequestOutcome::NotFound,
            ResponseStatus::ComputeFailure => RequestOutcome::ComputeFailure,
            ResponseStatus::BadRequest => RequestOutcome::BadRequest,
        }
    }
}

/// Reply sent for every forecast request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub request_id: String,

    pub status: ResponseStatus,

    /// HTTP-style status code mirroring `status`
    pub code: u16,

    /// Product name as requested
    pub product: String,

    /// Canonical key used to locate artifacts
    pub asset_key: String,

    /// Label → forecast; empty unless `status` is `ok`
    #[serde(default)]
    pub predictions: BTreeMap<String, f64>,

    /// Human-readable reason for non-ok responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ForecastResponse {
    fn base(request_id: &str, product: &str, status: ResponseStatus) -> Self {
        Self {
            request_id: request_id.to_string(),
            status,
            code: status.code(),
            product: product.to_string(),
            asset_key: AssetKey::from_product(product).to_string(),
            predictions: BTreeMap::new(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Build the reply for a service outcome
    pub fn from_outcome(
        request_id: &str,
        product: &str,
        outcome: Result<PredictionSet, ForecastError>,
    ) -> Self {
        match outcome {
            Ok(predictions) => {
                let mut response = Self::base(request_id, product, ResponseStatus::Ok);
                response.predictions = predictions.into_map();
                response
            }
            Err(e) => {
                let status = match e {
                    ForecastError::BundleNotFound { .. } => ResponseStatus::NotFound,
                    ForecastError::ComputeFailure { .. } => ResponseStatus::ComputeFailure,
                };
                let mut response = Self::base(request_id, product, status);
                response.error = Some(e.to_string());
                response
            }
        }
    }

    /// Reply for malformed feature input
    pub fn bad_features(request_id: &str, product: &str, err: &FeatureError) -> Self {
        let mut response = Self::base(request_id, product, ResponseStatus::BadRequest);
        response.error = Some(err.to_string());
        response
    }

    /// Reply for a payload that is not a valid request at all
    pub fn malformed(reason: impl Into<String>) -> Self {
        let mut response = Self::base("", "", ResponseStatus::BadRequest);
        response.error = Some(reason.into());
        response
    }
}
