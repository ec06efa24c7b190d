//! Forecast request payload

use crate::features::FeatureInput;
use serde::{Deserialize, Serialize};

/// A forecast request received on the predict subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Caller-supplied correlation id; generated when omitted
    #[serde(default = "new_request_id")]
    pub request_id: String,

    /// Product display name, canonicalized before lookup
    #[serde(alias = "product_name", alias = "model_id")]
    pub product: String,

    /// Ordered feature values
    #[serde(alias = "feature")]
    pub features: FeatureInput,
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ForecastRequest {
    pub fn new(product: impl Into<String>, features: FeatureInput) -> Self {
        Self {
            request_id: new_request_id(),
            product: product.into(),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_csv_request() {
        let json = r#"{"product": "Cheese (Ayib)", "features": "1,2,3"}"#;
        let request: ForecastRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.product, "Cheese (Ayib)");
        assert_eq!(request.features, FeatureInput::Csv("1,2,3".to_string()));
        assert!(!request.request_id.is_empty());
    }

    #[test]
    fn test_deserialize_aliases() {
        let json = r#"{"request_id": "r-1", "model_id": "7", "feature": ["1.5", "2"]}"#;
        let request: ForecastRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.request_id, "r-1");
        assert_eq!(request.product, "7");
        assert_eq!(request.features.into_vector().unwrap().len(), 2);
    }
}
