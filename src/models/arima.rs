//! Fitted ARIMA(p, d, q) state and forecasting
//!
//! The model carries everything it needs to forecast: the tail of the
//! observed series and of the in-sample residuals. It never looks at the
//! request's feature vector.

use crate::error::ModelError;
use crate::models::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arima {
    /// AR order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// MA order
    pub q: usize,
    /// Mean of the differenced series
    #[serde(default)]
    pub constant: f64,
    pub ar_coeffs: Vec<f64>,
    pub ma_coeffs: Vec<f64>,
    /// Most recent observations on the original scale, oldest first
    pub history: Vec<f64>,
    /// Most recent in-sample residuals on the differenced scale, oldest first
    #[serde(default)]
    pub residuals: Vec<f64>,
}

impl Arima {
    /// Forecast `steps` values ahead of the stored history.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, ModelError> {
        if steps == 0 {
            return Ok(Vec::new());
        }

        // levels[k] is the k-times differenced series
        let mut levels = Vec::with_capacity(self.d + 1);
        levels.push(self.history.clone());
        for k in 0..self.d {
            let next: Vec<f64> = levels[k].windows(2).map(|w| w[1] - w[0]).collect();
            levels.push(next);
        }

        let mut residuals = self.residuals.clone();
        let mut forecasts = Vec::with_capacity(steps);

        for _ in 0..steps {
            let series = &levels[self.d];
            let mut next = self.constant;

            for (j, phi) in self.ar_coeffs.iter().enumerate() {
                let idx = series.len() - j - 1;
                next += phi * (series[idx] - self.constant);
            }
            for (j, theta) in self.ma_coeffs.iter().enumerate() {
                if let Some(idx) = residuals.len().checked_sub(j + 1) {
                    next += theta * residuals[idx];
                }
            }

            // Integrate back up to the original scale
            levels[self.d].push(next);
            for k in (0..self.d).rev() {
                let last = levels[k].last().copied().unwrap_or(0.0);
                let below = levels[k + 1].last().copied().unwrap_or(0.0);
                levels[k].push(last + below);
            }
            residuals.push(0.0);

            let value = levels[0].last().copied().unwrap_or(next);
            if !value.is_finite() {
                return Err(ModelError::Compute("forecast is not finite".to_string()));
            }
            forecasts.push(value);
        }

        Ok(forecasts)
    }

    /// Forecast exactly one step ahead.
    pub fn forecast_next(&self) -> Result<f64, ModelError> {
        self.forecast(1)?
            .first()
            .copied()
            .ok_or_else(|| ModelError::Compute("empty forecast".to_string()))
    }
}

impl Validate for Arima {
    fn validate(&self) -> Result<(), ModelError> {
        if self.ar_coeffs.len() != self.p {
            return Err(ModelError::Invalid(format!(
                "AR order {} but {} coefficients",
                self.p,
                self.ar_coeffs.len()
            )));
        }
        if self.ma_coeffs.len() != self.q {
            return Err(ModelError::Invalid(format!(
                "MA order {} but {} coefficients",
                self.q,
                self.ma_coeffs.len()
            )));
        }

        let required = (self.p + self.d).max(self.d + 1);
        if self.history.len() < required {
            return Err(ModelError::Invalid(format!(
                "history holds {} observations, need at least {}",
                self.history.len(),
                required
            )));
        }

        let all_finite = std::iter::once(&self.constant)
            .chain(&self.ar_coeffs)
            .chain(&self.ma_coeffs)
            .chain(&self.history)
            .chain(&self.residuals)
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelError::Invalid("model contains non-finite values".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(p: usize, d: usize, q: usize) -> Arima {
        Arima {
            p,
            d,
            q,
            constant: 0.0,
            ar_coeffs: vec![0.0; p],
            ma_coeffs: vec![0.0; q],
            history: Vec::new(),
            residuals: Vec::new(),
        }
    }

    #[test]
    fn test_ar1_forecast() {
        let mut m = model(1, 0, 0);
        m.constant = 10.0;
        m.ar_coeffs = vec![0.5];
        m.history = vec![8.0, 12.0];
        assert!(m.validate().is_ok());

        // 10 + 0.5 * (12 - 10)
        assert!((m.forecast_next().unwrap() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_random_walk_with_drift() {
        let mut m = model(0, 1, 0);
        m.constant = 2.0;
        m.history = vec![1.0, 3.0, 5.0];
        assert_eq!(m.forecast(3).unwrap(), vec![7.0, 9.0, 11.0]);
    }

    #[test]
    fn test_second_order_differencing() {
        let mut m = model(0, 2, 0);
        m.history = vec![1.0, 4.0, 9.0];
        // Second difference 2 is carried by the constant
        m.constant = 2.0;
        assert!((m.forecast_next().unwrap() - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_ma_term_uses_last_residual() {
        let mut m = model(0, 0, 1);
        m.constant = 5.0;
        m.ma_coeffs = vec![0.4];
        m.history = vec![5.0];
        m.residuals = vec![1.0, 2.0];
        assert!((m.forecast_next().unwrap() - 5.8).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_short_history() {
        let mut m = model(3, 1, 0);
        m.history = vec![1.0, 2.0];
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_coefficient_mismatch() {
        let mut m = model(2, 0, 0);
        m.ar_coeffs = vec![0.1];
        m.history = vec![1.0, 2.0];
        assert!(m.validate().is_err());
    }
}
