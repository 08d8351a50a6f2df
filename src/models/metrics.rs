//! Метрики качества модели на исходной шкале цены

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PriceError, Result};
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Нет значения, если есть неположительные цены
    #[serde(rename = "RMSLE")]
    pub rmsle: Option<f64>,
    /// Нет значения, если наблюдений не больше, чем признаков + 1
    #[serde(rename = "R2_adjusted")]
    pub r2_adjusted: Option<f64>,
    #[serde(rename = "MPE_%")]
    pub mpe: f64,
    #[serde(rename = "MAPE_%")]
    pub mape: f64,
    #[serde(rename = "WAPE_%")]
    pub wape: f64,
}

pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// sqrt(mean((ln(1 + p) - ln(1 + t))^2))
pub fn rmsle(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    if y_true.iter().chain(y_pred).any(|v| *v <= 0.0) {
        return Err(PriceError::MetricUndefined("RMSLE"));
    }
    let log_true: Vec<f64> = y_true.iter().map(|v| v.ln_1p()).collect();
    let log_pred: Vec<f64> = y_pred.iter().map(|v| v.ln_1p()).collect();
    Ok(mse(&log_true, &log_pred).sqrt())
}

/// 1 - (1 - R2)(n - 1)/(n - p - 1)
pub fn r2_adjusted(y_true: &[f64], y_pred: &[f64], n_features: usize) -> Result<f64> {
    let n = y_true.len();
    if n <= n_features + 1 {
        return Err(PriceError::MetricUndefined("R2_adjusted"));
    }
    let mean = y_true.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err(PriceError::MetricUndefined("R2_adjusted"));
    }
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let r2 = 1.0 - ss_res / ss_tot;
    Ok(1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - n_features as f64 - 1.0))
}

fn recovered(metric: Result<f64>) -> Option<f64> {
    match metric {
        Ok(value) => Some(round_to(value, 3)),
        Err(e) => {
            tracing::warn!("{}", e);
            None
        }
    }
}

impl Metrics {
    /// Метрики по реальным и предсказанным ценам; `n_features` для adjusted R2
    pub fn compute(y_true: &[f64], y_pred: &[f64], n_features: usize) -> Result<Self> {
        if y_true.is_empty() || y_true.len() != y_pred.len() {
            return Err(PriceError::Data(format!(
                "metrics need equal non-empty inputs, got {} and {}",
                y_true.len(),
                y_pred.len()
            )));
        }
        let n = y_true.len() as f64;
        let mse_value = mse(y_true, y_pred);

        let mpe = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p) / t)
            .sum::<f64>()
            / n
            * 100.0;
        let mape = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| ((p - t) / t).abs())
            .sum::<f64>()
            / n
            * 100.0;
        let abs_error: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (p - t).abs()).sum();
        let wape = abs_error / y_true.iter().sum::<f64>() * 100.0;

        Ok(Self {
            mae: round_to(mae(y_true, y_pred), 3),
            mse: round_to(mse_value, 3),
            rmse: round_to(mse_value.sqrt(), 3),
            rmsle: recovered(rmsle(y_true, y_pred)),
            r2_adjusted: recovered(r2_adjusted(y_true, y_pred, n_features)),
            mpe: round_to(mpe, 3),
            mape: round_to(mape, 3),
            wape: round_to(wape, 3),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        storage::save_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        storage::load_json(path)
    }
}
