//! Гиперпараметры градиентного бустинга
//!
//! Имена полей совпадают с именами в JSON лучших параметров.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PriceError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoostingParams {
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default)]
    pub random_state: u64,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// <= 0 - без ограничения глубины
    pub max_depth: i32,
    pub min_child_samples: usize,
    /// Доля строк для каждого дерева
    pub subsample: f64,
    /// Доля признаков для каждого дерева
    pub colsample_bytree: f64,
    /// L1
    pub reg_alpha: f64,
    /// L2
    pub reg_lambda: f64,
    #[serde(default = "default_max_bin")]
    pub max_bin: usize,
}

fn default_metric() -> String {
    "rmse".to_string()
}

fn default_max_bin() -> usize {
    255
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            random_state: 0,
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: -1,
            min_child_samples: 20,
            subsample: 1.0,
            colsample_bytree: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            max_bin: default_max_bin(),
        }
    }
}

fn invalid(message: String) -> PriceError {
    PriceError::InvalidHyperparameters(message)
}

impl BoostingParams {
    pub fn validate(&self) -> Result<()> {
        if self.metric != "rmse" {
            return Err(invalid(format!("unsupported metric '{}'", self.metric)));
        }
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid(format!("learning_rate {}", self.learning_rate)));
        }
        if self.num_leaves < 2 {
            return Err(invalid(format!("num_leaves {} < 2", self.num_leaves)));
        }
        if self.min_child_samples == 0 {
            return Err(invalid("min_child_samples must be positive".to_string()));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0, 1], got {}", name, value)));
            }
        }
        for (name, value) in [("reg_alpha", self.reg_alpha), ("reg_lambda", self.reg_lambda)] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(format!("{} must be non-negative, got {}", name, value)));
            }
        }
        if !(2..=u16::MAX as usize).contains(&self.max_bin) {
            return Err(invalid(format!("max_bin {}", self.max_bin)));
        }
        Ok(())
    }

    /// Ограничение глубины дерева, если задано
    pub fn depth_limit(&self) -> Option<usize> {
        (self.max_depth > 0).then_some(self.max_depth as usize)
    }

    /// Чтение JSON; неизвестные ключи и неверные значения -> InvalidHyperparameters
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let params: BoostingParams =
            serde_json::from_str(&json).map_err(|e| invalid(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::storage::save_json(self, path)
    }
}
