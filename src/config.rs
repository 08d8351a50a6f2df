//! Конфигурация пайплайна (YAML)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PriceError, Result};

/// Переменная окружения с ключом геокодера, перекрывает значение из файла
pub const API_KEY_ENV: &str = "YANDEX_GEOCODER_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub preprocessing: PreprocessingConfig,
    pub train: TrainConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessingConfig {
    /// Сырые объявления
    pub raw_path: PathBuf,
    /// Датасет после очистки
    pub clean_path: PathBuf,
    /// Датасет после геокодирования
    pub full_path: PathBuf,
    pub train_path_proc: PathBuf,
    pub test_path_proc: PathBuf,
    /// Словарь "Москва, метро ..." -> [широта, долгота]
    pub metro_path: PathBuf,
    /// Словарь адрес -> [широта, долгота]
    pub address_path: PathBuf,
    #[serde(default)]
    pub api_key: String,
    pub lat_center: f64,
    pub lon_center: f64,
    pub test_size: f64,
    pub val_size: f64,
    pub random_state: u64,
    #[serde(default = "default_geocode_delay")]
    pub geocode_min_delay_ms: u64,
    #[serde(default = "default_geocode_timeout")]
    pub geocode_timeout_ms: u64,
    /// Малоинформативные сырые колонки
    #[serde(default = "default_raw_drop")]
    pub drop_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    pub target_column: String,
    /// Колонки, удаляемые только при обучении (до словаря уникальных значений)
    pub drop_columns_unique: Vec<String>,
    /// Колонки, удаляемые перед подачей в модель
    pub drop_columns: Vec<String>,
    #[serde(default = "default_n_folds")]
    pub n_folds: usize,
    pub n_trials: usize,
    #[serde(default = "default_early_stopping")]
    pub early_stopping_rounds: usize,
    /// Число деревьев в пространстве поиска (до ранней остановки)
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    pub model_path: PathBuf,
    pub study_path: PathBuf,
    pub params_path: PathBuf,
    pub metrics_path: PathBuf,
    pub metrics_cross_path: PathBuf,
    pub unique_values_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

fn default_geocode_delay() -> u64 { 500 }
fn default_geocode_timeout() -> u64 { 1000 }
fn default_n_folds() -> usize { 5 }
fn default_early_stopping() -> usize { 100 }
fn default_n_estimators() -> usize { 1000 }

pub(crate) fn default_raw_drop() -> Vec<String> {
    [
        "Газоснабжение",
        "Год сдачи",
        "Дом",
        "Строительная серия",
        "Аварийность",
        "Подъезды",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Чтение и проверка конфигурации
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml(&text)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.preprocessing.api_key = key;
        }
        tracing::debug!("Config loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.preprocessing;
        let t = &self.train;

        for (name, value) in [("test_size", p.test_size), ("val_size", p.val_size)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(PriceError::Config(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if t.n_folds < 2 {
            return Err(PriceError::Config(format!(
                "n_folds must be at least 2, got {}",
                t.n_folds
            )));
        }
        if t.n_trials == 0 {
            return Err(PriceError::Config("n_trials must be positive".to_string()));
        }
        if t.n_estimators == 0 {
            return Err(PriceError::Config("n_estimators must be positive".to_string()));
        }
        if t.early_stopping_rounds == 0 {
            return Err(PriceError::Config(
                "early_stopping_rounds must be positive".to_string(),
            ));
        }
        if t.target_column.trim().is_empty() {
            return Err(PriceError::Config("target_column is empty".to_string()));
        }
        if !(-90.0..=90.0).contains(&p.lat_center) || !(-180.0..=180.0).contains(&p.lon_center) {
            return Err(PriceError::Config("center coordinates out of range".to_string()));
        }
        Ok(())
    }
}
