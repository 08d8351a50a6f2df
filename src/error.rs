//! Ошибки пайплайна

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PriceError>;

#[derive(Error, Debug)]
pub enum PriceError {
    /// Нет обязательной колонки в сырых данных
    #[error("Schema error: column '{0}' is missing")]
    Schema(String),

    /// Набор признаков на инференсе не совпадает с train
    #[error("Schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Источник для заполнения пропусков пуст целиком
    #[error("Imputation source '{0}' has no values")]
    ImputationDegenerate(String),

    #[error("Geocoding failed for '{0}'")]
    GeocodeFailure(String),

    #[error("Metric {0} is undefined for the given values")]
    MetricUndefined(&'static str),

    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
