/// Модели: градиентный бустинг, подбор параметров, кросс-валидация, метрики

pub mod binning;
pub mod cross_validation;
pub mod gradient_boosting;
pub mod metrics;
pub mod params;
pub mod search;
pub mod trainer;
pub mod tree;

pub use cross_validation::{cross_validate, CrossValidationReport, KFold};
pub use gradient_boosting::{GradientBoostingRegressor, FitOptions, EvalSet};
pub use metrics::Metrics;
pub use params::BoostingParams;
pub use search::{HyperparameterSearch, MedianPruner, SearchSpace, Study};
pub use trainer::{train_model, PriceModel};
