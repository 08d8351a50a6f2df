//! Flat price - модель цены квадратного метра квартир в Москве

pub mod config;
pub mod data;
pub mod error;
pub mod frame;
pub mod geo;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{PriceError, Result};
pub use frame::{Column, ColumnData, Frame};
pub use pipeline::{load_metrics, run_cross_validation, run_evaluation, run_training, EvaluationInput};
pub use types::{ApartmentInput, PriceEstimate};
