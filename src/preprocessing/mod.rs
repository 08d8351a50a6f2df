/// Модуль предобработки данных

pub mod catalog;
pub mod cleaning;
pub mod feature_engineering;
pub mod imputation;
pub mod parsing;
pub mod translit;

pub use catalog::UniqueValuesCatalog;
pub use cleaning::{Mode, Preprocessor};
pub use feature_engineering::FeatureEngineer;
