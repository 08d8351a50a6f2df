/// Разбиение датасета и подготовка матриц для модели

pub mod matrix;
pub mod split;

pub use matrix::{target_vector, train_test_matrices, FeatureKind, FeatureSchema, TrainTestMatrices};
pub use split::{split_dataset, train_test_split, DatasetSplits};
