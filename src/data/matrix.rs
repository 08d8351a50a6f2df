//! Frame -> плотная матрица признаков
//!
//! Категории кодируются индексом уровня из train; неизвестные уровни и
//! пропуски становятся NaN и обрабатываются деревьями как пропуск.

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PriceError, Result};
use crate::frame::{ColumnData, Frame};
use crate::models::binning::MISSING_BIN;

/// Коды уровней должны быть меньше корзины пропусков
pub const MAX_CATEGORY_LEVELS: usize = MISSING_BIN as usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical { levels: Vec<String> },
}

impl FeatureKind {
    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureKind::Categorical { .. })
    }

    pub(crate) fn check_levels(&self, name: &str) -> Result<()> {
        match self {
            FeatureKind::Categorical { levels } if levels.len() >= MAX_CATEGORY_LEVELS => {
                Err(PriceError::Data(format!(
                    "column '{}' has {} categories, at most {} supported",
                    name,
                    levels.len(),
                    MAX_CATEGORY_LEVELS - 1
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

/// Порядок, типы и уровни категорий признаков модели
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub features: Vec<Feature>,
}

impl FeatureSchema {
    /// Схема по обучающему фрейму без целевой колонки
    pub fn from_frame(frame: &Frame, target: &str) -> Result<Self> {
        let features: Vec<Feature> = frame
            .columns()
            .iter()
            .filter(|c| c.name != target)
            .map(|c| {
                let kind = match &c.data {
                    ColumnData::Numeric(_) => FeatureKind::Numeric,
                    ColumnData::Text(values) => {
                        let mut levels: Vec<String> = values.iter().flatten().cloned().collect();
                        levels.sort();
                        levels.dedup();
                        FeatureKind::Categorical { levels }
                    }
                };
                Feature {
                    name: c.name.clone(),
                    kind,
                }
            })
            .collect();
        for feature in &features {
            feature.kind.check_levels(&feature.name)?;
        }
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.features.iter().map(|f| f.kind.clone()).collect()
    }

    pub fn categorical_names(&self) -> Vec<&str> {
        self.features
            .iter()
            .filter(|f| f.kind.is_categorical())
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn encode(&self, frame: &Frame) -> Result<Array2<f64>> {
        let missing: Vec<String> = self
            .features
            .iter()
            .filter(|f| !frame.has_column(&f.name))
            .map(|f| f.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(PriceError::SchemaMismatch {
                missing,
                unexpected: Vec::new(),
            });
        }

        let n = frame.n_rows();
        let mut X = Array2::from_elem((n, self.len()), f64::NAN);
        for (j, feature) in self.features.iter().enumerate() {
            match &feature.kind {
                FeatureKind::Numeric => {
                    for (i, v) in frame.numeric(&feature.name)?.into_iter().enumerate() {
                        if let Some(v) = v {
                            X[[i, j]] = v;
                        }
                    }
                }
                FeatureKind::Categorical { levels } => {
                    let values = frame.column(&feature.name)?;
                    for i in 0..n {
                        let code = values
                            .cell_string(i)
                            .and_then(|s| levels.binary_search(&s).ok());
                        if let Some(code) = code {
                            X[[i, j]] = code as f64;
                        }
                    }
                }
            }
        }
        Ok(X)
    }
}

/// Целевая колонка без пропусков
pub fn target_vector(frame: &Frame, target: &str) -> Result<Array1<f64>> {
    frame
        .numeric(target)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| PriceError::Data(format!("missing target '{}' in row {}", target, i))))
        .collect()
}

#[derive(Debug, Clone)]
pub struct TrainTestMatrices {
    pub schema: FeatureSchema,
    pub X_train: Array2<f64>,
    pub X_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Признаки и цель для train и test; уровни категорий берутся из train
pub fn train_test_matrices(train: &Frame, test: &Frame, target: &str) -> Result<TrainTestMatrices> {
    let schema = FeatureSchema::from_frame(train, target)?;
    if schema.is_empty() {
        return Err(PriceError::Data("no feature columns".to_string()));
    }
    Ok(TrainTestMatrices {
        X_train: schema.encode(train)?,
        X_test: schema.encode(test)?,
        y_train: target_vector(train, target)?,
        y_test: target_vector(test, target)?,
        schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    fn frame(districts: Vec<Option<&str>>, area: Vec<Option<f64>>) -> Frame {
        let target = vec![Some(12.0); area.len()];
        Frame::from_columns(vec![
            Column::text("Okrug", districts),
            Column::numeric("Obschaja_ploschad", area),
            Column::numeric("target", target),
        ])
        .unwrap()
    }

    #[test]
    fn test_schema_levels_from_train() {
        let train = frame(vec![Some("ЦАО"), Some("САО"), Some("ЦАО")], vec![Some(40.0); 3]);
        let schema = FeatureSchema::from_frame(&train, "target").unwrap();
        assert_eq!(schema.names(), vec!["Okrug", "Obschaja_ploschad"]);
        assert_eq!(
            schema.features[0].kind,
            FeatureKind::Categorical {
                levels: vec!["САО".to_string(), "ЦАО".to_string()]
            }
        );
    }

    #[test]
    fn test_unseen_category_and_missing_become_nan() {
        let train = frame(vec![Some("ЦАО"), Some("САО")], vec![Some(40.0), Some(50.0)]);
        let test = frame(vec![Some("ЗелАО"), Some("ЦАО")], vec![None, Some(55.0)]);
        let m = train_test_matrices(&train, &test, "target").unwrap();

        assert_eq!(m.X_train[[0, 0]], 1.0);
        assert!(m.X_test[[0, 0]].is_nan());
        assert!(m.X_test[[0, 1]].is_nan());
        assert_eq!(m.X_test[[1, 0]], 1.0);
        assert_eq!(m.y_test.len(), 2);
    }

    #[test]
    fn test_categorical_names() {
        let train = frame(vec![Some("ЦАО")], vec![Some(40.0)]);
        let schema = FeatureSchema::from_frame(&train, "target").unwrap();
        assert_eq!(schema.categorical_names(), vec!["Okrug"]);
    }

    #[test]
    fn test_too_many_levels_rejected() {
        let n = MAX_CATEGORY_LEVELS;
        let streets: Vec<Option<String>> = (0..n).map(|i| Some(format!("ул. {}", i))).collect();
        let mut train = Frame::from_columns(vec![
            Column::text("Ulitsa", streets),
            Column::numeric("target", vec![Some(12.0); n]),
        ])
        .unwrap();
        assert!(matches!(
            FeatureSchema::from_frame(&train, "target"),
            Err(PriceError::Data(_))
        ));

        // на один уровень меньше - код последнего уровня не совпадает с пропуском
        let mut keep = vec![true; n];
        keep[n - 1] = false;
        train.filter_rows(&keep);
        let schema = FeatureSchema::from_frame(&train, "target").unwrap();
        let X = schema.encode(&train).unwrap();
        let max_code = X.column(0).iter().fold(0.0f64, |m, v| m.max(*v));
        assert!((max_code as usize) < MISSING_BIN as usize);
    }

    #[test]
    fn test_encode_requires_all_features() {
        let train = frame(vec![Some("ЦАО")], vec![Some(40.0)]);
        let schema = FeatureSchema::from_frame(&train, "target").unwrap();
        let mut other = train.clone();
        other.drop_columns(&["Okrug"]).unwrap();
        assert!(matches!(
            schema.encode(&other),
            Err(PriceError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_schema_json() {
        let train = frame(vec![Some("ЦАО")], vec![Some(40.0)]);
        let schema = FeatureSchema::from_frame(&train, "target").unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains(r#""kind":"categorical""#));
        let back: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
