//! Финальная модель цены за квадратный метр

#![allow(non_snake_case)]

use std::collections::BTreeSet;
use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::gradient_boosting::{EvalSet, FitOptions, GradientBoostingRegressor};
use super::metrics::Metrics;
use super::params::BoostingParams;
use crate::data::{target_vector, DatasetSplits, FeatureSchema};
use crate::error::{PriceError, Result};
use crate::frame::Frame;
use crate::storage;

/// Бустинг вместе со схемой признаков, на которых он обучен.
/// Предсказывает логарифм цены за квадрат.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceModel {
    target: String,
    schema: FeatureSchema,
    booster: GradientBoostingRegressor,
}

impl PriceModel {
    /// Обучение на `train` с ранней остановкой по `val`
    pub fn fit(
        train: &Frame,
        val: &Frame,
        target: &str,
        params: BoostingParams,
        early_stopping_rounds: usize,
    ) -> Result<Self> {
        let schema = FeatureSchema::from_frame(train, target)?;
        if schema.is_empty() {
            return Err(PriceError::Data("no feature columns".to_string()));
        }
        let X_train = schema.encode(train)?;
        let y_train = target_vector(train, target)?;
        let X_val = schema.encode(val)?;
        let y_val = target_vector(val, target)?;

        let mut booster = GradientBoostingRegressor::new(params);
        booster.fit(
            &X_train,
            &y_train,
            &schema.kinds(),
            FitOptions {
                eval: Some(EvalSet {
                    X: &X_val,
                    y: &y_val,
                }),
                early_stopping_rounds: Some(early_stopping_rounds),
            },
        )?;
        tracing::info!(
            "Model trained: {} trees, best iteration {:?}, val RMSE {:?}",
            booster.n_trees(),
            booster.best_iteration(),
            booster.best_score()
        );

        Ok(Self {
            target: target.to_string(),
            schema,
            booster,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn booster(&self) -> &GradientBoostingRegressor {
        &self.booster
    }

    /// Набор колонок (кроме целевой) должен совпадать с признаками модели
    fn check_columns(&self, frame: &Frame) -> Result<()> {
        let expected: BTreeSet<String> = self.schema.names().into_iter().map(String::from).collect();
        let actual: BTreeSet<String> = frame
            .column_names()
            .into_iter()
            .filter(|c| *c != self.target)
            .collect();
        if expected != actual {
            return Err(PriceError::SchemaMismatch {
                missing: expected.difference(&actual).cloned().collect(),
                unexpected: actual.difference(&expected).cloned().collect(),
            });
        }
        Ok(())
    }

    /// Предсказание в лог-шкале
    pub fn predict_log(&self, frame: &Frame) -> Result<Array1<f64>> {
        self.check_columns(frame)?;
        let X = self.schema.encode(frame)?;
        self.booster.predict(&X)
    }

    /// Цена за квадрат, руб.
    pub fn predict(&self, frame: &Frame) -> Result<Vec<f64>> {
        Ok(self.predict_log(frame)?.iter().map(|v| v.exp()).collect())
    }

    /// Суммарный прирост по разбиениям, по убыванию
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let mut importances: Vec<(String, f64)> = self
            .schema
            .names()
            .into_iter()
            .map(String::from)
            .zip(self.booster.feature_importances())
            .collect();
        importances.sort_by(|a, b| b.1.total_cmp(&a.1));
        importances
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        storage::save_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        storage::load_json(path)
    }
}

/// Обучение на train_val/val и метрики на test в исходной шкале
pub fn train_model(
    splits: &DatasetSplits,
    target: &str,
    params: BoostingParams,
    early_stopping_rounds: usize,
) -> Result<(PriceModel, Metrics)> {
    params.validate()?;
    let model = PriceModel::fit(
        &splits.train_val,
        &splits.val,
        target,
        params,
        early_stopping_rounds,
    )?;

    let y_test: Vec<f64> = target_vector(&splits.test, target)?
        .iter()
        .map(|v| v.exp())
        .collect();
    let pred = model.predict(&splits.test)?;
    let metrics = Metrics::compute(&y_test, &pred, model.schema().len())?;
    tracing::info!("Test metrics: {:?}", metrics);
    Ok((model, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::split_dataset;
    use crate::frame::Column;

    fn frame(n: usize) -> Frame {
        let area: Vec<Option<f64>> = (0..n).map(|i| Some(30.0 + (i % 40) as f64)).collect();
        let district: Vec<Option<&str>> = (0..n)
            .map(|i| Some(if i % 2 == 0 { "ЦАО" } else { "САО" }))
            .collect();
        let target: Vec<Option<f64>> = (0..n)
            .map(|i| Some(12.0 + if i % 2 == 0 { 0.3 } else { 0.0 } + (i % 40) as f64 / 400.0))
            .collect();
        Frame::from_columns(vec![
            Column::numeric("Obschaja_ploschad", area),
            Column::text("Okrug", district),
            Column::numeric("target", target),
        ])
        .unwrap()
    }

    fn params() -> BoostingParams {
        BoostingParams {
            n_estimators: 150,
            learning_rate: 0.1,
            num_leaves: 8,
            min_child_samples: 5,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn test_train_model_metrics() {
        let splits = split_dataset(&frame(300), 0.2, 0.16, 3).unwrap();
        let (model, metrics) = train_model(&splits, "target", params(), 20).unwrap();

        assert!(model.booster().n_trees() > 0);
        // средняя цена около 190 тыс., ошибка должна быть небольшой
        assert!(metrics.mape < 5.0, "{:?}", metrics);
        assert!(metrics.rmsle.is_some());

        let importances = model.feature_importances();
        assert_eq!(importances[0].0, "Okrug");
    }

    #[test]
    fn test_predict_rejects_other_columns() {
        let splits = split_dataset(&frame(100), 0.2, 0.2, 3).unwrap();
        let (model, _) = train_model(&splits, "target", params(), 10).unwrap();

        let mut extra = splits.test.clone();
        extra
            .set_column("Lishnij", crate::frame::ColumnData::Numeric(vec![None; extra.n_rows()]))
            .unwrap();
        match model.predict(&extra) {
            Err(PriceError::SchemaMismatch { unexpected, missing }) => {
                assert_eq!(unexpected, vec!["Lishnij".to_string()]);
                assert!(missing.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // целевая колонка на входе не обязательна
        let mut no_target = splits.test.clone();
        no_target.drop_columns(&["target"]).unwrap();
        assert_eq!(model.predict(&no_target).unwrap().len(), splits.test.n_rows());
    }

    #[test]
    fn test_save_load_same_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let splits = split_dataset(&frame(100), 0.2, 0.2, 3).unwrap();
        let (model, _) = train_model(&splits, "target", params(), 10).unwrap();
        model.save(&path).unwrap();

        let loaded = PriceModel::load(&path).unwrap();
        let before = model.predict_log(&splits.test).unwrap();
        let after = loaded.predict_log(&splits.test).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_invalid_params() {
        let splits = split_dataset(&frame(50), 0.2, 0.2, 3).unwrap();
        let params = BoostingParams {
            learning_rate: -1.0,
            ..params()
        };
        assert!(matches!(
            train_model(&splits, "target", params, 10),
            Err(PriceError::InvalidHyperparameters(_))
        ));
    }
}
