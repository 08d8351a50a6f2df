//! K-fold разбиение и кросс-валидация лучших параметров

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::gradient_boosting::{EvalSet, FitOptions, FitStatus, GradientBoostingRegressor};
use super::metrics::{mae, round_to, Metrics};
use super::params::BoostingParams;
use crate::data::{FeatureKind, TrainTestMatrices};
use crate::error::{PriceError, Result};

/// Индексы одного фолда
#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub fold: usize,
    pub train_indices: Vec<usize>,
    pub valid_indices: Vec<usize>,
}

/// K-fold с перемешиванием
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<FoldSplit>> {
        if self.n_splits < 2 || n_samples < self.n_splits {
            return Err(PriceError::Data(format!(
                "cannot split {} samples into {} folds",
                n_samples, self.n_splits
            )));
        }
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        // первые n % k фолдов на один элемент больше
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut start = 0;
        let mut folds = Vec::with_capacity(self.n_splits);
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let mut valid_indices = indices[start..start + size].to_vec();
            let mut train_indices: Vec<usize> = indices[..start]
                .iter()
                .chain(&indices[start + size..])
                .copied()
                .collect();
            valid_indices.sort_unstable();
            train_indices.sort_unstable();
            folds.push(FoldSplit {
                fold,
                train_indices,
                valid_indices,
            });
            start += size;
        }
        Ok(folds)
    }
}

/// Обучение на фолде с ранней остановкой по валидационной части
pub(crate) fn fit_fold<F>(
    params: &BoostingParams,
    X: &Array2<f64>,
    y: &Array1<f64>,
    kinds: &[FeatureKind],
    split: &FoldSplit,
    early_stopping_rounds: usize,
    monitor: F,
) -> Result<Option<(GradientBoostingRegressor, f64)>>
where
    F: FnMut(usize, f64) -> bool,
{
    let X_train = X.select(Axis(0), &split.train_indices);
    let y_train = y.select(Axis(0), &split.train_indices);
    let X_valid = X.select(Axis(0), &split.valid_indices);
    let y_valid = y.select(Axis(0), &split.valid_indices);

    let mut model = GradientBoostingRegressor::new(params.clone());
    let options = FitOptions {
        eval: Some(EvalSet {
            X: &X_valid,
            y: &y_valid,
        }),
        early_stopping_rounds: Some(early_stopping_rounds),
    };
    let status = model.fit_with_monitor(&X_train, &y_train, kinds, options, monitor)?;
    if status != FitStatus::Completed {
        return Ok(None);
    }

    let valid_pred = model.predict(&X_valid)?;
    let score = mae(&exp_vec(&y_valid), &exp_vec(&valid_pred));
    Ok(Some((model, score)))
}

pub(crate) fn exp_vec(values: &Array1<f64>) -> Vec<f64> {
    values.iter().map(|v| v.exp()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    /// MAE на отложенной части каждого фолда
    pub fold_mae: Vec<f64>,
    pub oof_mae: f64,
    pub holdout_mae: f64,
    /// |OOF - holdout| / holdout, %
    pub overfit: f64,
    pub metrics: Metrics,
}

/// |OOF - holdout| / holdout * 100, округление до сотых
pub fn overfit_percent(oof_mae: f64, holdout_mae: f64) -> Result<f64> {
    if holdout_mae == 0.0 {
        return Err(PriceError::Data("holdout MAE is zero, overfit undefined".to_string()));
    }
    Ok(round_to(((oof_mae - holdout_mae) / holdout_mae).abs() * 100.0, 2))
}

/// Кросс-валидация на train; предсказания test усредняются по моделям фолдов
pub fn cross_validate(
    data: &TrainTestMatrices,
    params: &BoostingParams,
    n_folds: usize,
    seed: u64,
    early_stopping_rounds: usize,
) -> Result<CrossValidationReport> {
    params.validate()?;
    let kinds = data.schema.kinds();
    let folds = KFold::new(n_folds, seed).split(data.X_train.nrows())?;

    let mut fold_mae = Vec::with_capacity(folds.len());
    let mut test_pred = vec![0.0; data.X_test.nrows()];
    for split in &folds {
        let (model, score) = fit_fold(
            params,
            &data.X_train,
            &data.y_train,
            &kinds,
            split,
            early_stopping_rounds,
            |_, _| true,
        )?
        .ok_or_else(|| PriceError::Data(format!("fold {} interrupted", split.fold)))?;

        tracing::info!(
            "Fold {}: best iteration {:?}, MAE {:.3}",
            split.fold + 1,
            model.best_iteration(),
            score
        );
        fold_mae.push(score);

        let pred = model.predict(&data.X_test)?;
        for (acc, p) in test_pred.iter_mut().zip(pred.iter()) {
            *acc += p.exp() / folds.len() as f64;
        }
    }

    let y_test_exp = exp_vec(&data.y_test);
    let oof_mae = fold_mae.iter().sum::<f64>() / fold_mae.len() as f64;
    let holdout_mae = mae(&y_test_exp, &test_pred);
    let overfit = overfit_percent(oof_mae, holdout_mae)?;
    let metrics = Metrics::compute(&y_test_exp, &test_pred, data.schema.len())?;

    tracing::info!("MAE mean OOF: {:.3}, holdout: {:.3}, overfit {}%", oof_mae, holdout_mae, overfit);
    Ok(CrossValidationReport {
        fold_mae,
        oof_mae,
        holdout_mae,
        overfit,
        metrics,
    })
}
