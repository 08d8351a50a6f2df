//! Градиентный бустинг деревьев для регрессии (квадратичная потеря)
//!
//! Начальный прогноз - среднее целевой. На каждой итерации: подвыборка строк
//! (`subsample`), подвыборка признаков (`colsample_bytree`), дерево по
//! градиентам, сжатие на `learning_rate`. Ранняя остановка по RMSE на
//! валидации: модель обрезается до лучшей итерации.

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::binning::BinnedMatrix;
use super::params::BoostingParams;
use super::tree::{Tree, TreeBuilder, TreeParams};
use crate::data::FeatureKind;
use crate::error::{PriceError, Result};

/// Валидационная выборка для ранней остановки
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub X: &'a Array2<f64>,
    pub y: &'a Array1<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FitOptions<'a> {
    pub eval: Option<EvalSet<'a>>,
    pub early_stopping_rounds: Option<usize>,
}

/// Итог обучения с наблюдателем
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitStatus {
    Completed,
    /// Наблюдатель остановил обучение на итерации
    Interrupted(usize),
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    mse.sqrt()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    params: BoostingParams,
    init_score: f64,
    trees: Vec<Tree>,
    n_features: usize,
    best_iteration: Option<usize>,
    best_score: Option<f64>,
}

impl GradientBoostingRegressor {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            init_score: 0.0,
            trees: Vec::new(),
            n_features: 0,
            best_iteration: None,
            best_score: None,
        }
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    /// RMSE на валидации для лучшей итерации
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn fit(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        kinds: &[FeatureKind],
        options: FitOptions<'_>,
    ) -> Result<()> {
        self.fit_with_monitor(X, y, kinds, options, |_, _| true)
            .map(|_| ())
    }

    /// `monitor(итерация, rmse)` вызывается после каждого дерева при наличии
    /// валидации; `false` прерывает обучение
    pub fn fit_with_monitor<F>(
        &mut self,
        X: &Array2<f64>,
        y: &Array1<f64>,
        kinds: &[FeatureKind],
        options: FitOptions<'_>,
        mut monitor: F,
    ) -> Result<FitStatus>
    where
        F: FnMut(usize, f64) -> bool,
    {
        self.params.validate()?;
        let n = X.nrows();
        if n == 0 {
            return Err(PriceError::Data("empty training set".to_string()));
        }
        if y.len() != n || kinds.len() != X.ncols() {
            return Err(PriceError::Data(format!(
                "shape mismatch: X {:?}, y {}, kinds {}",
                X.dim(),
                y.len(),
                kinds.len()
            )));
        }
        for (j, kind) in kinds.iter().enumerate() {
            kind.check_levels(&format!("#{}", j))?;
        }
        if let Some(eval) = options.eval {
            if eval.X.ncols() != X.ncols() || eval.X.nrows() != eval.y.len() {
                return Err(PriceError::Data("eval set shape mismatch".to_string()));
            }
        }

        let data = BinnedMatrix::fit(X, kinds, self.params.max_bin);
        let tree_params = TreeParams {
            num_leaves: self.params.num_leaves,
            max_depth: self.params.depth_limit(),
            min_child_samples: self.params.min_child_samples,
            reg_alpha: self.params.reg_alpha,
            reg_lambda: self.params.reg_lambda,
        };

        self.n_features = X.ncols();
        self.init_score = y.mean().unwrap_or(0.0);
        self.trees.clear();
        self.best_iteration = None;
        self.best_score = None;

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.random_state);
        let mut predictions = vec![self.init_score; n];
        let hessians = vec![1.0; n];
        let mut eval_predictions = options
            .eval
            .map(|e| vec![self.init_score; e.X.nrows()])
            .unwrap_or_default();
        let y_eval: Vec<f64> = options.eval.map(|e| e.y.to_vec()).unwrap_or_default();

        let mut best: Option<(usize, f64)> = None;
        let mut status = FitStatus::Completed;

        for iteration in 1..=self.params.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(p, t)| p - t).collect();
            let rows = self.subsample_rows(n, &mut rng);
            let features = self.colsample_features(X.ncols(), &mut rng);

            let mut tree =
                TreeBuilder::new(&data, &gradients, &hessians, &tree_params, &features).build(rows);
            tree.scale(self.params.learning_rate);

            for (i, p) in predictions.iter_mut().enumerate() {
                *p += tree.predict_row(X.row(i));
            }

            if let Some(eval) = options.eval {
                for (i, p) in eval_predictions.iter_mut().enumerate() {
                    *p += tree.predict_row(eval.X.row(i));
                }
            }
            self.trees.push(tree);

            if options.eval.is_none() {
                continue;
            }
            let score = rmse(&y_eval, &eval_predictions);

            if best.map_or(true, |(_, s)| score < s) {
                best = Some((iteration, score));
            }
            if !monitor(iteration, score) {
                status = FitStatus::Interrupted(iteration);
                break;
            }
            if let (Some(rounds), Some((best_iter, _))) = (options.early_stopping_rounds, best) {
                if iteration - best_iter >= rounds {
                    tracing::debug!(
                        "Early stopping at iteration {}, best iteration {}",
                        iteration,
                        best_iter
                    );
                    break;
                }
            }
        }

        if let Some((best_iter, score)) = best {
            if options.early_stopping_rounds.is_some() {
                self.trees.truncate(best_iter);
            }
            self.best_iteration = Some(best_iter);
            self.best_score = Some(score);
        }
        Ok(status)
    }

    fn subsample_rows(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.params.subsample < 1.0 {
            let sample_size = ((n as f64) * self.params.subsample).ceil().max(1.0) as usize;
            indices.shuffle(rng);
            indices.truncate(sample_size);
            indices.sort_unstable();
        }
        indices
    }

    fn colsample_features(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.params.colsample_bytree < 1.0 {
            let sample_size = ((n as f64) * self.params.colsample_bytree).ceil().max(1.0) as usize;
            indices.shuffle(rng);
            indices.truncate(sample_size);
            indices.sort_unstable();
        }
        indices
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(PriceError::Data("model not trained".to_string()));
        }
        if X.ncols() != self.n_features {
            return Err(PriceError::Data(format!(
                "expected {} features, got {}",
                self.n_features,
                X.ncols()
            )));
        }
        Ok(X.rows()
            .into_iter()
            .map(|row| self.init_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>())
            .collect())
    }

    /// Суммарный прирост разбиений по каждому признаку
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (feature, gain) in tree.split_gains() {
                importances[feature] += gain;
            }
        }
        importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// y = 2 * x0 + (x1 == 1 ? 3 : 0) + шум
    fn create_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut X = Array2::zeros((n, 2));
        let mut y = Array1::zeros(n);
        for i in 0..n {
            let x0: f64 = rng.gen_range(0.0..10.0);
            let x1 = rng.gen_range(0..3) as f64;
            X[[i, 0]] = x0;
            X[[i, 1]] = x1;
            y[i] = 2.0 * x0 + if x1 == 1.0 { 3.0 } else { 0.0 } + rng.gen_range(-0.1..0.1);
        }
        (X, y)
    }

    fn kinds() -> Vec<FeatureKind> {
        vec![
            FeatureKind::Numeric,
            FeatureKind::Categorical {
                levels: vec!["a".into(), "b".into(), "c".into()],
            },
        ]
    }

    fn params() -> BoostingParams {
        BoostingParams {
            n_estimators: 200,
            learning_rate: 0.1,
            num_leaves: 8,
            min_child_samples: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (X, y) = create_data(300, 1);
        let mut model = GradientBoostingRegressor::new(params());
        model.fit(&X, &y, &kinds(), FitOptions::default()).unwrap();

        let pred = model.predict(&X).unwrap();
        let score = rmse(y.as_slice().unwrap(), pred.as_slice().unwrap());
        assert!(score < 0.5, "train rmse {}", score);
        assert_eq!(model.n_trees(), 200);
    }

    #[test]
    fn test_early_stopping_truncates() {
        let (X, y) = create_data(300, 2);
        let (X_val, y_val) = create_data(100, 3);
        let mut model = GradientBoostingRegressor::new(BoostingParams {
            n_estimators: 2000,
            ..params()
        });
        let options = FitOptions {
            eval: Some(EvalSet { X: &X_val, y: &y_val }),
            early_stopping_rounds: Some(20),
        };
        model.fit(&X, &y, &kinds(), options).unwrap();

        let best = model.best_iteration().unwrap();
        assert_eq!(model.n_trees(), best);
        assert!(best < 2000);
        let pred = model.predict(&X_val).unwrap();
        let score = rmse(y_val.as_slice().unwrap(), pred.as_slice().unwrap());
        assert!((score - model.best_score().unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_monitor_interrupts() {
        let (X, y) = create_data(100, 4);
        let mut model = GradientBoostingRegressor::new(params());
        let options = FitOptions {
            eval: Some(EvalSet { X: &X, y: &y }),
            early_stopping_rounds: None,
        };
        let status = model
            .fit_with_monitor(&X, &y, &kinds(), options, |iteration, _| iteration < 5)
            .unwrap();
        assert_eq!(status, FitStatus::Interrupted(5));
        assert_eq!(model.n_trees(), 5);
    }

    #[test]
    fn test_subsample_is_deterministic() {
        let (X, y) = create_data(200, 5);
        let p = BoostingParams {
            subsample: 0.5,
            colsample_bytree: 0.5,
            random_state: 10,
            ..params()
        };
        let mut a = GradientBoostingRegressor::new(p.clone());
        let mut b = GradientBoostingRegressor::new(p);
        a.fit(&X, &y, &kinds(), FitOptions::default()).unwrap();
        b.fit(&X, &y, &kinds(), FitOptions::default()).unwrap();
        assert_eq!(a.predict(&X).unwrap(), b.predict(&X).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let (X, y) = create_data(300, 6);
        let mut model = GradientBoostingRegressor::new(params());
        model.fit(&X, &y, &kinds(), FitOptions::default()).unwrap();
        let importances = model.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > importances[1]);
        assert!(importances[1] > 0.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (X, y) = create_data(10, 7);
        let mut model = GradientBoostingRegressor::new(BoostingParams {
            learning_rate: 0.0,
            ..params()
        });
        assert!(matches!(
            model.fit(&X, &y, &kinds(), FitOptions::default()),
            Err(PriceError::InvalidHyperparameters(_))
        ));
    }
}
