//! Подбор гиперпараметров: случайный поиск по сетке значений,
//! k-fold на train, отсечение неперспективных испытаний по медиане.

#![allow(non_snake_case)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::cross_validation::{fit_fold, KFold};
use super::params::BoostingParams;
use crate::data::FeatureKind;
use crate::error::{PriceError, Result};
use crate::storage;

const COLSAMPLE: [f64; 8] = [0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
const SUBSAMPLE: [f64; 6] = [0.4, 0.5, 0.6, 0.7, 0.8, 1.0];
const LEARNING_RATE: [f64; 6] = [0.006, 0.008, 0.01, 0.014, 0.017, 0.02];
const MAX_DEPTH: [i32; 3] = [10, 20, 100];

/// Пространство поиска
#[derive(Debug, Clone)]
pub struct SearchSpace {
    pub random_state: u64,
    pub n_estimators: usize,
    pub reg_range: (f64, f64),
    pub num_leaves: (usize, usize),
    pub min_child_samples: (usize, usize),
}

impl SearchSpace {
    pub fn new(random_state: u64, n_estimators: usize) -> Self {
        Self {
            random_state,
            n_estimators,
            reg_range: (1e-3, 10.0),
            num_leaves: (20, 1000),
            min_child_samples: (1, 300),
        }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> BoostingParams {
        BoostingParams {
            metric: "rmse".to_string(),
            random_state: self.random_state,
            n_estimators: self.n_estimators,
            reg_alpha: log_uniform(rng, self.reg_range),
            reg_lambda: log_uniform(rng, self.reg_range),
            colsample_bytree: choose(rng, &COLSAMPLE),
            subsample: choose(rng, &SUBSAMPLE),
            learning_rate: choose(rng, &LEARNING_RATE),
            max_depth: choose(rng, &MAX_DEPTH),
            num_leaves: rng.gen_range(self.num_leaves.0..=self.num_leaves.1),
            min_child_samples: rng.gen_range(self.min_child_samples.0..=self.min_child_samples.1),
            ..BoostingParams::default()
        }
    }
}

fn log_uniform<R: Rng>(rng: &mut R, (low, high): (f64, f64)) -> f64 {
    rng.gen_range(low.ln()..=high.ln()).exp().clamp(low, high)
}

fn choose<R: Rng, T: Copy>(rng: &mut R, values: &[T]) -> T {
    // списки констант не пустые
    *values.choose(rng).unwrap_or(&values[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialState {
    Complete,
    Pruned,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub params: BoostingParams,
    /// Средний MAE по фолдам (только для завершенных)
    pub value: Option<f64>,
    pub state: TrialState,
    pub duration_secs: f64,
    /// RMSE на валидации по итерациям бустинга, среднее по фолдам
    #[serde(default)]
    pub intermediate_values: BTreeMap<usize, f64>,
}

/// История подбора (минимизация)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    pub trials: Vec<Trial>,
    pub best_trial: Option<usize>,
    pub total_duration_secs: f64,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trial(&mut self, trial: Trial) {
        let idx = self.trials.len();
        if let (TrialState::Complete, Some(value)) = (trial.state, trial.value) {
            let is_better = self
                .best_value()
                .map_or(true, |best| value < best);
            if is_better {
                self.best_trial = Some(idx);
            }
        }
        self.trials.push(trial);
    }

    pub fn best(&self) -> Option<&Trial> {
        self.best_trial.and_then(|idx| self.trials.get(idx))
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best().and_then(|t| t.value)
    }

    pub fn best_params(&self) -> Option<&BoostingParams> {
        self.best().map(|t| &t.params)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(|t| t.state == TrialState::Complete)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        storage::save_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        storage::load_json(path)
    }
}

/// Отсечение по медиане промежуточных значений завершенных испытаний
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianPruner {
    n_startup_trials: usize,
    n_warmup_steps: usize,
}

impl Default for MedianPruner {
    fn default() -> Self {
        Self {
            n_startup_trials: 5,
            n_warmup_steps: 0,
        }
    }
}

impl MedianPruner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_n_warmup_steps(mut self, n: usize) -> Self {
        self.n_warmup_steps = n;
        self
    }

    pub fn should_prune(&self, study: &Study, step: usize, value: f64) -> bool {
        if step < self.n_warmup_steps {
            return false;
        }
        let completed: Vec<&Trial> = study.completed().collect();
        if completed.len() < self.n_startup_trials {
            return false;
        }
        let mut values: Vec<f64> = completed
            .iter()
            .filter_map(|t| t.intermediate_values.get(&step).copied())
            .collect();
        if values.is_empty() {
            return false;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };
        value > median
    }
}

/// Промежуточные значения испытания: среднее по фолдам на каждом шаге
#[derive(Debug, Default)]
struct StepMeans {
    sums: BTreeMap<usize, (f64, usize)>,
}

impl StepMeans {
    /// Добавляет значение фолда и возвращает текущее среднее на шаге
    fn record(&mut self, step: usize, value: f64) -> f64 {
        let (sum, count) = self.sums.entry(step).or_insert((0.0, 0));
        *sum += value;
        *count += 1;
        *sum / *count as f64
    }

    fn into_values(self) -> BTreeMap<usize, f64> {
        self.sums
            .into_iter()
            .map(|(step, (sum, count))| (step, sum / count as f64))
            .collect()
    }
}

/// Последовательный подбор параметров
#[derive(Debug, Clone)]
pub struct HyperparameterSearch {
    space: SearchSpace,
    n_trials: usize,
    n_folds: usize,
    early_stopping_rounds: usize,
    seed: u64,
    pruner: MedianPruner,
}

impl HyperparameterSearch {
    pub fn new(space: SearchSpace, n_trials: usize, n_folds: usize, seed: u64) -> Self {
        Self {
            space,
            n_trials,
            n_folds,
            early_stopping_rounds: 100,
            seed,
            pruner: MedianPruner::default(),
        }
    }

    pub fn with_early_stopping_rounds(mut self, rounds: usize) -> Self {
        self.early_stopping_rounds = rounds;
        self
    }

    pub fn with_pruner(mut self, pruner: MedianPruner) -> Self {
        self.pruner = pruner;
        self
    }

    /// Испытания на train; ошибка, если ни одно не завершилось
    pub fn run(&self, X: &Array2<f64>, y: &Array1<f64>, kinds: &[FeatureKind]) -> Result<Study> {
        let start = Instant::now();
        let folds = KFold::new(self.n_folds, self.seed).split(X.nrows())?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut study = Study::new();

        for number in 0..self.n_trials {
            let trial_start = Instant::now();
            let params = self.space.sample(&mut rng);
            let mut steps = StepMeans::default();
            let mut fold_mae = Vec::with_capacity(folds.len());
            let mut state = TrialState::Complete;

            for split in &folds {
                let fitted = fit_fold(
                    &params,
                    X,
                    y,
                    kinds,
                    split,
                    self.early_stopping_rounds,
                    |step, value| {
                        let mean = steps.record(step, value);
                        !self.pruner.should_prune(&study, step, mean)
                    },
                );
                match fitted {
                    Ok(Some((_, score))) => fold_mae.push(score),
                    Ok(None) => {
                        state = TrialState::Pruned;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Trial {} failed: {}", number, e);
                        state = TrialState::Failed;
                        break;
                    }
                }
            }

            let value = match state {
                TrialState::Complete => Some(fold_mae.iter().sum::<f64>() / fold_mae.len() as f64),
                _ => None,
            };
            match value {
                Some(v) => tracing::info!("Trial {} finished with MAE {:.3}", number, v),
                None => tracing::info!("Trial {} {:?}", number, state),
            }
            study.add_trial(Trial {
                number,
                params,
                value,
                state,
                duration_secs: trial_start.elapsed().as_secs_f64(),
                intermediate_values: steps.into_values(),
            });
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();
        match study.best() {
            Some(best) => tracing::info!(
                "Best trial {} with MAE {:.3}",
                best.number,
                best.value.unwrap_or(f64::NAN)
            ),
            None => return Err(PriceError::Data("no trial completed".to_string())),
        }
        Ok(study)
    }
}
