//! Сквозные сценарии: обучение, предсказание, кросс-валидация

use std::path::PathBuf;

use crate::config::{Config, TrainConfig};
use crate::data::{split_dataset, train_test_matrices};
use crate::error::{PriceError, Result};
use crate::frame::Frame;
use crate::geo::GeoResolver;
use crate::models::{
    cross_validate, train_model, BoostingParams, HyperparameterSearch, Metrics, PriceModel,
    SearchSpace, Study,
};
use crate::preprocessing::{FeatureEngineer, Preprocessor, UniqueValuesCatalog};

/// Данные для предсказания
#[derive(Debug, Clone)]
pub enum EvaluationInput {
    /// CSV в формате сырых объявлений
    Path(PathBuf),
    Frame(Frame),
}

fn feature_engineer(train: &TrainConfig) -> FeatureEngineer {
    FeatureEngineer::new(train.drop_columns_unique.clone(), train.drop_columns.clone())
}

/// Полный цикл: очистка, геоданные, признаки, подбор параметров, обучение.
/// `top_params = true` - параметры берутся из сохраненного файла без подбора.
pub fn run_training(config: &Config, top_params: bool) -> Result<()> {
    let p = &config.preprocessing;
    let t = &config.train;

    let raw = Frame::read_csv_path(&p.raw_path)?;
    tracing::info!("Raw dataset: {} rows, {} columns", raw.n_rows(), raw.n_cols());

    let clean = Preprocessor::new(p.drop_columns.clone()).fit(
        raw,
        &t.drop_columns_unique,
        &t.unique_values_path,
    )?;
    clean.write_csv_path(&p.clean_path)?;

    let full = GeoResolver::from_tables(p)?.resolve(clean)?;
    full.write_csv_path(&p.full_path)?;

    let data = feature_engineer(t).transform(full, true)?;
    let splits = split_dataset(&data, p.test_size, p.val_size, p.random_state)?;
    splits.train.write_csv_path(&p.train_path_proc)?;
    splits.test.write_csv_path(&p.test_path_proc)?;

    let params = if top_params {
        match Study::load(&t.study_path) {
            Ok(study) => tracing::info!(
                "Using saved params, study best MAE {:?} over {} trials",
                study.best_value(),
                study.trials.len()
            ),
            Err(e) => tracing::warn!("Saved study not available: {}", e),
        }
        BoostingParams::load(&t.params_path)?
    } else {
        let matrices = train_test_matrices(&splits.train, &splits.test, &t.target_column)?;
        let search = HyperparameterSearch::new(
            SearchSpace::new(p.random_state, t.n_estimators),
            t.n_trials,
            t.n_folds,
            p.random_state,
        )
        .with_early_stopping_rounds(t.early_stopping_rounds);
        let study = search.run(&matrices.X_train, &matrices.y_train, &matrices.schema.kinds())?;
        study.save(&t.study_path)?;

        let best = study
            .best_params()
            .cloned()
            .ok_or_else(|| PriceError::Data("study has no completed trials".to_string()))?;
        best.save(&t.params_path)?;
        best
    };

    let (model, metrics) = train_model(&splits, &t.target_column, params, t.early_stopping_rounds)?;
    metrics.save(&t.metrics_path)?;
    model.save(&t.model_path)?;
    tracing::info!("Training finished, MAE {:.3}", metrics.mae);
    Ok(())
}

/// Предсказание цены за квадрат, руб.
///
/// `manual = true`: строки уже в очищенном виде (форма ввода), координаты
/// запрашиваются у геокодера. Иначе - сырые объявления, предобработка и
/// координаты из словарей.
pub fn run_evaluation(config: &Config, input: EvaluationInput, manual: bool) -> Result<Vec<f64>> {
    let p = &config.preprocessing;
    let t = &config.train;

    let frame = match input {
        EvaluationInput::Path(path) => Frame::read_csv_path(path)?,
        EvaluationInput::Frame(frame) => frame,
    };

    let (frame, resolver) = if manual {
        (frame, GeoResolver::live(p)?)
    } else {
        let catalog = UniqueValuesCatalog::load(&t.unique_values_path)?;
        let clean = Preprocessor::new(p.drop_columns.clone()).transform(frame, &catalog)?;
        (clean, GeoResolver::from_tables(p)?)
    };

    let features = feature_engineer(t).transform(resolver.resolve(frame)?, false)?;
    let model = PriceModel::load(&t.model_path)?;
    let predictions = model.predict(&features)?;
    tracing::info!("Predicted {} rows", predictions.len());
    Ok(predictions)
}

/// Кросс-валидация лучших параметров на сохраненных train/test; возвращает переобучение, %
pub fn run_cross_validation(config: &Config) -> Result<f64> {
    let p = &config.preprocessing;
    let t = &config.train;

    // типы колонок берутся из схемы обученной модели
    let model = PriceModel::load(&t.model_path)?;
    let text = model.schema().categorical_names();
    let train = Frame::read_csv_path_with_text(&p.train_path_proc, &text)?;
    let test = Frame::read_csv_path_with_text(&p.test_path_proc, &text)?;
    let params = BoostingParams::load(&t.params_path)?;

    let matrices = train_test_matrices(&train, &test, &t.target_column)?;
    let report = cross_validate(
        &matrices,
        &params,
        t.n_folds,
        p.random_state,
        t.early_stopping_rounds,
    )?;
    report.metrics.save(&t.metrics_cross_path)?;
    Ok(report.overfit)
}

/// Последние сохраненные метрики обучения или кросс-валидации
pub fn load_metrics(config: &Config, cross_val: bool) -> Result<Metrics> {
    let path = if cross_val {
        &config.train.metrics_cross_path
    } else {
        &config.train.metrics_path
    };
    Metrics::load(path)
}
