//! Случайное (нестратифицированное) разбиение строк

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PriceError, Result};
use crate::frame::Frame;

/// train/test для оценки и train/val для ранней остановки финальной модели
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: Frame,
    pub test: Frame,
    pub train_val: Frame,
    pub val: Frame,
}

/// Размер теста: ceil(test_size * n), на train остается хотя бы одна строка
fn test_rows(n: usize, test_size: f64) -> Result<usize> {
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PriceError::Data(format!(
            "cannot split {} rows with test_size {}",
            n, test_size
        )));
    }
    Ok(n_test)
}

/// Перемешивание с фиксированным seed; тест - первые строки перестановки
pub fn train_test_split(frame: &Frame, test_size: f64, seed: u64) -> Result<(Frame, Frame)> {
    let n = frame.n_rows();
    let n_test = test_rows(n, test_size)?;

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = frame.take_rows(&indices[..n_test]);
    let train = frame.take_rows(&indices[n_test..]);
    Ok((train, test))
}

/// Оба разбиения строятся независимо из полного датасета
pub fn split_dataset(frame: &Frame, test_size: f64, val_size: f64, seed: u64) -> Result<DatasetSplits> {
    let (train, test) = train_test_split(frame, test_size, seed)?;
    let (train_val, val) = train_test_split(frame, val_size, seed)?;

    tracing::info!(
        "Split: train {}, test {}, train_val {}, val {}",
        train.n_rows(),
        test.n_rows(),
        train_val.n_rows(),
        val.n_rows()
    );
    Ok(DatasetSplits {
        train,
        test,
        train_val,
        val,
    })
}
