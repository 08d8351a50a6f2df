//! Гистограммное разбиение признаков на корзины
//!
//! Числовой признак: корзина = первая верхняя граница >= значения.
//! Категориальный: корзина = код уровня. NaN -> отдельная корзина пропусков.

#![allow(non_snake_case)]

use ndarray::Array2;

use crate::data::FeatureKind;

pub const MISSING_BIN: u16 = u16::MAX;

#[derive(Debug, Clone, PartialEq)]
pub enum BinMapper {
    Numeric { upper_bounds: Vec<f64> },
    Categorical { n_levels: usize },
}

impl BinMapper {
    /// Границы корзин по отсортированным значениям без пропусков
    fn numeric(values: &mut [f64], max_bin: usize) -> Self {
        values.sort_by(|a, b| a.total_cmp(b));
        let mut distinct = values.to_vec();
        distinct.dedup();

        let mut upper_bounds: Vec<f64> = if distinct.len() <= max_bin {
            distinct
                .windows(2)
                .map(|w| w[0] + (w[1] - w[0]) / 2.0)
                .collect()
        } else {
            // Квантильные границы по всем значениям
            let n = values.len();
            let mut bounds: Vec<f64> = (1..max_bin).map(|k| values[k * n / max_bin]).collect();
            bounds.dedup();
            bounds
        };
        upper_bounds.push(f64::INFINITY);
        BinMapper::Numeric { upper_bounds }
    }

    pub fn n_bins(&self) -> usize {
        match self {
            BinMapper::Numeric { upper_bounds } => upper_bounds.len(),
            BinMapper::Categorical { n_levels } => *n_levels,
        }
    }

    pub fn bin(&self, value: f64) -> u16 {
        if value.is_nan() {
            return MISSING_BIN;
        }
        match self {
            BinMapper::Numeric { upper_bounds } => {
                upper_bounds.partition_point(|u| *u < value) as u16
            }
            BinMapper::Categorical { n_levels } => {
                let code = value as usize;
                if value < 0.0 || code >= *n_levels {
                    MISSING_BIN
                } else {
                    code as u16
                }
            }
        }
    }

    /// Порог исходного значения для разбиения "корзина <= bin"
    pub fn threshold(&self, bin: usize) -> f64 {
        match self {
            BinMapper::Numeric { upper_bounds } => upper_bounds[bin],
            BinMapper::Categorical { .. } => bin as f64,
        }
    }
}

/// Признаки в корзинах, по колонкам
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    pub mappers: Vec<BinMapper>,
    pub bins: Vec<Vec<u16>>,
    pub n_rows: usize,
}

impl BinnedMatrix {
    pub fn fit(X: &Array2<f64>, kinds: &[FeatureKind], max_bin: usize) -> Self {
        let mappers: Vec<BinMapper> = kinds
            .iter()
            .enumerate()
            .map(|(j, kind)| match kind {
                FeatureKind::Categorical { levels } => BinMapper::Categorical {
                    n_levels: levels.len(),
                },
                FeatureKind::Numeric => {
                    let mut values: Vec<f64> =
                        X.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
                    BinMapper::numeric(&mut values, max_bin)
                }
            })
            .collect();

        let bins = mappers
            .iter()
            .enumerate()
            .map(|(j, mapper)| X.column(j).iter().map(|v| mapper.bin(*v)).collect())
            .collect();

        Self {
            mappers,
            bins,
            n_rows: X.nrows(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.mappers.len()
    }
}
