//! Feature engineering: логарифм цели, выбросы, имена колонок для модели

use super::translit;
use crate::error::{PriceError, Result};
use crate::frame::{ColumnData, Frame};
use crate::types::{COL_PRICE_PER_M2, COL_PRICE_PER_M2_LOG};

pub struct FeatureEngineer {
    /// Колонки только для обучения (цены), удаляются после расчета цели
    drop_unique: Vec<String>,
    /// Колонки, удаляемые после транслитерации
    drop_final: Vec<String>,
}

/// Квантиль с линейной интерполяцией по отсортированному массиву
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Нижняя граница Q1 - 1.5 * IQR
pub fn iqr_lower_bound(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    Some(q1 - 1.5 * (q3 - q1))
}

impl FeatureEngineer {
    pub fn new(drop_unique: Vec<String>, drop_final: Vec<String>) -> Self {
        Self {
            drop_unique,
            drop_final,
        }
    }

    /// `train = true`: добавляет лог-цель, чистит выбросы и удаляет цены
    pub fn transform(&self, mut frame: Frame, train: bool) -> Result<Frame> {
        if train {
            self.add_log_target(&mut frame)?;
            self.drop_outliers(&mut frame)?;
            frame.drop_columns(&self.drop_unique)?;
        }

        frame.rename_columns(translit::column_name)?;
        frame.drop_columns(&self.drop_final)?;

        tracing::info!(
            "Features ready: {} rows, {} columns",
            frame.n_rows(),
            frame.n_cols()
        );
        Ok(frame)
    }

    fn add_log_target(&self, frame: &mut Frame) -> Result<()> {
        let log_price: Vec<Option<f64>> = frame
            .numeric(COL_PRICE_PER_M2)?
            .into_iter()
            .map(|v| v.filter(|p| *p > 0.0).map(f64::ln))
            .collect();

        let keep: Vec<bool> = log_price.iter().map(Option::is_some).collect();
        frame.set_column(COL_PRICE_PER_M2_LOG, ColumnData::Numeric(log_price))?;
        frame.filter_rows(&keep);
        Ok(())
    }

    fn drop_outliers(&self, frame: &mut Frame) -> Result<()> {
        let target = frame.numeric(COL_PRICE_PER_M2_LOG)?;
        let present: Vec<f64> = target.iter().flatten().copied().collect();
        let bound = iqr_lower_bound(&present)
            .ok_or_else(|| PriceError::Data("no rows left for outlier bounds".to_string()))?;

        let keep: Vec<bool> = target
            .iter()
            .map(|v| v.map_or(false, |v| v >= bound))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        frame.filter_rows(&keep);
        tracing::debug!("Outliers below {:.4}: {} rows dropped", bound, dropped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;
    use crate::types::{COL_METRO, COL_PRICE, COL_ROOMS};

    fn frame() -> Frame {
        let prices = [200_000.0, 210_000.0, 220_000.0, 230_000.0, 240_000.0, 1_000.0];
        Frame::from_columns(vec![
            Column::text(COL_METRO, vec![Some("Сокол"); 6]),
            Column::numeric(COL_ROOMS, vec![Some(1.0), Some(2.0), Some(2.0), Some(3.0), Some(1.0), Some(2.0)]),
            Column::numeric(COL_PRICE, prices.iter().map(|p| Some(p * 50.0)).collect()),
            Column::numeric(COL_PRICE_PER_M2, prices.iter().map(|p| Some(*p)).collect()),
        ])
        .unwrap()
    }

    fn engineer() -> FeatureEngineer {
        FeatureEngineer::new(
            vec![COL_PRICE.to_string(), COL_PRICE_PER_M2.to_string()],
            vec!["Metro".to_string()],
        )
    }

    #[test]
    fn test_quantile_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.25), Some(1.75));
        assert_eq!(quantile(&sorted, 0.75), Some(3.25));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_train_transform() {
        let out = engineer().transform(frame(), true).unwrap();
        assert_eq!(out.column_names(), vec!["Kolvo_komnat", "Tsena_za_kvadrat_log"]);
        // дешевая квартира ниже нижней границы
        assert_eq!(out.n_rows(), 5);
        let target = out.numeric("Tsena_za_kvadrat_log").unwrap();
        assert!((target[0].unwrap() - 200_000f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_bound_is_inclusive() {
        let values = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(iqr_lower_bound(&values), Some(1.0));
        let mut f = Frame::from_columns(vec![Column::numeric(
            COL_PRICE_PER_M2,
            vec![Some(std::f64::consts::E); 4],
        )])
        .unwrap();
        let fe = FeatureEngineer::new(vec![], vec![]);
        fe.add_log_target(&mut f).unwrap();
        fe.drop_outliers(&mut f).unwrap();
        assert_eq!(f.n_rows(), 4);
    }

    #[test]
    fn test_evaluate_transform_keeps_rows() {
        let mut input = frame();
        input.drop_columns(&[COL_PRICE, COL_PRICE_PER_M2]).unwrap();
        let out = engineer().transform(input, false).unwrap();
        assert_eq!(out.n_rows(), 6);
        assert_eq!(out.column_names(), vec!["Kolvo_komnat"]);
    }

    #[test]
    fn test_missing_final_column_fails() {
        let fe = FeatureEngineer::new(vec![], vec!["Adres".to_string()]);
        assert!(matches!(
            fe.transform(frame(), false),
            Err(PriceError::Schema(_))
        ));
    }
}
