//! Словарь уникальных значений признаков из train
//!
//! Порядок ключей - канонический порядок колонок. Используется для проверки
//! схемы на инференсе и для диапазонов ввода в форме предсказания.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{PriceError, Result};
use crate::frame::{ColumnData, Frame};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueValuesCatalog {
    columns: Map<String, Value>,
}

fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Value::from(v as i64)
    } else {
        Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl UniqueValuesCatalog {
    /// Отсортированные уникальные значения каждой колонки (без пропусков)
    pub fn from_frame(frame: &Frame) -> Self {
        let mut columns = Map::new();
        for column in frame.columns() {
            let values: Vec<Value> = match &column.data {
                ColumnData::Numeric(v) => {
                    let mut present: Vec<f64> = v.iter().flatten().copied().collect();
                    present.sort_by(|a, b| a.total_cmp(b));
                    present.dedup();
                    present.into_iter().map(number_value).collect()
                }
                ColumnData::Text(v) => v
                    .iter()
                    .flatten()
                    .cloned()
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            };
            columns.insert(column.name.clone(), Value::Array(values));
        }
        Self { columns }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn values(&self, column: &str) -> Option<&[Value]> {
        self.columns
            .get(column)
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
    }

    /// Диапазон числовой колонки (для ползунков формы)
    pub fn numeric_range(&self, column: &str) -> Option<(f64, f64)> {
        let values: Vec<f64> = self.values(column)?.iter().filter_map(Value::as_f64).collect();
        let min = values.iter().copied().reduce(f64::min)?;
        let max = values.iter().copied().reduce(f64::max)?;
        Some((min, max))
    }

    /// Проверка набора колонок и упорядочивание по train
    pub fn conform(&self, frame: &Frame) -> Result<Frame> {
        let expected: BTreeSet<String> = self.columns.keys().cloned().collect();
        let actual: BTreeSet<String> = frame.column_names().into_iter().collect();

        if expected != actual {
            return Err(PriceError::SchemaMismatch {
                missing: expected.difference(&actual).cloned().collect(),
                unexpected: actual.difference(&expected).cloned().collect(),
            });
        }
        frame.select(&self.column_names())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::storage::save_json(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::storage::load_json(path)
    }
}
