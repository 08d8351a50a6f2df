//! Табличные данные: упорядоченный набор именованных колонок
//!
//! Числовая колонка хранит `Option<f64>`, текстовая - `Option<String>`.
//! Текстовые колонки на этапе обучения считаются категориальными.

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{PriceError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Значение ячейки в текстовом виде (для CSV)
    pub fn cell_string(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Numeric(v) => v[row].map(|x| x.to_string()),
            ColumnData::Text(v) => v[row].clone(),
        }
    }

    fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => {
                ColumnData::Text(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

/// Разбор числа из ячейки; нечисловые и бесконечные значения -> None
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Self::new();
        for column in columns {
            if frame.has_column(&column.name) {
                return Err(PriceError::Data(format!("duplicate column '{}'", column.name)));
            }
            frame.set_column(&column.name, column.data)?;
        }
        Ok(frame)
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| PriceError::Schema(name.to_string()))
    }

    /// Колонка как числа; текст приводится через `parse_number` (ошибки -> None)
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(match self.column(name)? {
            ColumnData::Numeric(v) => v.clone(),
            ColumnData::Text(v) => v
                .iter()
                .map(|x| x.as_deref().and_then(parse_number))
                .collect(),
        })
    }

    /// Колонка как строки
    pub fn text(&self, name: &str) -> Result<Vec<Option<String>>> {
        Ok(match self.column(name)? {
            ColumnData::Text(v) => v.clone(),
            ColumnData::Numeric(v) => v.iter().map(|x| x.map(|n| n.to_string())).collect(),
        })
    }

    /// Замена существующей колонки на месте либо добавление в конец
    pub fn set_column(&mut self, name: &str, data: ColumnData) -> Result<()> {
        if !self.columns.is_empty() && data.len() != self.n_rows() {
            return Err(PriceError::Data(format!(
                "column '{}' has {} rows, frame has {}",
                name,
                data.len(),
                self.n_rows()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.data = data,
            None => self.columns.push(Column {
                name: name.to_string(),
                data,
            }),
        }
        Ok(())
    }

    /// Удаление колонок; отсутствующая колонка - ошибка схемы
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            self.column(name.as_ref())?;
        }
        let to_drop: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        self.columns.retain(|c| !to_drop.contains(c.name.as_str()));
        Ok(())
    }

    /// Оставить строки, для которых маска истинна
    pub fn filter_rows(&mut self, keep: &[bool]) {
        let indices: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter(|(_, k)| **k)
            .map(|(i, _)| i)
            .collect();
        *self = self.take_rows(&indices);
    }

    pub fn take_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(indices),
                })
                .collect(),
        }
    }

    /// Новый фрейм из колонок в заданном порядке
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            columns.push(Column {
                name: name.as_ref().to_string(),
                data: self.column(name.as_ref())?.clone(),
            });
        }
        Frame::from_columns(columns)
    }

    pub fn rename_columns<F: FnMut(&str) -> String>(&mut self, mut rename: F) -> Result<()> {
        for column in &mut self.columns {
            column.name = rename(&column.name);
        }
        let unique: HashSet<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        if unique.len() != self.columns.len() {
            return Err(PriceError::Data("column names collide after rename".to_string()));
        }
        Ok(())
    }

    /// Чтение CSV; колонка становится числовой, если все непустые ячейки - числа
    pub fn read_csv<R: Read>(reader: R) -> Result<Frame> {
        Self::read_csv_with_text(reader, &[])
    }

    /// Как `read_csv`, но колонки из `text` всегда текстовые (категории из цифр)
    pub fn read_csv_with_text<R: Read>(reader: R, text: &[&str]) -> Result<Frame> {
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for record in rdr.records() {
            let record = record?;
            for (i, value) in record.iter().enumerate() {
                let value = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
                cells[i].push(value);
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| {
                let present = values.iter().flatten().count();
                let numeric = present > 0
                    && !text.contains(&name.as_str())
                    && values
                        .iter()
                        .flatten()
                        .all(|v| parse_number(v).is_some());
                if numeric {
                    let parsed = values
                        .iter()
                        .map(|v| v.as_deref().and_then(parse_number))
                        .collect();
                    Column::numeric(name, parsed)
                } else {
                    Column::text(name, values)
                }
            })
            .collect();
        Frame::from_columns(columns)
    }

    pub fn read_csv_path<P: AsRef<Path>>(path: P) -> Result<Frame> {
        Self::read_csv(File::open(path)?)
    }

    pub fn read_csv_path_with_text<P: AsRef<Path>>(path: P, text: &[&str]) -> Result<Frame> {
        Self::read_csv_with_text(File::open(path)?, text)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.n_rows() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.data.cell_string(row).unwrap_or_default())
                .collect();
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.write_csv(File::create(path)?)
    }
}
