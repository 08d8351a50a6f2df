//! Предобработка сырых объявлений
//!
//! Порядок шагов важен: медиана времени до метро считается до удаления
//! многокомнатных квартир, доли площадей - после.

use std::path::Path;

use chrono::Datelike;

use super::catalog::UniqueValuesCatalog;
use super::imputation;
use super::parsing::{self, RoomCount};
use crate::error::{PriceError, Result};
use crate::frame::{ColumnData, Frame};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Обучение: строки без цены удаляются
    Train,
    Evaluate,
}

/// Категориальные признаки, заполняемые модой
const MODE_FILLED: [&str; 7] = [
    COL_HEATING,
    COL_WINDOW_VIEW,
    COL_RENOVATION,
    COL_HOUSE_TYPE,
    COL_CEILING_TYPE,
    COL_PARKING,
    COL_TRASH_CHUTE,
];

const REQUIRED: [&str; 13] = [
    COL_METRO,
    COL_METRO_TIME,
    COL_TOTAL_AREA,
    COL_LIVING_AREA,
    COL_KITCHEN_AREA,
    COL_CEILING_HEIGHT,
    COL_BATHROOM,
    COL_ELEVATORS,
    COL_BALCONY,
    COL_FLOOR,
    COL_HOUSING_TYPE,
    COL_BUILD_YEAR,
    COL_FINISH,
];

const MIN_CEILING_HEIGHT: f64 = 2.0;

pub struct Preprocessor {
    drop_columns: Vec<String>,
    current_year: i32,
}

/// Числовая колонка: текст разбирается `parse`, числа остаются как есть
fn numeric_with<F>(frame: &Frame, name: &str, parse: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(&str) -> Option<f64>,
{
    Ok(match frame.column(name)? {
        ColumnData::Numeric(v) => v.clone(),
        ColumnData::Text(v) => v.iter().map(|x| x.as_deref().and_then(&parse)).collect(),
    })
}

impl Preprocessor {
    pub fn new(drop_columns: Vec<String>) -> Self {
        Self {
            drop_columns,
            current_year: chrono::Local::now().year(),
        }
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Очистка для обучения с сохранением словаря уникальных значений
    pub fn fit(&self, frame: Frame, drop_unique: &[String], catalog_path: &Path) -> Result<Frame> {
        let clean = self.clean(frame, Mode::Train)?;

        let mut catalog_frame = clean.clone();
        catalog_frame.drop_columns(drop_unique)?;
        UniqueValuesCatalog::from_frame(&catalog_frame).save(catalog_path)?;
        tracing::info!(
            "Unique values catalog saved: {} columns",
            catalog_frame.n_cols()
        );

        Ok(clean)
    }

    /// Очистка данных для предсказания и сверка с признаками train
    pub fn transform(&self, frame: Frame, catalog: &UniqueValuesCatalog) -> Result<Frame> {
        let clean = self.clean(frame, Mode::Evaluate)?;
        catalog.conform(&clean)
    }

    pub fn clean(&self, mut frame: Frame, mode: Mode) -> Result<Frame> {
        let rows_in = frame.n_rows();

        let low_value: Vec<&String> = self
            .drop_columns
            .iter()
            .filter(|c| frame.has_column(c))
            .collect();
        frame.drop_columns(&low_value)?;
        self.check_required(&frame, mode)?;

        self.drop_missing_keys(&mut frame, mode)?;
        self.parse_areas(&mut frame)?;
        self.parse_metro_time(&mut frame)?;
        self.parse_counts(&mut frame)?;
        self.split_floors(&mut frame)?;
        self.derive_rooms(&mut frame)?;

        let housing = frame
            .text(COL_HOUSING_TYPE)?
            .into_iter()
            .map(|v| v.map(|s| parsing::first_token(&s)))
            .collect();
        frame.set_column(COL_HOUSING_TYPE, ColumnData::Text(housing))?;

        self.impute(&mut frame)?;
        self.drop_anomalies(&mut frame);

        tracing::info!(
            "Preprocessing done: {} -> {} rows, {} columns",
            rows_in,
            frame.n_rows(),
            frame.n_cols()
        );
        Ok(frame)
    }

    fn check_required(&self, frame: &Frame, mode: Mode) -> Result<()> {
        for name in REQUIRED.iter().chain(MODE_FILLED.iter()) {
            frame.column(name)?;
        }
        if mode == Mode::Train {
            frame.column(COL_PRICE)?;
        }
        if !frame.has_column(COL_TITLE) && !frame.has_column(COL_ROOMS) {
            return Err(PriceError::Schema(COL_TITLE.to_string()));
        }
        Ok(())
    }

    fn drop_missing_keys(&self, frame: &mut Frame, mode: Mode) -> Result<()> {
        if mode == Mode::Train {
            let keep: Vec<bool> = frame.numeric(COL_PRICE)?.iter().map(Option::is_some).collect();
            frame.filter_rows(&keep);
        }
        let keep: Vec<bool> = frame.text(COL_METRO)?.iter().map(Option::is_some).collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        frame.filter_rows(&keep);
        if dropped > 0 {
            tracing::debug!("Dropped {} rows without metro station", dropped);
        }
        Ok(())
    }

    fn parse_areas(&self, frame: &mut Frame) -> Result<()> {
        for name in [COL_LIVING_AREA, COL_KITCHEN_AREA, COL_TOTAL_AREA, COL_CEILING_HEIGHT] {
            let values = numeric_with(frame, name, parsing::parse_locale_decimal)?;
            frame.set_column(name, ColumnData::Numeric(values))?;
        }
        Ok(())
    }

    fn parse_metro_time(&self, frame: &mut Frame) -> Result<()> {
        let mut minutes = numeric_with(frame, COL_METRO_TIME, parsing::leading_number)?;
        imputation::fill_median(&mut minutes, COL_METRO_TIME)?;
        let minutes = minutes.into_iter().map(|v| v.map(f64::trunc)).collect();
        frame.set_column(COL_METRO_TIME, ColumnData::Numeric(minutes))
    }

    fn parse_counts(&self, frame: &mut Frame) -> Result<()> {
        for name in [COL_BATHROOM, COL_ELEVATORS, COL_BALCONY] {
            let values = numeric_with(frame, name, parsing::sum_count_tokens)?;
            frame.set_column(name, ColumnData::Numeric(values))?;
        }
        Ok(())
    }

    fn split_floors(&self, frame: &mut Frame) -> Result<()> {
        // Уже разделенные этажи (повторный прогон) не трогаем
        if frame.column(COL_FLOOR)?.is_numeric() && frame.has_column(COL_FLOORS_TOTAL) {
            return Ok(());
        }
        let (floor, total): (Vec<Option<f64>>, Vec<Option<f64>>) = frame
            .text(COL_FLOOR)?
            .iter()
            .map(|v| v.as_deref().map_or((None, None), parsing::split_floor))
            .unzip();
        frame.set_column(COL_FLOOR, ColumnData::Numeric(floor))?;
        frame.set_column(COL_FLOORS_TOTAL, ColumnData::Numeric(total))
    }

    fn derive_rooms(&self, frame: &mut Frame) -> Result<()> {
        if !frame.has_column(COL_TITLE) {
            let rooms = frame.numeric(COL_ROOMS)?;
            return frame.set_column(COL_ROOMS, ColumnData::Numeric(rooms));
        }

        let parsed: Vec<RoomCount> = frame
            .text(COL_TITLE)?
            .iter()
            .map(|t| t.as_deref().map_or(RoomCount::Unknown, parsing::room_count))
            .collect();
        let keep: Vec<bool> = parsed.iter().map(|r| *r != RoomCount::Excluded).collect();

        let rooms = parsed
            .into_iter()
            .filter_map(|r| match r {
                RoomCount::Count(n) => Some(Some(n)),
                RoomCount::Unknown => Some(None),
                RoomCount::Excluded => None,
            })
            .collect();

        frame.filter_rows(&keep);
        frame.set_column(COL_ROOMS, ColumnData::Numeric(rooms))?;
        frame.drop_columns(&[COL_TITLE])
    }

    fn impute(&self, frame: &mut Frame) -> Result<()> {
        let total = frame.numeric(COL_TOTAL_AREA)?;
        for name in [COL_LIVING_AREA, COL_KITCHEN_AREA] {
            let mut part = frame.numeric(name)?;
            imputation::fill_area_by_ratio(&mut part, &total, name)?;
            frame.set_column(name, ColumnData::Numeric(part))?;
        }

        let not_built = f64::from(self.current_year + 1);
        let years = frame
            .numeric(COL_BUILD_YEAR)?
            .into_iter()
            .map(|v| Some(v.unwrap_or(not_built)))
            .collect();
        frame.set_column(COL_BUILD_YEAR, ColumnData::Numeric(years))?;

        let rooms = frame.numeric(COL_ROOMS)?;
        for name in [COL_BATHROOM, COL_BALCONY] {
            let mut values = frame.numeric(name)?;
            imputation::fill_group_mode(&rooms, &mut values, name)?;
            frame.set_column(name, ColumnData::Numeric(values))?;
        }

        let mut elevators = frame.numeric(COL_ELEVATORS)?;
        imputation::impute_elevators(&mut elevators, &frame.numeric(COL_FLOORS_TOTAL)?);
        frame.set_column(COL_ELEVATORS, ColumnData::Numeric(elevators))?;

        let mut ceiling = frame.numeric(COL_CEILING_HEIGHT)?;
        imputation::fill_median(&mut ceiling, COL_CEILING_HEIGHT)?;
        frame.set_column(COL_CEILING_HEIGHT, ColumnData::Numeric(ceiling))?;

        let finish = frame
            .text(COL_FINISH)?
            .into_iter()
            .map(|v| Some(v.unwrap_or_else(|| UNKNOWN.to_string())))
            .collect();
        frame.set_column(COL_FINISH, ColumnData::Text(finish))?;

        for name in MODE_FILLED {
            let mut values = frame.text(name)?;
            imputation::fill_mode_text(&mut values, name)?;
            frame.set_column(name, ColumnData::Text(values))?;
        }
        Ok(())
    }

    /// Отрицательные значения в числовых колонках и потолки ниже 2 м
    fn drop_anomalies(&self, frame: &mut Frame) {
        let mut keep = vec![true; frame.n_rows()];
        for column in frame.columns() {
            if let ColumnData::Numeric(values) = &column.data {
                for (k, v) in keep.iter_mut().zip(values) {
                    if matches!(v, Some(x) if *x < 0.0) {
                        *k = false;
                    }
                    if column.name == COL_CEILING_HEIGHT && matches!(v, Some(x) if *x < MIN_CEILING_HEIGHT) {
                        *k = false;
                    }
                }
            }
        }
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            tracing::debug!("Dropped {} anomalous rows", dropped);
        }
        frame.filter_rows(&keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    const RAW_COLUMNS: [&str; 30] = [
        COL_TITLE, COL_ADDRESS, COL_METRO, COL_METRO_TIME, COL_TOTAL_AREA, COL_LIVING_AREA,
        COL_KITCHEN_AREA, COL_FLOOR, COL_BUILD_YEAR, COL_HOUSING_TYPE, COL_CEILING_HEIGHT,
        COL_BATHROOM, COL_WINDOW_VIEW, COL_RENOVATION, COL_TRASH_CHUTE, COL_ELEVATORS,
        COL_HOUSE_TYPE, COL_CEILING_TYPE, COL_PARKING, COL_HEATING, COL_BALCONY, COL_FINISH,
        COL_PRICE, COL_PRICE_PER_M2, "Газоснабжение", "Год сдачи", "Дом",
        "Строительная серия", "Аварийность", "Подъезды",
    ];

    /// Строка с типичными значениями; `overrides` заменяет поля, "" - пропуск
    fn row(overrides: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut fields = vec![
            (COL_TITLE, "1-комн. квартира, 40 м²"),
            (COL_ADDRESS, "Москва, ЮАО, р-н Даниловский, ул. Лесная, 2"),
            (COL_METRO, "Тульская"),
            (COL_METRO_TIME, "3 мин. пешком"),
            (COL_TOTAL_AREA, "40\u{a0}м²"),
            (COL_LIVING_AREA, "20\u{a0}м²"),
            (COL_KITCHEN_AREA, "8\u{a0}м²"),
            (COL_FLOOR, "2 из 5"),
            (COL_BUILD_YEAR, "1970"),
            (COL_HOUSING_TYPE, "Вторичка"),
            (COL_CEILING_HEIGHT, "2,6\u{a0}м"),
            (COL_BATHROOM, "1 совмещенный"),
            (COL_WINDOW_VIEW, "Во двор"),
            (COL_RENOVATION, "Евро"),
            (COL_TRASH_CHUTE, "Нет"),
            (COL_ELEVATORS, "1 пассажирский"),
            (COL_HOUSE_TYPE, "Панельный"),
            (COL_CEILING_TYPE, "Железобетонное"),
            (COL_PARKING, "Наземная"),
            (COL_HEATING, "Центральное"),
            (COL_BALCONY, "1 балкон"),
            (COL_FINISH, "Чистовая"),
            (COL_PRICE, "10000000"),
            (COL_PRICE_PER_M2, "250000"),
        ];
        for (key, value) in overrides {
            match fields.iter_mut().find(|(k, _)| k == key) {
                Some(field) => field.1 = value,
                None => fields.push((key, value)),
            }
        }
        fields
    }

    fn frame_from_rows(rows: &[Vec<(&'static str, &'static str)>]) -> Frame {
        let columns = RAW_COLUMNS
            .iter()
            .map(|name| {
                let values: Vec<Option<&str>> = rows
                    .iter()
                    .map(|r| {
                        r.iter()
                            .find(|(k, _)| k == name)
                            .map(|(_, v)| *v)
                            .filter(|v| !v.is_empty())
                    })
                    .collect();
                Column::text(*name, values)
            })
            .collect();
        Frame::from_columns(columns).unwrap()
    }

    fn raw_frame() -> Frame {
        frame_from_rows(&[
            row(&[
                (COL_TITLE, "2-комн. квартира, 54,3 м²"),
                (COL_ADDRESS, "Москва, ЦАО, р-н Арбат, ул. Арбат, 10"),
                (COL_METRO, "Арбатская"),
                (COL_METRO_TIME, "5 мин. пешком"),
                (COL_TOTAL_AREA, "54,3\u{a0}м²"),
                (COL_LIVING_AREA, "30\u{a0}м²"),
                (COL_KITCHEN_AREA, ""),
                (COL_FLOOR, "5 из 12"),
                (COL_HOUSING_TYPE, "Вторичка Апартаменты"),
                (COL_CEILING_HEIGHT, "2,7\u{a0}м"),
                (COL_ELEVATORS, ""),
                (COL_FINISH, ""),
            ]),
            row(&[
                (COL_TITLE, "Студия, 25 м²"),
                (COL_METRO, "Сокол"),
                (COL_METRO_TIME, ""),
                (COL_TOTAL_AREA, "25\u{a0}м²"),
                (COL_LIVING_AREA, "15\u{a0}м²"),
                (COL_KITCHEN_AREA, "5\u{a0}м²"),
                (COL_BUILD_YEAR, ""),
                (COL_HEATING, ""),
            ]),
            row(&[
                (COL_TITLE, "2-комн. квартира, 60 м²"),
                (COL_METRO, "Арбатская"),
                (COL_METRO_TIME, "10 мин. на транспорте"),
                (COL_TOTAL_AREA, "60\u{a0}м²"),
                (COL_LIVING_AREA, "35\u{a0}м²"),
                (COL_KITCHEN_AREA, "12\u{a0}м²"),
                (COL_FLOOR, "цоколь из 9"),
                (COL_BATHROOM, ""),
            ]),
            row(&[
                (COL_TITLE, "Многокомнатная квартира, 200 м²"),
                (COL_METRO_TIME, "7 мин"),
                (COL_TOTAL_AREA, "200\u{a0}м²"),
                (COL_KITCHEN_AREA, "20\u{a0}м²"),
            ]),
            row(&[(COL_PRICE, "")]),
            row(&[(COL_METRO, "")]),
            row(&[(COL_METRO_TIME, "20 мин"), (COL_CEILING_HEIGHT, "1,8\u{a0}м")]),
        ])
    }

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(crate::config::default_raw_drop()).with_current_year(2024)
    }

    fn value(frame: &Frame, column: &str, row: usize) -> Option<f64> {
        frame.numeric(column).unwrap()[row]
    }

    #[test]
    fn test_clean_drops_invalid_rows() {
        let clean = preprocessor().clean(raw_frame(), Mode::Train).unwrap();
        // многокомнатная, без цены, без метро, потолок 1.8 м
        assert_eq!(clean.n_rows(), 3);
        assert!(!clean.has_column(COL_TITLE));
        assert!(!clean.has_column("Газоснабжение"));
    }

    #[test]
    fn test_clean_parses_locale_numbers() {
        let clean = preprocessor().clean(raw_frame(), Mode::Train).unwrap();
        assert_eq!(value(&clean, COL_TOTAL_AREA, 0), Some(54.3));
        assert_eq!(value(&clean, COL_CEILING_HEIGHT, 0), Some(2.7));
        assert_eq!(value(&clean, COL_FLOOR, 0), Some(5.0));
        assert_eq!(value(&clean, COL_FLOORS_TOTAL, 0), Some(12.0));
        assert_eq!(value(&clean, COL_FLOOR, 2), None);
        assert_eq!(value(&clean, COL_ROOMS, 0), Some(2.0));
        assert_eq!(value(&clean, COL_ROOMS, 1), Some(1.0));
        assert_eq!(clean.text(COL_HOUSING_TYPE).unwrap()[0].as_deref(), Some("Вторичка"));
    }

    #[test]
    fn test_clean_imputes_missing_values() {
        let clean = preprocessor().clean(raw_frame(), Mode::Train).unwrap();

        // медиана [5, 10, 7, 20] = 8.5 -> 8
        assert_eq!(value(&clean, COL_METRO_TIME, 1), Some(8.0));
        // доля кухни 0.2
        let kitchen = value(&clean, COL_KITCHEN_AREA, 0).unwrap();
        assert!((kitchen - 54.3 * 0.2).abs() < 1e-9);
        assert_eq!(value(&clean, COL_BUILD_YEAR, 1), Some(2025.0));
        // санузел по моде двухкомнатных
        assert_eq!(value(&clean, COL_BATHROOM, 2), Some(1.0));
        // 12 этажей без лифтов -> 2
        assert_eq!(value(&clean, COL_ELEVATORS, 0), Some(2.0));
        assert_eq!(clean.text(COL_FINISH).unwrap()[0].as_deref(), Some(UNKNOWN));
        assert_eq!(clean.text(COL_HEATING).unwrap()[1].as_deref(), Some("Центральное"));
        assert!(clean
            .columns()
            .iter()
            .all(|c| c.name == COL_FLOOR || c.data.missing_count() == 0));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let once = preprocessor().clean(raw_frame(), Mode::Train).unwrap();
        let twice = preprocessor().clean(once.clone(), Mode::Train).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_numeric_columns_non_negative() {
        let mut frame = raw_frame();
        frame.filter_rows(&[true, true, true, false, false, false, false]);
        let mut negative = frame.text(COL_METRO_TIME).unwrap();
        negative[2] = Some("-4 мин".to_string());
        frame.set_column(COL_METRO_TIME, ColumnData::Text(negative)).unwrap();

        let clean = preprocessor().clean(frame, Mode::Train).unwrap();
        assert_eq!(clean.n_rows(), 2);
        for column in clean.columns() {
            if let ColumnData::Numeric(values) = &column.data {
                assert!(values.iter().flatten().all(|v| *v >= 0.0), "{}", column.name);
            }
        }
        assert!(clean
            .numeric(COL_CEILING_HEIGHT)
            .unwrap()
            .iter()
            .flatten()
            .all(|h| *h >= 2.0));
    }

    #[test]
    fn test_evaluate_keeps_rows_without_price() {
        let clean = preprocessor().clean(raw_frame(), Mode::Evaluate).unwrap();
        assert_eq!(clean.n_rows(), 4);
    }

    #[test]
    fn test_missing_required_column() {
        let mut frame = raw_frame();
        frame.drop_columns(&[COL_METRO]).unwrap();
        match preprocessor().clean(frame, Mode::Train) {
            Err(PriceError::Schema(name)) => assert_eq!(name, COL_METRO),
            other => panic!("expected schema error, got {:?}", other.map(|f| f.n_rows())),
        }
    }
}
