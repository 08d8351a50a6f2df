//! Типы данных и названия колонок датасета объявлений

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::{Column, Frame};

// Колонки сырого датасета
pub const COL_TITLE: &str = "Название";
pub const COL_ADDRESS: &str = "Адрес";
pub const COL_METRO: &str = "Метро";
pub const COL_METRO_TIME: &str = "Время до метро";
pub const COL_TOTAL_AREA: &str = "Общая площадь";
pub const COL_LIVING_AREA: &str = "Жилая площадь";
pub const COL_KITCHEN_AREA: &str = "Площадь кухни";
pub const COL_FLOOR: &str = "Этаж";
pub const COL_FLOORS_TOTAL: &str = "Этажность здания";
pub const COL_BUILD_YEAR: &str = "Год постройки";
pub const COL_HOUSING_TYPE: &str = "Тип жилья";
pub const COL_CEILING_HEIGHT: &str = "Высота потолков";
pub const COL_BATHROOM: &str = "Санузел";
pub const COL_WINDOW_VIEW: &str = "Вид из окон";
pub const COL_RENOVATION: &str = "Ремонт";
pub const COL_TRASH_CHUTE: &str = "Мусоропровод";
pub const COL_ELEVATORS: &str = "Количество лифтов";
pub const COL_HOUSE_TYPE: &str = "Тип дома";
pub const COL_CEILING_TYPE: &str = "Тип перекрытий";
pub const COL_PARKING: &str = "Парковка";
pub const COL_HEATING: &str = "Отопление";
pub const COL_BALCONY: &str = "Балкон/лоджия";
pub const COL_FINISH: &str = "Отделка";
pub const COL_ROOMS: &str = "Кол-во комнат";
pub const COL_PRICE: &str = "Цена";
pub const COL_PRICE_PER_M2: &str = "Цена за квадрат";
pub const COL_PRICE_PER_M2_LOG: &str = "Цена за квадрат лог";

// Колонки, добавляемые геокодированием
pub const COL_METRO_LAT: &str = "широта метро";
pub const COL_METRO_LON: &str = "долгота метро";
pub const COL_HOUSE_LAT: &str = "широта дома";
pub const COL_HOUSE_LON: &str = "долгота дома";
pub const COL_DIST_CENTER: &str = "Расстояние до центра";
pub const COL_DIST_METRO: &str = "Расстояние до метро";
pub const COL_DISTRICT: &str = "Округ";

/// Значение категории для неизвестных данных
pub const UNKNOWN: &str = "Неизвестно";

/// Квартира, введенная вручную (форма предсказания)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApartmentInput {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Metro")]
    pub metro: String,
    #[serde(rename = "Vremja_do_metro")]
    pub metro_minutes: i64,
    #[serde(rename = "Obschaja_ploschad")]
    pub total_area: f64,
    #[serde(rename = "Zhilaja_ploschad")]
    pub living_area: f64,
    #[serde(rename = "Ploschad_kuhni")]
    pub kitchen_area: f64,
    #[serde(rename = "Etazh")]
    pub floor: i64,
    #[serde(rename = "God_postrojki")]
    pub build_year: i64,
    #[serde(rename = "Tip_zhilja")]
    pub housing_type: String,
    #[serde(rename = "Vysota_potolkov")]
    pub ceiling_height: f64,
    #[serde(rename = "Sanuzel")]
    pub bathrooms: i64,
    #[serde(rename = "Vid_iz_okon")]
    pub window_view: String,
    #[serde(rename = "Remont")]
    pub renovation: String,
    #[serde(rename = "Musoroprovod")]
    pub trash_chute: String,
    #[serde(rename = "Kolichestvo_liftov")]
    pub elevators: i64,
    #[serde(rename = "Tip_doma")]
    pub house_type: String,
    #[serde(rename = "Tip_perekrytij")]
    pub ceiling_type: String,
    #[serde(rename = "Parkovka")]
    pub parking: String,
    #[serde(rename = "Otoplenie")]
    pub heating: String,
    #[serde(rename = "Balkonlodzhija")]
    pub balconies: i64,
    #[serde(rename = "Otdelka")]
    pub finish: String,
    #[serde(rename = "Etazhnost_zdanija")]
    pub floors_total: i64,
    #[serde(rename = "Kolvo_komnat")]
    pub rooms: i64,
}

impl ApartmentInput {
    /// Однострочный фрейм с колонками в порядке формы
    pub fn to_frame(&self) -> Result<Frame> {
        let num = |name: &str, v: f64| Column::numeric(name, vec![Some(v)]);
        let txt = |name: &str, v: &str| Column::text(name, vec![Some(v)]);

        Frame::from_columns(vec![
            txt(COL_ADDRESS, &self.address),
            txt(COL_METRO, &self.metro),
            num(COL_METRO_TIME, self.metro_minutes as f64),
            num(COL_TOTAL_AREA, self.total_area),
            num(COL_LIVING_AREA, self.living_area),
            num(COL_KITCHEN_AREA, self.kitchen_area),
            num(COL_FLOOR, self.floor as f64),
            num(COL_BUILD_YEAR, self.build_year as f64),
            txt(COL_HOUSING_TYPE, &self.housing_type),
            num(COL_CEILING_HEIGHT, self.ceiling_height),
            num(COL_BATHROOM, self.bathrooms as f64),
            txt(COL_WINDOW_VIEW, &self.window_view),
            txt(COL_RENOVATION, &self.renovation),
            txt(COL_TRASH_CHUTE, &self.trash_chute),
            num(COL_ELEVATORS, self.elevators as f64),
            txt(COL_HOUSE_TYPE, &self.house_type),
            txt(COL_CEILING_TYPE, &self.ceiling_type),
            txt(COL_PARKING, &self.parking),
            txt(COL_HEATING, &self.heating),
            num(COL_BALCONY, self.balconies as f64),
            txt(COL_FINISH, &self.finish),
            num(COL_FLOORS_TOTAL, self.floors_total as f64),
            num(COL_ROOMS, self.rooms as f64),
        ])
    }
}

/// Ответ на предсказание по введенным данным
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEstimate {
    /// Цена за квадрат, млн
    pub price_per_m2_mln: f64,
    /// Полная цена, млн
    pub price_mln: f64,
}

impl PriceEstimate {
    pub fn new(price_per_m2: f64, total_area: f64) -> Self {
        Self {
            price_per_m2_mln: (price_per_m2 / 1e6 * 1000.0).round() / 1000.0,
            price_mln: (price_per_m2 * total_area / 1e6 * 10.0).round() / 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_estimate_rounding() {
        let estimate = PriceEstimate::new(312_345.0, 54.3);
        assert_eq!(estimate.price_per_m2_mln, 0.312);
        assert_eq!(estimate.price_mln, 17.0);
    }
}
