//! Обогащение датасета координатами, расстояниями и округом

use std::collections::HashMap;
use std::time::Duration;

use super::distance::optional_distance;
use super::district::assign_districts;
use super::geocoder::{Geocoder, YandexGeocoder};
use super::lookup::{metro_key, LookupTable};
use crate::config::PreprocessingConfig;
use crate::error::Result;
use crate::frame::{ColumnData, Frame};
use crate::types::*;

pub struct GeoResolver {
    metro: Box<dyn Geocoder>,
    address: Box<dyn Geocoder>,
    center: (f64, f64),
}

impl GeoResolver {
    pub fn new(metro: Box<dyn Geocoder>, address: Box<dyn Geocoder>, center: (f64, f64)) -> Self {
        Self {
            metro,
            address,
            center,
        }
    }

    /// Координаты из сохраненных словарей (обучение и пакетное предсказание)
    pub fn from_tables(config: &PreprocessingConfig) -> Result<Self> {
        Ok(Self::new(
            Box::new(LookupTable::load(&config.metro_path)?),
            Box::new(LookupTable::load(&config.address_path)?),
            (config.lat_center, config.lon_center),
        ))
    }

    /// Живое геокодирование (ручной ввод)
    pub fn live(config: &PreprocessingConfig) -> Result<Self> {
        let delay = Duration::from_millis(config.geocode_min_delay_ms);
        let timeout = Duration::from_millis(config.geocode_timeout_ms);
        let geocoder = || YandexGeocoder::new(&config.api_key, delay, timeout);
        Ok(Self::new(
            Box::new(geocoder()?),
            Box::new(geocoder()?),
            (config.lat_center, config.lon_center),
        ))
    }

    pub fn resolve(&self, mut frame: Frame) -> Result<Frame> {
        let stations = frame.text(COL_METRO)?;
        let addresses = frame.text(COL_ADDRESS)?;

        let metro_queries: Vec<Option<String>> = stations
            .iter()
            .map(|s| s.as_deref().map(metro_key))
            .collect();
        let metro_points = lookup_all(self.metro.as_ref(), &metro_queries, "metro");
        let house_points = lookup_all(self.address.as_ref(), &addresses, "address");

        let to_center: Vec<Option<f64>> = house_points
            .iter()
            .map(|h| optional_distance(*h, Some(self.center)))
            .collect();
        let to_metro: Vec<Option<f64>> = house_points
            .iter()
            .zip(&metro_points)
            .map(|(h, m)| optional_distance(*h, *m))
            .collect();
        let districts = assign_districts(&addresses, &stations)
            .into_iter()
            .map(Some)
            .collect();

        frame.set_column(COL_METRO_LAT, ColumnData::Numeric(latitudes(&metro_points)))?;
        frame.set_column(COL_METRO_LON, ColumnData::Numeric(longitudes(&metro_points)))?;
        frame.set_column(COL_HOUSE_LAT, ColumnData::Numeric(latitudes(&house_points)))?;
        frame.set_column(COL_HOUSE_LON, ColumnData::Numeric(longitudes(&house_points)))?;
        frame.set_column(COL_DIST_CENTER, ColumnData::Numeric(to_center))?;
        frame.set_column(COL_DIST_METRO, ColumnData::Numeric(to_metro))?;
        frame.set_column(COL_DISTRICT, ColumnData::Text(districts))?;

        tracing::info!("Geo features added: {} rows", frame.n_rows());
        Ok(frame)
    }
}

fn latitudes(points: &[Option<(f64, f64)>]) -> Vec<Option<f64>> {
    points.iter().map(|p| p.map(|(lat, _)| lat)).collect()
}

fn longitudes(points: &[Option<(f64, f64)>]) -> Vec<Option<f64>> {
    points.iter().map(|p| p.map(|(_, lon)| lon)).collect()
}

/// Геокодирование уникальных запросов; ошибки и промахи -> пропуск с предупреждением
fn lookup_all(
    geocoder: &dyn Geocoder,
    queries: &[Option<String>],
    kind: &str,
) -> Vec<Option<(f64, f64)>> {
    let mut cache: HashMap<&str, Option<(f64, f64)>> = HashMap::new();
    let mut misses = 0;

    let points = queries
        .iter()
        .map(|query| {
            let query = query.as_deref()?;
            if let Some(point) = cache.get(query) {
                return *point;
            }
            let point = match geocoder.geocode(query) {
                Ok(Some(point)) => Some(point),
                Ok(None) => {
                    misses += 1;
                    tracing::warn!("No {} coordinates for '{}'", kind, query);
                    None
                }
                Err(e) => {
                    misses += 1;
                    tracing::warn!("Geocoding {} '{}' failed: {}", kind, query, e);
                    None
                }
            };
            cache.insert(query, point);
            point
        })
        .collect();

    if misses > 0 {
        tracing::warn!("{} {} lookups without coordinates", misses, kind);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PriceError;
    use crate::frame::Column;

    struct FailingGeocoder;

    impl Geocoder for FailingGeocoder {
        fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
            Err(PriceError::GeocodeFailure(query.to_string()))
        }
    }

    fn frame() -> Frame {
        Frame::from_columns(vec![
            Column::text(
                COL_ADDRESS,
                vec![Some("Москва, ЦАО, ул. Арбат, 10"), Some("Москва, САО, ул. Нет, 1")],
            ),
            Column::text(COL_METRO, vec![Some("Арбатская"), Some("Сокол")]),
        ])
        .unwrap()
    }

    fn tables() -> (LookupTable, LookupTable) {
        let mut metro = LookupTable::default();
        metro.insert(metro_key("Арбатская"), 55.752, 37.601);
        metro.insert(metro_key("Сокол"), 55.805, 37.515);
        let mut address = LookupTable::default();
        address.insert("Москва, ЦАО, ул. Арбат, 10", 55.751, 37.596);
        (metro, address)
    }

    #[test]
    fn test_resolve_from_tables() {
        let (metro, address) = tables();
        let resolver = GeoResolver::new(Box::new(metro), Box::new(address), (55.755864, 37.617698));
        let out = resolver.resolve(frame()).unwrap();

        assert_eq!(out.numeric(COL_METRO_LAT).unwrap(), vec![Some(55.752), Some(55.805)]);
        let to_metro = out.numeric(COL_DIST_METRO).unwrap();
        assert!(to_metro[0].unwrap() > 0.0 && to_metro[0].unwrap() < 1.0);
        // адреса нет в словаре: строка остается, расстояния пустые
        assert_eq!(out.n_rows(), 2);
        assert_eq!(to_metro[1], None);
        assert_eq!(out.numeric(COL_DIST_CENTER).unwrap()[1], None);
        assert_eq!(
            out.text(COL_DISTRICT).unwrap(),
            vec![Some("ЦАО".to_string()), Some("САО".to_string())]
        );
    }

    #[test]
    fn test_geocoder_failure_keeps_rows() {
        let resolver = GeoResolver::new(
            Box::new(FailingGeocoder),
            Box::new(FailingGeocoder),
            (55.755864, 37.617698),
        );
        let out = resolver.resolve(frame()).unwrap();
        assert_eq!(out.n_rows(), 2);
        assert_eq!(out.numeric(COL_HOUSE_LAT).unwrap(), vec![None, None]);
    }
}
