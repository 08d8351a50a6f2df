//! Геокодирование строки адреса в координаты

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;

use super::lookup::LookupTable;
use crate::error::{PriceError, Result};

const YANDEX_GEOCODE_URL: &str = "https://geocode-maps.yandex.ru/1.x/";

/// Источник координат. `Ok(None)` - адрес не найден.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>>;
}

impl Geocoder for LookupTable {
    fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
        Ok(self.get(query))
    }
}

/// Минимальный интервал между запросами
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    fn wait(&self) {
        let mut last = match self.last_request.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                std::thread::sleep(wait_time);
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct YandexResponse {
    response: YandexBody,
}

#[derive(Debug, Deserialize)]
struct YandexBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Debug, Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Debug, Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    /// "долгота широта"
    pos: String,
}

/// "37.617698 55.755864" -> (55.755864, 37.617698)
fn parse_pos(pos: &str) -> Option<(f64, f64)> {
    let mut parts = pos.split_whitespace().map(str::parse::<f64>);
    let lon = parts.next()?.ok()?;
    let lat = parts.next()?.ok()?;
    Some((lat, lon))
}

/// HTTP геокодер Яндекса
pub struct YandexGeocoder {
    http_client: reqwest::blocking::Client,
    api_key: String,
    rate_limiter: RateLimiter,
}

impl YandexGeocoder {
    pub fn new(api_key: &str, min_delay: Duration, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(PriceError::Config("geocoder api_key is empty".to_string()));
        }
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.to_string(),
            rate_limiter: RateLimiter::new(min_delay),
        })
    }
}

impl Geocoder for YandexGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
        self.rate_limiter.wait();
        tracing::debug!(query = %query, "Querying geocoder");

        let response = self
            .http_client
            .get(YANDEX_GEOCODE_URL)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("geocode", query),
                ("format", "json"),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::GeocodeFailure(format!(
                "{}: HTTP {}",
                query,
                status.as_u16()
            )));
        }

        let body: YandexResponse = response.json()?;
        let Some(member) = body.response.collection.members.first() else {
            return Ok(None);
        };
        parse_pos(&member.geo_object.point.pos)
            .map(Some)
            .ok_or_else(|| PriceError::GeocodeFailure(format!("{}: bad point '{}'", query, member.geo_object.point.pos)))
    }
}
