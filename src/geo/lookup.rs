//! Сохраненные словари координат: ключ -> [широта, долгота]

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Ключ метро в словаре и в запросе к геокодеру
pub fn metro_key(station: &str) -> String {
    format!("Москва, метро {}", station)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupTable {
    points: HashMap<String, [f64; 2]>,
}

impl LookupTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table: LookupTable = crate::storage::load_json(path.as_ref())?;
        tracing::debug!(
            "Lookup table {} loaded: {} entries",
            path.as_ref().display(),
            table.len()
        );
        Ok(table)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        crate::storage::save_json(self, path)
    }

    pub fn insert(&mut self, key: impl Into<String>, lat: f64, lon: f64) {
        self.points.insert(key.into(), [lat, lon]);
    }

    pub fn get(&self, key: &str) -> Option<(f64, f64)> {
        self.points.get(key).map(|p| (p[0], p[1]))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
