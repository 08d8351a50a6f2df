//! Административный округ Москвы по станции метро

use std::collections::HashMap;

use crate::types::UNKNOWN;

pub const MOSCOW_DISTRICTS: [&str; 11] = [
    "ЦАО",
    "ЮАО",
    "ЮЗАО",
    "ЮВАО",
    "ЗАО",
    "СВАО",
    "ВАО",
    "САО",
    "СЗАО",
    "НАО (Новомосковский)",
    "ЗелАО",
];

/// Второй токен адреса "Москва, ЦАО, ..." если это известный округ
pub fn district_from_address(address: &str) -> Option<&'static str> {
    let token = address.split(", ").nth(1)?;
    MOSCOW_DISTRICTS.iter().copied().find(|d| *d == token)
}

/// Короткая метка: "НАО (Новомосковский)" -> "НАО"
fn short_label(district: &str) -> String {
    district.split(' ').next().unwrap_or(district).to_string()
}

/// Округ для каждой строки: самый частый округ среди адресов той же
/// станции (при равенстве - встреченный первым), иначе "Неизвестно"
pub fn assign_districts(addresses: &[Option<String>], stations: &[Option<String>]) -> Vec<String> {
    // станция -> [(округ, количество)] в порядке появления
    let mut counts: HashMap<&str, Vec<(&'static str, usize)>> = HashMap::new();
    for (address, station) in addresses.iter().zip(stations) {
        let (Some(address), Some(station)) = (address, station) else {
            continue;
        };
        let Some(district) = district_from_address(address) else {
            continue;
        };
        let entry = counts.entry(station.as_str()).or_default();
        match entry.iter_mut().find(|(d, _)| *d == district) {
            Some((_, n)) => *n += 1,
            None => entry.push((district, 1)),
        }
    }

    let by_station: HashMap<&str, &'static str> = counts
        .into_iter()
        .filter_map(|(station, districts)| {
            let mut best: Option<(&'static str, usize)> = None;
            for (d, n) in districts {
                if best.map_or(true, |(_, c)| n > c) {
                    best = Some((d, n));
                }
            }
            best.map(|(d, _)| (station, d))
        })
        .collect();

    stations
        .iter()
        .map(|station| {
            station
                .as_deref()
                .and_then(|s| by_station.get(s))
                .map_or_else(|| UNKNOWN.to_string(), |d| short_label(d))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_district_from_address() {
        assert_eq!(district_from_address("Москва, ЦАО, р-н Арбат"), Some("ЦАО"));
        assert_eq!(district_from_address("Москва, р-н Арбат"), None);
        assert_eq!(district_from_address("Москва"), None);
    }

    #[test]
    fn test_most_frequent_district_per_station() {
        let addresses = some(&[
            "Москва, САО, ул. 1",
            "Москва, СЗАО, ул. 2",
            "Москва, СЗАО, ул. 3",
            "Москва, ЦАО, ул. 4",
        ]);
        let stations = some(&["Сокол", "Сокол", "Сокол", "Арбатская"]);
        assert_eq!(
            assign_districts(&addresses, &stations),
            vec!["СЗАО", "СЗАО", "СЗАО", "ЦАО"]
        );
    }

    #[test]
    fn test_tie_takes_first_seen() {
        let addresses = some(&["Москва, ЮАО, ул. 1", "Москва, ЦАО, ул. 2"]);
        let stations = some(&["Тульская", "Тульская"]);
        assert_eq!(assign_districts(&addresses, &stations), vec!["ЮАО", "ЮАО"]);
    }

    #[test]
    fn test_unknown_and_short_label() {
        let addresses = some(&["Москва, НАО (Новомосковский), пос. 1", "Московская обл., Химки"]);
        let stations = some(&["Саларьево", "Ховрино"]);
        assert_eq!(assign_districts(&addresses, &stations), vec!["НАО", UNKNOWN]);
    }
}
