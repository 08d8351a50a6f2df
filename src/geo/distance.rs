//! Расстояние по дуге большого круга

/// Средний радиус Земли, км
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Координаты в градусах (широта, долгота) -> км
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Расстояние, если обе точки известны
pub fn optional_distance(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<f64> {
    Some(haversine_km(a?, b?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_degree_on_equator() {
        let d = haversine_km((0.0, 0.0), (0.0, 1.0));
        assert!((d - 111.195).abs() < 0.01, "{}", d);
    }

    #[test]
    fn test_same_point_is_zero() {
        let center = (55.755864, 37.617698);
        assert_eq!(haversine_km(center, center), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let a = (55.75, 37.61);
        let b = (55.80, 37.50);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-12);
        assert_eq!(optional_distance(Some(a), None), None);
    }
}
