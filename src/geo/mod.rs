/// Геоданные: координаты метро и дома, расстояния, округ

pub mod district;
pub mod distance;
pub mod geocoder;
pub mod lookup;
pub mod resolver;

pub use distance::haversine_km;
pub use geocoder::{Geocoder, YandexGeocoder};
pub use lookup::LookupTable;
pub use resolver::GeoResolver;
