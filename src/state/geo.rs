use crate::dao::models::GeoPointEntity;

/// Mean Earth radius in meters, used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in decimal degrees, south negative.
    pub lat: f64,
    /// Longitude in decimal degrees, west negative.
    pub lon: f64,
}

impl GeoPoint {
    /// Great-circle distance to `other` in meters (haversine formula).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_M * c
    }
}

impl From<GeoPointEntity> for GeoPoint {
    fn from(value: GeoPointEntity) -> Self {
        Self {
            lat: value.lat,
            lon: value.lon,
        }
    }
}

impl From<GeoPoint> for GeoPointEntity {
    fn from(value: GeoPoint) -> Self {
        Self {
            lat: value.lat,
            lon: value.lon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let point = GeoPoint {
            lat: 32.557859,
            lon: 35.076676,
        };
        assert_eq!(point.distance_to(&point), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint {
            lat: 32.557859,
            lon: 35.076676,
        };
        let b = GeoPoint {
            lat: 32.560102,
            lon: 35.081244,
        };
        let forward = a.distance_to(&b);
        let backward = b.distance_to(&a);
        assert!((forward - backward).abs() < 1e-9);
        assert!(forward > 0.0);
    }

    #[test]
    fn one_millidegree_of_latitude_is_about_111_meters() {
        let a = GeoPoint { lat: 32.0, lon: 35.0 };
        let b = GeoPoint {
            lat: 32.001,
            lon: 35.0,
        };
        let distance = a.distance_to(&b);
        assert!((distance - 111.19).abs() < 0.5, "got {distance}");
    }
}
