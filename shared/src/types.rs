//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// GPS coordinates in WGS84 degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Pair up optional coordinates; both must be present
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(Self::new(lat, lon)),
            _ => None,
        }
    }

    /// Well-known text, longitude first: `POINT(106.816666 -6.2)`
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }

    /// GeoJSON point geometry, `[lon, lat]` order
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Point",
            "coordinates": [self.longitude, self.latitude],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_is_lon_lat() {
        let point = GpsCoordinates::new(-6.2, 106.816666);
        assert_eq!(point.to_wkt(), "POINT(106.816666 -6.2)");
    }

    #[test]
    fn test_geojson_point() {
        let point = GpsCoordinates::new(-6.2, 106.816666);
        let geometry = point.to_geojson();
        assert_eq!(geometry["type"], "Point");
        assert_eq!(geometry["coordinates"][0], 106.816666);
        assert_eq!(geometry["coordinates"][1], -6.2);
    }

    #[test]
    fn test_from_parts_requires_both() {
        assert!(GpsCoordinates::from_parts(Some(1.0), None).is_none());
        assert!(GpsCoordinates::from_parts(None, Some(1.0)).is_none());
        assert!(GpsCoordinates::from_parts(Some(1.0), Some(2.0)).is_some());
    }
}
