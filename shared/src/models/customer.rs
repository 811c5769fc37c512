//! Customer and worker locations for map tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GpsCoordinates;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `POINT(lon lat)`, kept in sync with the coordinates on every write
    pub geo_wkt: Option<String>,
    pub is_worker: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn coordinates(&self) -> Option<GpsCoordinates> {
        GpsCoordinates::from_parts(self.latitude, self.longitude)
    }

    /// GeoJSON feature for the map layer, `None` when the customer has no location
    pub fn to_geojson_feature(&self) -> Option<serde_json::Value> {
        let point = self.coordinates()?;
        Some(serde_json::json!({
            "type": "Feature",
            "id": self.id,
            "geometry": point.to_geojson(),
            "properties": {
                "name": self.name,
                "description": self.description.clone().unwrap_or_default(),
                "phone": self.phone.clone().unwrap_or_default(),
                "email": self.email.clone().unwrap_or_default(),
                "isWorker": self.is_worker,
            },
        }))
    }
}

/// Computed WKT for a pair of optional coordinates
pub fn compute_geo_wkt(latitude: Option<f64>, longitude: Option<f64>) -> Option<String> {
    GpsCoordinates::from_parts(latitude, longitude).map(|p| p.to_wkt())
}

/// Wrap features into a collection
pub fn feature_collection(features: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

/// One customer parsed from an import file
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub name: String,
    pub description: String,
    pub phone: String,
    pub email: String,
    pub latitude: f64,
    pub longitude: f64,
}
