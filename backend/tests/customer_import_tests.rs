//! Customer map tests
//!
//! Tests for customer rows and locations including:
//! - Import row validation messages
//! - WKT and GeoJSON formatting
//! - Coordinate range checks

use chrono::Utc;
use proptest::prelude::*;
use shared::models::{compute_geo_wkt, feature_collection, Customer};
use shared::{
    parse_customer_record, parse_delimiter, validate_optional_coordinates, GpsCoordinates,
};

fn customer(latitude: Option<f64>, longitude: Option<f64>) -> Customer {
    Customer {
        id: 1,
        name: "PT ABC".to_string(),
        description: Some("Main Office".to_string()),
        phone: None,
        email: Some("info@abc.com".to_string()),
        latitude,
        longitude,
        geo_wkt: compute_geo_wkt(latitude, longitude),
        is_worker: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_full_row_parses() {
        let record = parse_customer_record(&[
            "PT ABC",
            "Main Office",
            "+62-21-1234567",
            "info@abc.com",
            "-6.200000",
            "106.816666",
        ])
        .unwrap();
        assert_eq!(record.name, "PT ABC");
        assert_eq!(record.latitude, -6.2);
        assert_eq!(record.longitude, 106.816666);
    }

    #[test]
    fn test_blank_coordinates_read_as_zero() {
        let record = parse_customer_record(&["Depot", "", "", "", " ", ""]).unwrap();
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 0.0);
    }

    #[test]
    fn test_row_error_messages() {
        assert_eq!(
            parse_customer_record(&["A", "b"]).unwrap_err(),
            "Row must have at least 6 columns"
        );
        assert_eq!(
            parse_customer_record(&["A", "", "", "", "north", "1"]).unwrap_err(),
            "Invalid latitude or longitude format"
        );
        assert_eq!(
            parse_customer_record(&["  ", "", "", "", "1", "1"]).unwrap_err(),
            "Customer name is required"
        );
        assert_eq!(
            parse_customer_record(&["A", "", "", "", "1", "181"]).unwrap_err(),
            "Longitude must be between -180 and 180"
        );
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(parse_delimiter(","), Some(b','));
        assert_eq!(parse_delimiter(";"), Some(b';'));
        assert_eq!(parse_delimiter("\t"), Some(b'\t'));
        assert_eq!(parse_delimiter("|"), Some(b'|'));
        assert_eq!(parse_delimiter(":"), None);
    }

    #[test]
    fn test_wkt_is_longitude_first() {
        assert_eq!(
            compute_geo_wkt(Some(-6.2), Some(106.816666)).as_deref(),
            Some("POINT(106.816666 -6.2)")
        );
        assert_eq!(compute_geo_wkt(Some(-6.2), None), None);
    }

    #[test]
    fn test_geojson_skips_unlocated_customers() {
        let located = customer(Some(-6.2), Some(106.8));
        let unlocated = customer(None, None);

        let features: Vec<_> = [located, unlocated]
            .iter()
            .filter_map(Customer::to_geojson_feature)
            .collect();
        let collection = feature_collection(features);

        assert_eq!(collection["type"], "FeatureCollection");
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["coordinates"][0], 106.8);
        assert_eq!(features[0]["geometry"]["coordinates"][1], -6.2);
        assert_eq!(features[0]["properties"]["name"], "PT ABC");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any in-range pair is accepted and formats as POINT(lon lat)
        #[test]
        fn prop_valid_coordinates_accepted(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert!(validate_optional_coordinates(Some(lat), Some(lon)).is_ok());
            let wkt = GpsCoordinates::new(lat, lon).to_wkt();
            prop_assert_eq!(wkt, format!("POINT({} {})", lon, lat));
        }

        /// Out-of-range latitudes are rejected by both the form and the import paths
        #[test]
        fn prop_out_of_range_latitude_rejected(excess in 0.001f64..1000.0, south in any::<bool>()) {
            let lat = if south { -90.0 - excess } else { 90.0 + excess };
            prop_assert!(validate_optional_coordinates(Some(lat), Some(0.0)).is_err());

            let lat_text = lat.to_string();
            let row = ["Name", "", "", "", lat_text.as_str(), "0"];
            prop_assert_eq!(
                parse_customer_record(&row).unwrap_err(),
                "Latitude must be between -90 and 90"
            );
        }

        /// Only one coordinate is never accepted
        #[test]
        fn prop_half_pair_rejected(value in -90.0f64..=90.0) {
            prop_assert!(validate_optional_coordinates(Some(value), None).is_err());
            prop_assert!(validate_optional_coordinates(None, Some(value)).is_err());
        }
    }
}
