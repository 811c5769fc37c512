//! Validation utilities for the Warehouse Receiving Platform

use crate::models::CustomerRecord;

/// Longest token we accept from a scanner
pub const MAX_TOKEN_LEN: usize = 128;

/// Number of columns an import row must carry
pub const CUSTOMER_IMPORT_COLUMNS: usize = 6;

// ============================================================================
// Receiving Validations
// ============================================================================

/// Validate a scanned token before looking it up
pub fn validate_scan_token(token: &str) -> Result<(), &'static str> {
    let token = token.trim();
    if token.is_empty() {
        return Err("Token is required");
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err("Token is too long");
    }
    if token.chars().any(char::is_control) {
        return Err("Token contains control characters");
    }
    Ok(())
}

/// Validate a manually supplied item code (letters, digits, '-', '_', '.')
pub fn validate_item_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("Item code cannot be empty");
    }
    if code.len() > 32 {
        return Err("Item code must be at most 32 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("Item code may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

// ============================================================================
// Location Validations
// ============================================================================

pub fn validate_latitude(latitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    Ok(())
}

pub fn validate_longitude(longitude: f64) -> Result<(), &'static str> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Coordinates are stored as a pair: both or neither.
pub fn validate_optional_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), &'static str> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            validate_latitude(lat)?;
            validate_longitude(lon)
        }
        (None, None) => Ok(()),
        _ => Err("Latitude and longitude must be provided together"),
    }
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

// ============================================================================
// Customer Import
// ============================================================================

/// Map a delimiter name or literal to its byte. Accepts `,` `;` `|` and tab.
pub fn parse_delimiter(value: &str) -> Option<u8> {
    match value {
        "," | "comma" => Some(b','),
        ";" | "semicolon" => Some(b';'),
        "\t" | "tab" => Some(b'\t'),
        "|" | "pipe" => Some(b'|'),
        _ => None,
    }
}

fn parse_coordinate(value: &str) -> Result<f64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse::<f64>()
        .map_err(|_| "Invalid latitude or longitude format".to_string())
}

/// Turn one import row into a customer record.
///
/// Columns: name, description, phone, email, latitude, longitude. Blank coordinates
/// read as 0.0.
pub fn parse_customer_record(fields: &[&str]) -> Result<CustomerRecord, String> {
    if fields.len() < CUSTOMER_IMPORT_COLUMNS {
        return Err(format!(
            "Row must have at least {} columns",
            CUSTOMER_IMPORT_COLUMNS
        ));
    }

    let latitude = parse_coordinate(fields[4])?;
    let longitude = parse_coordinate(fields[5])?;

    let name = fields[0].trim();
    if name.is_empty() {
        return Err("Customer name is required".to_string());
    }

    validate_latitude(latitude).map_err(str::to_string)?;
    validate_longitude(longitude).map_err(str::to_string)?;

    Ok(CustomerRecord {
        name: name.to_string(),
        description: fields[1].trim().to_string(),
        phone: fields[2].trim().to_string(),
        email: fields[3].trim().to_string(),
        latitude,
        longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scan_token() {
        assert!(validate_scan_token("PO0001-ITM-000001-9f2c1a7e").is_ok());
        assert!(validate_scan_token("   ").is_err());
        assert!(validate_scan_token(&"X".repeat(MAX_TOKEN_LEN + 1)).is_err());
        assert!(validate_scan_token("PO0001\n").is_ok());
        assert!(validate_scan_token("PO\u{0007}1").is_err());
    }

    #[test]
    fn test_validate_item_code() {
        assert!(validate_item_code("ITM-000001").is_ok());
        assert!(validate_item_code("SKU_12.A").is_ok());
        assert!(validate_item_code("").is_err());
        assert!(validate_item_code("has space").is_err());
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(validate_latitude(-90.0).is_ok());
        assert!(validate_latitude(90.0).is_ok());
        assert!(validate_latitude(90.0001).is_err());
        assert!(validate_latitude(f64::NAN).is_err());
        assert!(validate_longitude(180.0).is_ok());
        assert!(validate_longitude(-180.5).is_err());
    }

    #[test]
    fn test_optional_coordinates_pairing() {
        assert!(validate_optional_coordinates(None, None).is_ok());
        assert!(validate_optional_coordinates(Some(-6.2), Some(106.8)).is_ok());
        assert!(validate_optional_coordinates(Some(-6.2), None).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("info@abc.com").is_ok());
        assert!(validate_email("nope").is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(","), Some(b','));
        assert_eq!(parse_delimiter("tab"), Some(b'\t'));
        assert_eq!(parse_delimiter("|"), Some(b'|'));
        assert_eq!(parse_delimiter(":"), None);
    }

    #[test]
    fn test_parse_customer_record() {
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
    fn test_parse_customer_record_errors() {
        assert_eq!(
            parse_customer_record(&["PT ABC", "", "", ""]),
            Err("Row must have at least 6 columns".to_string())
        );
        assert_eq!(
            parse_customer_record(&["", "", "", "", "1", "1"]),
            Err("Customer name is required".to_string())
        );
        assert_eq!(
            parse_customer_record(&["A", "", "", "", "north", "1"]),
            Err("Invalid latitude or longitude format".to_string())
        );
        assert_eq!(
            parse_customer_record(&["A", "", "", "", "95", "1"]),
            Err("Latitude must be between -90 and 90".to_string())
        );
    }

    #[test]
    fn test_blank_coordinates_read_as_zero() {
        let record = parse_customer_record(&["A", "", "", "", "", " "]).unwrap();
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 0.0);
    }
}
