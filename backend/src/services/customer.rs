//! Customer locations for map tracking

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{compute_geo_wkt, feature_collection, Customer, CustomerRecord};
use sqlx::PgPool;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::customer_import::{self, ImportPreview, ImportRequest, ImportSummary};

/// Customer service
#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
    srid: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerInput {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_worker: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerInput {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,
    pub is_worker: Option<bool>,
    /// Remove the stored location; cannot be combined with new coordinates
    #[serde(default)]
    pub clear_location: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    description: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    geo_wkt: Option<String>,
    is_worker: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            description: row.description,
            phone: row.phone,
            email: row.email,
            latitude: row.latitude,
            longitude: row.longitude,
            geo_wkt: row.geo_wkt,
            is_worker: row.is_worker,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CUSTOMER_COLUMNS: &str = "id, name, description, phone, email, latitude, longitude, \
     geo_wkt, is_worker, created_at, updated_at";

fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<()> {
    shared::validate_optional_coordinates(latitude, longitude)
        .map_err(|m| AppError::validation("latitude", m))
}

/// Coordinates a customer ends up with after an update
fn updated_location(
    input: &UpdateCustomerInput,
    current: &Customer,
) -> AppResult<(Option<f64>, Option<f64>)> {
    if input.clear_location {
        if input.latitude.is_some() || input.longitude.is_some() {
            return Err(AppError::validation(
                "clearLocation",
                "Send either new coordinates or clearLocation, not both",
            ));
        }
        return Ok((None, None));
    }

    let latitude = input.latitude.or(current.latitude);
    let longitude = input.longitude.or(current.longitude);
    check_coordinates(latitude, longitude)?;
    Ok((latitude, longitude))
}

impl CustomerService {
    /// Create a new CustomerService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            srid: config.geo.srid,
        }
    }

    /// Customers with a location, for the map
    pub async fn list_located(&self) -> AppResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            SELECT {} FROM customers
            WHERE latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY name
            "#,
            CUSTOMER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// GeoJSON feature collection of located customers
    pub async fn geojson(&self) -> AppResult<serde_json::Value> {
        let features = self
            .list_located()
            .await?
            .iter()
            .filter_map(Customer::to_geojson_feature)
            .collect();
        Ok(feature_collection(features))
    }

    pub async fn get_customer(&self, customer_id: i64) -> AppResult<Customer> {
        sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .map(Customer::from)
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    pub async fn create_customer(&self, input: CreateCustomerInput) -> AppResult<Customer> {
        input.validate()?;
        check_coordinates(input.latitude, input.longitude)?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            INSERT INTO customers (name, description, phone, email, latitude, longitude, geo_wkt, is_worker)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(compute_geo_wkt(input.latitude, input.longitude))
        .bind(input.is_worker)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::unique_violation(e, "name"))?;

        Ok(row.into())
    }

    pub async fn update_customer(
        &self,
        customer_id: i64,
        input: UpdateCustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;
        let current = self.get_customer(customer_id).await?;

        let (latitude, longitude) = updated_location(&input, &current)?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                latitude = $6,
                longitude = $7,
                geo_wkt = $8,
                is_worker = COALESCE($9, is_worker),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(customer_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(latitude)
        .bind(longitude)
        .bind(compute_geo_wkt(latitude, longitude))
        .bind(input.is_worker)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::unique_violation(e, "name"))?;

        Ok(row.into())
    }

    // ========================================================================
    // Bulk import
    // ========================================================================

    pub fn preview_import(&self, request: &ImportRequest) -> AppResult<ImportPreview> {
        customer_import::preview(&request.csv, request.delimiter_byte()?, request.has_header)
    }

    /// Import customers row by row; bad rows are reported and skipped
    pub async fn import(&self, request: ImportRequest) -> AppResult<ImportSummary> {
        let rows = customer_import::parse_rows(
            &request.csv,
            request.delimiter_byte()?,
            request.has_header,
        )?;

        let mut summary = ImportSummary::default();
        for row in rows {
            let record = match row.record {
                Ok(record) => record,
                Err(message) => {
                    summary.record_error(row.row_number, &message);
                    continue;
                }
            };

            match self.import_record(&record, request.update_existing).await {
                Ok(ImportAction::Created) => summary.created += 1,
                Ok(ImportAction::Updated) => summary.updated += 1,
                Err(AppError::ValidationError(message)) => {
                    summary.record_error(row.row_number, &message)
                }
                Err(e) => summary.record_error(row.row_number, &e.to_string()),
            }
        }

        let summary = summary.finish();
        if summary.imported() == 0 {
            return Err(AppError::ValidationError(summary.summary));
        }

        tracing::info!(
            "Customer import: {} created, {} updated, {} errors",
            summary.created,
            summary.updated,
            summary.errors.len()
        );
        Ok(summary)
    }

    async fn import_record(
        &self,
        record: &CustomerRecord,
        update_existing: bool,
    ) -> AppResult<ImportAction> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM customers WHERE name = $1")
            .bind(&record.name)
            .fetch_optional(&self.db)
            .await?;

        let wkt = compute_geo_wkt(Some(record.latitude), Some(record.longitude));

        match existing {
            Some(_) if !update_existing => Err(AppError::ValidationError(format!(
                "Customer '{}' already exists",
                record.name
            ))),
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE customers
                    SET description = $2, phone = $3, email = $4, latitude = $5,
                        longitude = $6, geo_wkt = $7, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&record.description)
                .bind(&record.phone)
                .bind(&record.email)
                .bind(record.latitude)
                .bind(record.longitude)
                .bind(wkt)
                .execute(&self.db)
                .await?;
                Ok(ImportAction::Updated)
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO customers (name, description, phone, email, latitude, longitude, geo_wkt)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(&record.name)
                .bind(&record.description)
                .bind(&record.phone)
                .bind(&record.email)
                .bind(record.latitude)
                .bind(record.longitude)
                .bind(wkt)
                .execute(&self.db)
                .await?;
                Ok(ImportAction::Created)
            }
        }
    }

    // ========================================================================
    // PostGIS
    // ========================================================================

    /// Write the PostGIS geometry for a customer from its WKT
    pub async fn sync_geometry(&self, customer_id: i64) -> AppResult<Customer> {
        let customer = self.get_customer(customer_id).await?;
        let wkt = customer.geo_wkt.clone().ok_or_else(|| {
            AppError::validation("latitude", "Customer has no coordinates to sync")
        })?;

        let postgis = sqlx::query_scalar::<_, String>("SELECT postgis_full_version()")
            .fetch_one(&self.db)
            .await;
        if let Err(e) = postgis {
            tracing::warn!("PostGIS unavailable: {}", e);
            return Err(AppError::ServiceUnavailable(
                "PostGIS extension is not installed".to_string(),
            ));
        }

        sqlx::query(&format!(
            "ALTER TABLE customers ADD COLUMN IF NOT EXISTS geom geometry(Point, {})",
            self.srid
        ))
        .execute(&self.db)
        .await?;

        sqlx::query("UPDATE customers SET geom = ST_SetSRID(ST_GeomFromText($1), $2) WHERE id = $3")
            .bind(&wkt)
            .bind(self.srid)
            .bind(customer_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Synced geometry for customer {}", customer.name);
        Ok(customer)
    }
}

enum ImportAction {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located() -> Customer {
        Customer {
            id: 1,
            name: "PT ABC".to_string(),
            description: None,
            phone: None,
            email: None,
            latitude: Some(-6.2),
            longitude: Some(106.8),
            geo_wkt: compute_geo_wkt(Some(-6.2), Some(106.8)),
            is_worker: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_clear_location_removes_both_coordinates() {
        let input = UpdateCustomerInput {
            clear_location: true,
            ..Default::default()
        };
        assert_eq!(updated_location(&input, &located()).unwrap(), (None, None));
    }

    #[test]
    fn test_clear_location_with_coordinates_is_rejected() {
        let input = UpdateCustomerInput {
            clear_location: true,
            latitude: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            updated_location(&input, &located()),
            Err(AppError::Validation { field, .. }) if field == "clearLocation"
        ));
    }

    #[test]
    fn test_partial_update_keeps_other_coordinate() {
        let input = UpdateCustomerInput {
            latitude: Some(-7.0),
            ..Default::default()
        };
        assert_eq!(
            updated_location(&input, &located()).unwrap(),
            (Some(-7.0), Some(106.8))
        );
    }
}
