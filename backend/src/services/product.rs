//! Product master: brands, products, warehouses and stock thresholds

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    compute_alert_status, format_item_code, threshold_display_name, validate_threshold,
    AlertStatus, Brand, Product, Threshold, Warehouse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Product master service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrandInput {
    #[validate(length(min = 1, max = 255, message = "Brand name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    /// Assigned from the item code sequence when absent
    pub item_code: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub brand_id: Option<i64>,
    pub default_supplier: Option<String>,
    #[serde(default)]
    pub qr_enabled: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    pub item_code: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: Option<String>,
    pub brand_id: Option<i64>,
    pub default_supplier: Option<String>,
    pub qr_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 16, message = "Warehouse code must be 1-16 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Warehouse name is required"))]
    pub name: String,
}

/// Quick min/max edit; only the provided bounds change
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThresholdInput {
    pub min_qty: Option<Decimal>,
    pub max_qty: Option<Decimal>,
}

/// Threshold with the current stock level and its alert status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdReport {
    #[serde(flatten)]
    pub threshold: Threshold,
    pub display_name: String,
    pub current_qty: Decimal,
    pub alert_status: AlertStatus,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    item_code: String,
    name: String,
    brand_id: Option<i64>,
    default_supplier: Option<String>,
    qr_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            item_code: row.item_code,
            name: row.name,
            brand_id: row.brand_id,
            default_supplier: row.default_supplier,
            qr_enabled: row.qr_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ThresholdRow {
    id: i64,
    product_id: i64,
    warehouse_id: i64,
    min_qty: Decimal,
    max_qty: Decimal,
    product_name: String,
    warehouse_name: String,
    current_qty: Decimal,
}

impl ThresholdRow {
    fn into_report(self) -> ThresholdReport {
        let alert_status = compute_alert_status(self.min_qty, self.max_qty, self.current_qty);
        ThresholdReport {
            display_name: threshold_display_name(&self.product_name, &self.warehouse_name),
            current_qty: self.current_qty,
            alert_status,
            threshold: Threshold {
                id: self.id,
                product_id: self.product_id,
                warehouse_id: self.warehouse_id,
                min_qty: self.min_qty,
                max_qty: self.max_qty,
            },
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, item_code, name, brand_id, default_supplier, qr_enabled, created_at, updated_at";

const THRESHOLD_SELECT: &str = r#"
    SELECT t.id, t.product_id, t.warehouse_id, t.min_qty, t.max_qty,
           p.name AS product_name, w.name AS warehouse_name,
           COALESCE(q.quantity, 0) AS current_qty
    FROM product_thresholds t
    JOIN products p ON p.id = t.product_id
    JOIN warehouses w ON w.id = t.warehouse_id
    LEFT JOIN stock_quants q ON q.product_id = t.product_id AND q.warehouse_id = t.warehouse_id
"#;

/// Map a unique violation on products to the column that collided
fn product_conflict(err: sqlx::Error) -> AppError {
    let dangling = err
        .as_database_error()
        .map_or(false, |db| db.is_foreign_key_violation());
    if dangling {
        return AppError::missing_reference(err);
    }
    let constraint = err
        .as_database_error()
        .and_then(|db| db.constraint())
        .map(str::to_string);
    match constraint.as_deref() {
        Some("products_item_code_key") => AppError::unique_violation(err, "itemCode"),
        _ => AppError::unique_violation(err, "name"),
    }
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Brands
    // ========================================================================

    pub async fn list_brands(&self) -> AppResult<Vec<Brand>> {
        let rows = sqlx::query_as::<_, (i64, String, bool)>(
            "SELECT id, name, active FROM brands ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, active)| Brand { id, name, active })
            .collect())
    }

    pub async fn create_brand(&self, input: CreateBrandInput) -> AppResult<Brand> {
        input.validate()?;
        let (id, name, active) = sqlx::query_as::<_, (i64, String, bool)>(
            "INSERT INTO brands (name) VALUES ($1) RETURNING id, name, active",
        )
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::unique_violation(e, "name"))?;

        Ok(Brand { id, name, active })
    }

    // ========================================================================
    // Products
    // ========================================================================

    pub async fn list_products(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY item_code",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn get_product(&self, product_id: i64) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .map(Product::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;

        let item_code = match input.item_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                shared::validate_item_code(code).map_err(|m| AppError::validation("itemCode", m))?;
                code.to_string()
            }
            _ => {
                let sequence: i64 = sqlx::query_scalar("SELECT nextval('product_item_code_seq')")
                    .fetch_one(&self.db)
                    .await?;
                format_item_code(sequence)
            }
        };

        let product = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (item_code, name, brand_id, default_supplier, qr_enabled)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&item_code)
        .bind(input.name.trim())
        .bind(input.brand_id)
        .bind(&input.default_supplier)
        .bind(input.qr_enabled)
        .fetch_one(&self.db)
        .await
        .map_err(product_conflict)?;

        tracing::info!("Created product {} ({})", product.name, product.item_code);
        Ok(product.into())
    }

    pub async fn update_product(
        &self,
        product_id: i64,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        if let Some(code) = input.item_code.as_deref() {
            shared::validate_item_code(code.trim())
                .map_err(|m| AppError::validation("itemCode", m))?;
        }

        sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET item_code = COALESCE($2, item_code),
                name = COALESCE($3, name),
                brand_id = COALESCE($4, brand_id),
                default_supplier = COALESCE($5, default_supplier),
                qr_enabled = COALESCE($6, qr_enabled),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(input.item_code.as_deref().map(str::trim))
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.brand_id)
        .bind(&input.default_supplier)
        .bind(input.qr_enabled)
        .fetch_optional(&self.db)
        .await
        .map_err(product_conflict)?
        .map(Product::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn list_warehouses(&self) -> AppResult<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, code, name FROM warehouses ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, code, name)| Warehouse { id, code, name })
            .collect())
    }

    pub async fn create_warehouse(&self, input: CreateWarehouseInput) -> AppResult<Warehouse> {
        input.validate()?;
        let (id, code, name) = sqlx::query_as::<_, (i64, String, String)>(
            "INSERT INTO warehouses (code, name) VALUES ($1, $2) RETURNING id, code, name",
        )
        .bind(input.code.trim().to_uppercase())
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::unique_violation(e, "code"))?;

        Ok(Warehouse { id, code, name })
    }

    // ========================================================================
    // Thresholds
    // ========================================================================

    /// Upsert the min/max pair for a product in a warehouse
    pub async fn update_threshold(
        &self,
        product_id: i64,
        warehouse_id: i64,
        input: UpdateThresholdInput,
    ) -> AppResult<ThresholdReport> {
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT min_qty, max_qty FROM product_thresholds
            WHERE product_id = $1 AND warehouse_id = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let min_qty = input.min_qty.unwrap_or(existing.0);
        let max_qty = input.max_qty.unwrap_or(existing.1);
        validate_threshold(min_qty, max_qty)?;

        let threshold_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO product_thresholds (product_id, warehouse_id, min_qty, max_qty)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET min_qty = EXCLUDED.min_qty, max_qty = EXCLUDED.max_qty
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .bind(min_qty)
        .bind(max_qty)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::missing_reference)?;

        let report = sqlx::query_as::<_, ThresholdRow>(&format!(
            "{} WHERE t.id = $1",
            THRESHOLD_SELECT
        ))
        .bind(threshold_id)
        .fetch_one(&mut *tx)
        .await?
        .into_report();

        tx.commit().await?;
        Ok(report)
    }

    /// Thresholds with their current stock, optionally only those in one alert state
    pub async fn list_thresholds(
        &self,
        alert: Option<AlertStatus>,
    ) -> AppResult<Vec<ThresholdReport>> {
        let rows = sqlx::query_as::<_, ThresholdRow>(&format!(
            "{} ORDER BY p.name, w.name",
            THRESHOLD_SELECT
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(ThresholdRow::into_report)
            .filter(|r| alert.map_or(true, |a| r.alert_status == a))
            .collect())
    }
}
