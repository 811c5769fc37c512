//! Route definitions for the Warehouse Receiving Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login/refresh public, user creation protected)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes - QR receiving
        .nest("/receiving", receiving_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()))
        .nest("/labels", label_routes(state.clone()))
        .nest("/transfers", transfer_routes(state.clone()))
        // Protected routes - product master
        .merge(product_routes(state.clone()))
        // Protected routes - customer map
        .nest("/customers", customer_routes(state.clone()))
        // Protected routes - field service
        .nest("/fsm", fsm_admin_routes(state.clone()))
        .nest("/fsm_orders", fsm_mobile_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/users", post(handlers::create_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .merge(protected)
}

/// Scan endpoint (protected)
fn receiving_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/scan", post(handlers::scan_label))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Purchase order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/confirm", post(handlers::confirm_order))
        .route(
            "/:order_id/labels",
            get(handlers::list_order_labels).post(handlers::generate_labels),
        )
        .route("/:order_id/labels/export", get(handlers::export_order_labels))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Label lifecycle routes (protected)
fn label_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/by-token/:token", get(handlers::get_label_by_token))
        .route("/:label_id/sell", post(handlers::sell_label))
        .route("/:label_id/return", post(handlers::return_label))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_transfer))
        .route("/:transfer_id", get(handlers::get_transfer))
        .route("/:transfer_id/validate", post(handlers::validate_transfer))
        .route(
            "/:transfer_id/lines/:line_id/receive",
            post(handlers::receive_transfer_line),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Brands, products, warehouses and thresholds (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/brands", get(handlers::list_brands).post(handlers::create_brand))
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/products/:product_id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route(
            "/products/:product_id/thresholds/:warehouse_id",
            put(handlers::update_threshold),
        )
        .route(
            "/warehouses",
            get(handlers::list_warehouses).post(handlers::create_warehouse),
        )
        .route("/thresholds", get(handlers::list_thresholds))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Customer map routes (protected)
fn customer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_customers).post(handlers::create_customer),
        )
        .route("/geojson", get(handlers::customers_geojson))
        .route("/import/preview", post(handlers::preview_import))
        .route("/import", post(handlers::import_customers))
        .route(
            "/:customer_id",
            get(handlers::get_customer).put(handlers::update_customer),
        )
        .route(
            "/:customer_id/sync-geometry",
            post(handlers::sync_customer_geometry),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Field-service order administration (protected)
fn fsm_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::create_fsm_order))
        .route("/orders/:order_id", get(handlers::get_fsm_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Technician mobile routes (protected)
fn fsm_mobile_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::list_assigned_orders))
        .route("/:order_id/update", post(handlers::update_fsm_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
