//! Configuration management for the Warehouse Receiving Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RCV_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::models::UnexpectedProductPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Initial account creation
    #[serde(default)]
    pub auth: AuthConfig,

    /// QR receiving behaviour
    pub receiving: ReceivingConfig,

    /// Spatial settings for geometry sync
    pub geo: GeoConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Admin account created on startup when the users table is empty
    pub bootstrap_admin_email: Option<String>,

    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReceivingConfig {
    /// Scans for products with no open line: reject or open an unplanned line
    pub unexpected_product_policy: UnexpectedProductPolicy,

    /// Attempts at minting a unique token before giving up
    pub token_max_attempts: u32,

    /// Minimum rendered QR size in pixels
    pub qr_min_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeoConfig {
    /// Spatial reference id used when writing PostGIS geometry
    pub srid: i32,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("RCV_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("receiving.unexpected_product_policy", "reject")?
            .set_default("receiving.token_max_attempts", 5)?
            .set_default("receiving.qr_min_size", 160)?
            .set_default("geo.srid", 4326)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RCV_ prefix)
            .add_source(
                Environment::with_prefix("RCV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
