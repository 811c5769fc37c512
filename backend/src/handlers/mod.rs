//! HTTP request handlers

pub mod auth;
pub mod customers;
pub mod field_service;
pub mod health;
pub mod products;
pub mod receiving;

pub use auth::*;
pub use customers::*;
pub use field_service::*;
pub use health::*;
pub use products::*;
pub use receiving::*;
