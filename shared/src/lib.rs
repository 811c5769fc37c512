//! Shared types and models for the Warehouse Receiving Platform
//!
//! This crate holds the domain models and the pure decision logic (line allocation,
//! completion checks, label status transitions, threshold alerts) used by the backend.
//! Nothing in here touches the database.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
