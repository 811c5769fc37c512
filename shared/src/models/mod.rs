//! Domain models for the Warehouse Receiving Platform

mod customer;
mod field_service;
mod label;
mod order;
mod product;
mod transfer;
mod user;

pub use customer::*;
pub use field_service::*;
pub use label::*;
pub use order::*;
pub use product::*;
pub use transfer::*;
pub use user::*;
