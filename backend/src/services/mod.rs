//! Business logic services for the Warehouse Receiving Platform

pub mod auth;
pub mod customer;
pub mod customer_import;
pub mod field_service;
pub mod label;
pub mod product;
pub mod purchase;
pub mod qr;
pub mod receiving;
pub mod transfer;

pub use auth::AuthService;
pub use customer::CustomerService;
pub use field_service::FieldService;
pub use label::LabelService;
pub use product::ProductService;
pub use purchase::PurchaseService;
pub use receiving::ReceivingService;
pub use transfer::TransferService;
