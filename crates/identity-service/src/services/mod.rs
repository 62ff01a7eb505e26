//! Business logic for the identity service.

pub mod validation_service;

pub use validation_service::ValidationService;
