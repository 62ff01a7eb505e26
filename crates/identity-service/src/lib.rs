//! Identity Service Library
//!
//! Owns credential verification for the platform. Resource services call
//! `POST /v1/auth/validate` synchronously; every successful validation also
//! emits a `token_validated` event on the auth events channel without
//! holding up the response.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/validation_service.rs -> common::channel
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Validation service

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
