//! Resource Service Library
//!
//! Serves protected resources. Each request is authenticated by calling the
//! identity service synchronously; an unreachable identity service means
//! `401`, never access. Separately, a background consumer drains
//! `token_validated` events into a short-lived confirmation cache. That
//! cache is advisory and is never read to decide a request.
//!
//! # Architecture
//!
//! ```text
//! request -> middleware/auth.rs -> auth/validation_client.rs -> identity service
//!
//! auth_events queue -> tasks/auth_event_consumer.rs -> cache/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Validation client and circuit breaker
//! - `bootstrap` - Process wiring shared by both binaries
//! - `cache` - Confirmation cache (Redis or in-process)
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `tasks` - Auth event consumer

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod tasks;
