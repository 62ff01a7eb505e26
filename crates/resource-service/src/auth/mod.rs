//! Request authentication against the identity service.

pub mod circuit_breaker;
pub mod validation_client;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use validation_client::{extract_bearer, AuthDecision, ValidationClient};
