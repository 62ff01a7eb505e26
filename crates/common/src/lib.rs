//! Common utilities and types shared across Tollgate components.

#![warn(clippy::pedantic)]

/// Module for the authentication error taxonomy
pub mod error;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the signed credential codec
pub mod credential;

/// Module for the versioned auth event payload
pub mod events;

/// Module for the auth events channel (publisher, consumer sources)
pub mod channel;
