//! # Auth Test Utilities
//!
//! Shared test utilities for the identity and resource services.
//!
//! This crate provides:
//! - A fixed test signing secret and a credential builder
//! - Server harnesses spawning real identity and resource service instances
//!   on `127.0.0.1:0`, wired to in-memory channel and cache implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let identity = TestIdentityServer::spawn(MemoryChannel::new()).await?;
//!     let token = TestCredentialBuilder::for_subject("U1").build();
//!
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/v1/auth/validate", identity.url()))
//!         .json(&serde_json::json!({ "token": token }))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod token_builders;

pub use common::channel::memory::MemoryChannel;
pub use server_harness::*;
pub use token_builders::*;
