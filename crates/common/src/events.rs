//! Versioned auth event payload carried on the auth events channel.
//!
//! Wire shape (JSON):
//!
//! ```json
//! {"version":1,"subject_id":"U1","event":"token_validated","emitted_at":1760000000}
//! ```
//!
//! Decoding is strict about meaning and lenient about age: a missing
//! `version` is read as version 1 and `emitted_at` may be absent, but an
//! unknown version, an unknown event kind or an empty subject is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written by this crate.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Default durable queue name for auth events.
pub const DEFAULT_AUTH_EVENTS_QUEUE: &str = "auth_events";

/// Kind of auth event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    /// A credential for the subject was successfully validated.
    TokenValidated,
}

impl AuthEventKind {
    /// Wire name of the event kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthEventKind::TokenValidated => "token_validated",
        }
    }
}

/// Errors raised when an event body cannot be accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    /// Body is not a JSON object of the expected field types.
    #[error("Invalid event JSON: {0}")]
    InvalidJson(String),

    /// Body declares a schema version this consumer does not understand.
    #[error("Unsupported event version: {0}")]
    UnsupportedVersion(u32),

    /// Body parsed but is missing required meaning.
    #[error("Invalid event shape: {0}")]
    InvalidShape(String),
}

/// A validation event emitted after a credential decodes as valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthEvent {
    /// Schema version.
    pub version: u32,

    /// Subject whose credential was validated.
    pub subject_id: String,

    /// Event kind.
    pub event: AuthEventKind,

    /// Emission time (Unix epoch seconds). Absent on legacy payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emitted_at: Option<i64>,
}

/// Field-by-field view of an incoming body, before any meaning is checked.
#[derive(Deserialize)]
struct RawAuthEvent {
    version: Option<u32>,
    subject_id: Option<String>,
    event: Option<String>,
    emitted_at: Option<i64>,
}

impl AuthEvent {
    /// Build a `token_validated` event stamped with the current time.
    #[must_use]
    pub fn token_validated(subject_id: impl Into<String>) -> Self {
        Self {
            version: EVENT_SCHEMA_VERSION,
            subject_id: subject_id.into(),
            event: AuthEventKind::TokenValidated,
            emitted_at: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// Serialize to the JSON wire shape.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse and version-gate a message body.
    ///
    /// # Errors
    ///
    /// Returns `EventDecodeError` for unparseable bodies, unknown versions,
    /// unknown event kinds and missing or empty subjects.
    pub fn decode(body: &[u8]) -> Result<Self, EventDecodeError> {
        let raw: RawAuthEvent = serde_json::from_slice(body)
            .map_err(|e| EventDecodeError::InvalidJson(e.to_string()))?;

        let version = raw.version.unwrap_or(EVENT_SCHEMA_VERSION);
        if version != EVENT_SCHEMA_VERSION {
            return Err(EventDecodeError::UnsupportedVersion(version));
        }

        let event = match raw.event.as_deref() {
            Some("token_validated") => AuthEventKind::TokenValidated,
            Some(other) => {
                return Err(EventDecodeError::InvalidShape(format!(
                    "unknown event kind '{other}'"
                )))
            }
            None => {
                return Err(EventDecodeError::InvalidShape(
                    "missing event kind".to_string(),
                ))
            }
        };

        let subject_id = match raw.subject_id {
            Some(s) if !s.is_empty() => s,
            _ => {
                return Err(EventDecodeError::InvalidShape(
                    "missing subject_id".to_string(),
                ))
            }
        };

        Ok(Self {
            version,
            subject_id,
            event,
            emitted_at: raw.emitted_at,
        })
    }
}
