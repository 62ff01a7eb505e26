//! Authentication error taxonomy shared by the identity and resource services.
//!
//! Every variant maps to a stable reason code. Credential and upstream
//! failures all surface to end users as "unauthenticated"; the reason code
//! only exists so callers and logs can tell them apart.

use thiserror::Error;

/// Errors that can occur anywhere along the credential verification path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer credential was presented.
    #[error("Credential missing")]
    CredentialMissing,

    /// Credential could not be parsed or carries an invalid shape.
    #[error("Credential malformed")]
    CredentialMalformed,

    /// Credential signature verified but it has expired.
    #[error("Credential expired")]
    CredentialExpired,

    /// Credential signature did not verify against the shared secret.
    #[error("Credential signature invalid")]
    SignatureInvalid,

    /// The validation service could not be reached (network error or timeout).
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The auth events channel could not be reached.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),
}

impl AuthError {
    /// Stable, machine-readable reason code.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::CredentialMissing => "CREDENTIAL_MISSING",
            AuthError::CredentialMalformed => "CREDENTIAL_MALFORMED",
            AuthError::CredentialExpired => "CREDENTIAL_EXPIRED",
            AuthError::SignatureInvalid => "SIGNATURE_INVALID",
            AuthError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AuthError::ChannelUnavailable(_) => "CHANNEL_UNAVAILABLE",
        }
    }

    /// Parse a reason code produced by [`AuthError::reason_code`].
    ///
    /// Only credential reasons round-trip; infrastructure reasons carry
    /// detail that is never sent over the wire.
    #[must_use]
    pub fn from_reason_code(code: &str) -> Option<Self> {
        match code {
            "CREDENTIAL_MISSING" => Some(AuthError::CredentialMissing),
            "CREDENTIAL_MALFORMED" => Some(AuthError::CredentialMalformed),
            "CREDENTIAL_EXPIRED" => Some(AuthError::CredentialExpired),
            "SIGNATURE_INVALID" => Some(AuthError::SignatureInvalid),
            _ => None,
        }
    }
}
