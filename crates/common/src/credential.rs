//! Signed credential codec.
//!
//! Credentials are compact JWTs (HS256) signed with a secret shared between
//! the identity service and anything allowed to mint credentials. Claims are
//! `{sub, exp, iat}`.
//!
//! # Decode order
//!
//! 1. Size check - reject inputs larger than [`MAX_CREDENTIAL_SIZE_BYTES`] before parsing
//! 2. Signature - HMAC verified with a constant-time comparison
//! 3. Claims shape - `sub`, `exp`, `iat` must be present, `sub` non-empty
//! 4. `iat` no further in the future than the clock skew tolerance
//! 5. Expiry - `exp + clock_skew >= now`
//!
//! A forged credential therefore always yields `SignatureInvalid` and never
//! reveals whether its claimed expiry has passed.
//!
//! Decoding is pure: no I/O, and the only clock read happens in
//! [`CredentialCodec::decode`]. Use [`CredentialCodec::decode_at`] to pin `now`.

use crate::error::AuthError;
use crate::secret::{ExposeSecret, SecretString};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted credential size in bytes (8KB).
///
/// Typical credentials are under 300 bytes. Anything larger is rejected
/// before base64 decoding or HMAC computation.
pub const MAX_CREDENTIAL_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance applied to expiry and issued-at checks.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Upper bound for a configured clock skew tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Minimum length of the shared signing secret (HS256 key size).
pub const MIN_SECRET_BYTES: usize = 32;

// =============================================================================
// Types
// =============================================================================

/// Result of decoding a raw credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Signature verified and the credential is within its lifetime.
    Valid(String),
    /// Signature verified but the credential has expired.
    Expired,
    /// Input is not a well-formed credential.
    Malformed,
    /// Signature does not verify against the shared secret.
    SignatureInvalid,
}

impl ValidationOutcome {
    /// Convert into the subject id or the matching [`AuthError`].
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` matching any non-`Valid` outcome.
    pub fn into_result(self) -> Result<String, AuthError> {
        match self {
            ValidationOutcome::Valid(subject_id) => Ok(subject_id),
            ValidationOutcome::Expired => Err(AuthError::CredentialExpired),
            ValidationOutcome::Malformed => Err(AuthError::CredentialMalformed),
            ValidationOutcome::SignatureInvalid => Err(AuthError::SignatureInvalid),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid(_) => "valid",
            ValidationOutcome::Expired => "expired",
            ValidationOutcome::Malformed => "malformed",
            ValidationOutcome::SignatureInvalid => "signature_invalid",
        }
    }
}

/// Claims carried by a credential.
///
/// `sub` is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject (identity reference).
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl fmt::Debug for CredentialClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

/// Errors raised while minting a credential.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The subject id was empty.
    #[error("Subject id must not be empty")]
    EmptySubject,

    /// Signing failed.
    #[error("Failed to encode credential: {0}")]
    Encoding(String),
}

// =============================================================================
// Codec
// =============================================================================

/// Encodes and decodes credentials with a shared secret.
pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock_skew_seconds: i64,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("secret", &"[REDACTED]")
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .finish()
    }
}

impl CredentialCodec {
    /// Create a codec for the given shared secret.
    ///
    /// `clock_skew` is clamped to [`MAX_CLOCK_SKEW`].
    #[must_use]
    pub fn new(secret: &SecretString, clock_skew: Duration) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by the codec after the signature, with its own skew.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        // Safe cast: bounded by MAX_CLOCK_SKEW (600 seconds)
        #[allow(clippy::cast_possible_wrap)]
        let clock_skew_seconds = clock_skew.min(MAX_CLOCK_SKEW).as_secs() as i64;

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation,
            clock_skew_seconds,
        }
    }

    /// Clock skew tolerance in seconds.
    #[must_use]
    pub fn clock_skew_seconds(&self) -> i64 {
        self.clock_skew_seconds
    }

    /// Mint a credential for `subject_id` valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the subject is empty or signing fails.
    pub fn issue(&self, subject_id: &str, ttl: Duration) -> Result<String, CredentialError> {
        let now = chrono::Utc::now().timestamp();
        let ttl_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_at(subject_id, now, now.saturating_add(ttl_seconds))
    }

    /// Mint a credential with explicit `iat` and `exp` timestamps.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError` if the subject is empty or signing fails.
    pub fn issue_at(
        &self,
        subject_id: &str,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<String, CredentialError> {
        if subject_id.is_empty() {
            return Err(CredentialError::EmptySubject);
        }

        let claims = CredentialClaims {
            sub: subject_id.to_string(),
            exp: expires_at,
            iat: issued_at,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CredentialError::Encoding(e.to_string()))
    }

    /// Decode and verify a raw credential against the current time.
    #[must_use]
    pub fn decode(&self, raw: &str) -> ValidationOutcome {
        self.decode_at(raw, chrono::Utc::now().timestamp())
    }

    /// Decode and verify a raw credential against an explicit `now`.
    #[must_use]
    pub fn decode_at(&self, raw: &str, now: i64) -> ValidationOutcome {
        if raw.len() > MAX_CREDENTIAL_SIZE_BYTES {
            tracing::debug!(
                target: "common.credential",
                size = raw.len(),
                max_size = MAX_CREDENTIAL_SIZE_BYTES,
                "Credential rejected: size exceeds maximum allowed"
            );
            return ValidationOutcome::Malformed;
        }

        // jsonwebtoken verifies the signature before it deserializes claims,
        // so a claims error below implies an authentic but malformed body.
        let claims = match decode::<CredentialClaims>(raw, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                let outcome = match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        ValidationOutcome::SignatureInvalid
                    }
                    _ => ValidationOutcome::Malformed,
                };
                tracing::debug!(
                    target: "common.credential",
                    error = %e,
                    outcome = outcome.label(),
                    "Credential rejected"
                );
                return outcome;
            }
        };

        if claims.sub.is_empty() {
            tracing::debug!(target: "common.credential", "Credential rejected: empty subject");
            return ValidationOutcome::Malformed;
        }

        if claims.iat > now.saturating_add(self.clock_skew_seconds) {
            tracing::debug!(
                target: "common.credential",
                iat = claims.iat,
                now = now,
                clock_skew_secs = self.clock_skew_seconds,
                "Credential rejected: iat too far in the future"
            );
            return ValidationOutcome::Malformed;
        }

        if claims.exp.saturating_add(self.clock_skew_seconds) < now {
            tracing::debug!(
                target: "common.credential",
                exp = claims.exp,
                now = now,
                clock_skew_secs = self.clock_skew_seconds,
                "Credential rejected: expired"
            );
            return ValidationOutcome::Expired;
        }

        ValidationOutcome::Valid(claims.sub)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const NOW: i64 = 1_700_000_000;

    fn codec() -> CredentialCodec {
        CredentialCodec::new(
            &SecretString::from("0123456789abcdef0123456789abcdef"),
            DEFAULT_CLOCK_SKEW,
        )
    }

    fn other_codec() -> CredentialCodec {
        CredentialCodec::new(
            &SecretString::from("ffffffffffffffffffffffffffffffff"),
            DEFAULT_CLOCK_SKEW,
        )
    }

    /// Replace the payload segment while keeping the original signature.
    fn swap_payload(token: &str, payload_json: &str) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(payload_json),
            parts[2]
        )
    }

    // -------------------------------------------------------------------------
    // Valid credentials
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_valid_credential() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW, NOW + 900).unwrap();

        assert_eq!(
            codec.decode_at(&token, NOW),
            ValidationOutcome::Valid("U1".to_string())
        );
    }

    #[test]
    fn test_issue_uses_wall_clock() {
        let codec = codec();
        let token = codec.issue("U1", Duration::from_secs(900)).unwrap();

        assert_eq!(codec.decode(&token), ValidationOutcome::Valid("U1".to_string()));
    }

    #[test]
    fn test_issue_rejects_empty_subject() {
        let result = codec().issue_at("", NOW, NOW + 900);
        assert!(matches!(result, Err(CredentialError::EmptySubject)));
    }

    // -------------------------------------------------------------------------
    // Expiry and clock skew
    // -------------------------------------------------------------------------

    #[test]
    fn test_expired_beyond_skew() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW - 3600, NOW - 61).unwrap();

        assert_eq!(codec.decode_at(&token, NOW), ValidationOutcome::Expired);
    }

    #[test]
    fn test_expired_within_skew_is_accepted() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW - 3600, NOW - 30).unwrap();

        assert_eq!(
            codec.decode_at(&token, NOW),
            ValidationOutcome::Valid("U1".to_string())
        );
    }

    #[test]
    fn test_expiry_boundary_exact() {
        let codec = codec();

        // exp + skew == now is the last accepted instant
        let at_boundary = codec.issue_at("U1", NOW - 3600, NOW - 60).unwrap();
        assert_eq!(
            codec.decode_at(&at_boundary, NOW),
            ValidationOutcome::Valid("U1".to_string())
        );

        // one second later is rejected
        assert_eq!(
            codec.decode_at(&at_boundary, NOW + 1),
            ValidationOutcome::Expired
        );
    }

    #[test]
    fn test_far_future_expiry_is_valid() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW, i64::MAX).unwrap();

        assert_eq!(
            codec.decode_at(&token, NOW),
            ValidationOutcome::Valid("U1".to_string())
        );
    }

    #[test]
    fn test_issue_saturates_huge_ttl() {
        let codec = codec();
        let token = codec.issue("U1", Duration::from_secs(u64::MAX)).unwrap();

        assert_eq!(codec.decode(&token), ValidationOutcome::Valid("U1".to_string()));
        assert_eq!(
            codec.decode_at(&token, i64::MAX),
            ValidationOutcome::Valid("U1".to_string())
        );
    }

    #[test]
    fn test_iat_too_far_in_future_is_malformed() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW + 61, NOW + 900).unwrap();

        assert_eq!(codec.decode_at(&token, NOW), ValidationOutcome::Malformed);
    }

    #[test]
    fn test_iat_within_skew_is_accepted() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW + 60, NOW + 900).unwrap();

        assert_eq!(
            codec.decode_at(&token, NOW),
            ValidationOutcome::Valid("U1".to_string())
        );
    }

    #[test]
    fn test_clock_skew_is_clamped() {
        let codec = CredentialCodec::new(
            &SecretString::from("0123456789abcdef0123456789abcdef"),
            Duration::from_secs(86_400),
        );
        assert_eq!(codec.clock_skew_seconds(), 600);
    }

    // -------------------------------------------------------------------------
    // Signature checks come first
    // -------------------------------------------------------------------------

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let token = other_codec().issue_at("U1", NOW, NOW + 900).unwrap();

        assert_eq!(
            codec().decode_at(&token, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    #[test]
    fn test_forged_expired_credential_is_signature_invalid() {
        // Expired AND forged: the signature verdict must win
        let token = other_codec().issue_at("U1", NOW - 7200, NOW - 3600).unwrap();

        assert_eq!(
            codec().decode_at(&token, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    #[test]
    fn test_tampered_payload_is_signature_invalid() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW, NOW + 900).unwrap();
        let tampered = swap_payload(
            &token,
            &format!(r#"{{"sub":"admin","exp":{},"iat":{}}}"#, NOW + 900, NOW),
        );

        assert_eq!(
            codec.decode_at(&tampered, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    #[test]
    fn test_tampered_expired_payload_is_signature_invalid() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW, NOW + 900).unwrap();
        let tampered = swap_payload(
            &token,
            &format!(r#"{{"sub":"U1","exp":{},"iat":{}}}"#, NOW - 3600, NOW - 7200),
        );

        assert_eq!(
            codec.decode_at(&tampered, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    #[test]
    fn test_truncated_signature_is_signature_invalid() {
        let codec = codec();
        let token = codec.issue_at("U1", NOW, NOW + 900).unwrap();
        let truncated = format!("{}.{}", token.rsplit_once('.').unwrap().0, "AAAA");

        assert_eq!(
            codec.decode_at(&truncated, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    #[test]
    fn test_algorithm_mismatch_is_signature_invalid() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let claims = CredentialClaims {
            sub: "U1".to_string(),
            exp: NOW + 900,
            iat: NOW,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        assert_eq!(
            codec().decode_at(&token, NOW),
            ValidationOutcome::SignatureInvalid
        );
    }

    // -------------------------------------------------------------------------
    // Malformed input
    // -------------------------------------------------------------------------

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.decode_at("not-a-credential", NOW), ValidationOutcome::Malformed);
        assert_eq!(codec.decode_at("", NOW), ValidationOutcome::Malformed);
        assert_eq!(codec.decode_at("a.b.c", NOW), ValidationOutcome::Malformed);
    }

    #[test]
    fn test_oversized_is_malformed() {
        let oversized = "a".repeat(MAX_CREDENTIAL_SIZE_BYTES + 1);
        assert_eq!(codec().decode_at(&oversized, NOW), ValidationOutcome::Malformed);
    }

    #[test]
    fn test_signed_body_missing_claims_is_malformed() {
        #[derive(Serialize)]
        struct SubjectOnly {
            sub: String,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &SubjectOnly {
                sub: "U1".to_string(),
            },
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();

        assert_eq!(codec().decode_at(&token, NOW), ValidationOutcome::Malformed);
    }

    #[test]
    fn test_signed_empty_subject_is_malformed() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &CredentialClaims {
                sub: String::new(),
                exp: NOW + 900,
                iat: NOW,
            },
            &EncodingKey::from_secret(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap();

        assert_eq!(codec().decode_at(&token, NOW), ValidationOutcome::Malformed);
    }

    // -------------------------------------------------------------------------
    // Outcome helpers and Debug redaction
    // -------------------------------------------------------------------------

    #[test]
    fn test_outcome_into_result() {
        assert_eq!(
            ValidationOutcome::Valid("U1".to_string()).into_result(),
            Ok("U1".to_string())
        );
        assert_eq!(
            ValidationOutcome::Expired.into_result(),
            Err(AuthError::CredentialExpired)
        );
        assert_eq!(
            ValidationOutcome::Malformed.into_result(),
            Err(AuthError::CredentialMalformed)
        );
        assert_eq!(
            ValidationOutcome::SignatureInvalid.into_result(),
            Err(AuthError::SignatureInvalid)
        );
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = CredentialClaims {
            sub: "user-42".to_string(),
            exp: NOW,
            iat: NOW,
        };
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("user-42"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_codec_debug_redacts_secret() {
        let debug_str = format!("{:?}", codec());
        assert!(!debug_str.contains("0123456789abcdef"));
    }
}
