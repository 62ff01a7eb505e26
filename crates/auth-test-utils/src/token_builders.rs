//! Builder for test credentials.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Signing secret shared by the test harnesses.
pub const TEST_SECRET: &str = "test-credential-secret-0123456789abcdef";

/// A different secret, for forged credentials.
pub const FOREIGN_SECRET: &str = "foreign-credential-secret-fedcba9876543210";

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Builder for signed test credentials
///
/// # Example
/// ```rust,ignore
/// let token = TestCredentialBuilder::for_subject("U1")
///     .expires_in(900)
///     .build();
/// ```
pub struct TestCredentialBuilder {
    sub: String,
    exp: i64,
    iat: i64,
    secret: String,
    algorithm: Algorithm,
}

impl TestCredentialBuilder {
    /// Credential for `subject`, valid for 15 minutes, signed with [`TEST_SECRET`].
    pub fn for_subject(subject: &str) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.to_string(),
            exp: now + 900,
            iat: now,
            secret: TEST_SECRET.to_string(),
            algorithm: Algorithm::HS256,
        }
    }

    /// Set expiration in seconds from now (negative for already expired).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Utc::now().timestamp() + seconds;
        self
    }

    /// Set issued-at timestamp.
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Sign with a different secret.
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.to_string();
        self
    }

    /// Sign with a different HMAC algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Encode and sign.
    pub fn build(self) -> String {
        let claims = Claims {
            sub: self.sub,
            exp: self.exp,
            iat: self.iat,
        };
        encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("test credential should encode")
    }
}
