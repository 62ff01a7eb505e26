//! Identity service client used to authenticate inbound requests.
//!
//! # Decision rules
//!
//! - No `Authorization` header, or one without the `Bearer ` prefix, is
//!   rejected locally. No call is made.
//! - Otherwise the credential is posted to the identity service's validate
//!   endpoint, bounded by the configured timeout (default 5s).
//! - `200 {subject_id}` authenticates. Every other outcome (`401`, `400`,
//!   `5xx`, network error, timeout, open circuit) rejects. The client fails
//!   closed and never retries.
//!
//! The confirmation cache is never consulted here.

use crate::auth::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::errors::ResourceError;
use crate::observability::metrics::record_validation_call;
use axum::http::{header, HeaderMap, StatusCode};
use common::error::AuthError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Prefix of a bearer `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Path of the identity service validate endpoint.
pub const VALIDATE_PATH: &str = "/v1/auth/validate";

/// Upper bound on TCP connect time, independent of the overall timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// The identity service vouched for this subject.
    Authenticated(String),
    /// No identity; the reason is for logs only.
    Rejected(AuthError),
}

impl AuthDecision {
    /// The subject id, if authenticated.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            AuthDecision::Authenticated(subject_id) => Some(subject_id),
            AuthDecision::Rejected(_) => None,
        }
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    subject_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
}

/// Extract the bearer credential from request headers.
///
/// # Errors
///
/// - `CredentialMissing` if there is no `Authorization` header or the
///   credential after the prefix is empty
/// - `CredentialMalformed` if the header is not valid text or lacks the
///   `Bearer ` prefix
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::CredentialMissing)?;

    let value = value.to_str().map_err(|_| AuthError::CredentialMalformed)?;

    let credential = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::CredentialMalformed)?
        .trim();

    if credential.is_empty() {
        return Err(AuthError::CredentialMissing);
    }

    Ok(credential)
}

/// HTTP client for the identity service validate endpoint.
#[derive(Clone)]
pub struct ValidationClient {
    client: Client,
    validate_url: String,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl ValidationClient {
    /// Create a client for the identity service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, ResourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| {
                tracing::error!(target: "resource.auth.client", error = %e, "Failed to build HTTP client");
                ResourceError::Internal
            })?;

        Ok(Self {
            client,
            validate_url: format!("{}{}", base_url.trim_end_matches('/'), VALIDATE_PATH),
            timeout,
            breaker: CircuitBreaker::new(breaker_config),
        })
    }

    /// Circuit breaker shared by clones of this client.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Authenticate a request from its headers.
    ///
    /// Returns `None` ("no identity") for every non-authenticated outcome.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Option<String> {
        match self.decide(headers).await {
            AuthDecision::Authenticated(subject_id) => Some(subject_id),
            AuthDecision::Rejected(_) => None,
        }
    }

    /// Authenticate a request from its headers, keeping the rejection reason.
    #[instrument(skip_all, name = "resource.auth.decide")]
    pub async fn decide(&self, headers: &HeaderMap) -> AuthDecision {
        let credential = match extract_bearer(headers) {
            Ok(credential) => credential,
            Err(reason) => {
                tracing::debug!(
                    target: "resource.auth.client",
                    reason = reason.reason_code(),
                    "No usable bearer credential, skipping validation call"
                );
                record_validation_call("no_credential", Duration::ZERO);
                return AuthDecision::Rejected(reason);
            }
        };

        match self.validate(credential).await {
            Ok(subject_id) => AuthDecision::Authenticated(subject_id),
            Err(reason) => AuthDecision::Rejected(reason),
        }
    }

    /// Validate a raw credential with the identity service.
    ///
    /// # Errors
    ///
    /// Returns the credential rejection reported by the identity service, or
    /// `UpstreamUnavailable` for timeouts, network errors, `5xx` responses,
    /// unreadable bodies and an open circuit.
    #[instrument(skip_all, name = "resource.auth.validate")]
    pub async fn validate(&self, credential: &str) -> Result<String, AuthError> {
        if !self.breaker.allow_request() {
            record_validation_call("circuit_open", Duration::ZERO);
            tracing::warn!(
                target: "resource.auth.client",
                "Circuit open, failing closed without calling identity service"
            );
            return Err(AuthError::UpstreamUnavailable("circuit open".to_string()));
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.call(credential)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::UpstreamUnavailable(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                self.breaker.record_success();
                record_validation_call("authenticated", elapsed);
            }
            Err(AuthError::UpstreamUnavailable(detail)) => {
                self.breaker.record_failure();
                record_validation_call("upstream_error", elapsed);
                tracing::warn!(
                    target: "resource.auth.client",
                    error = %detail,
                    elapsed_ms = elapsed.as_millis(),
                    "Identity service unavailable, failing closed"
                );
            }
            Err(reason) => {
                self.breaker.record_success();
                record_validation_call("rejected", elapsed);
                tracing::debug!(
                    target: "resource.auth.client",
                    reason = reason.reason_code(),
                    "Identity service rejected credential"
                );
            }
        }

        result
    }

    async fn call(&self, credential: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.validate_url)
            .json(&ValidateRequest { token: credential })
            .send()
            .await
            .map_err(|e| AuthError::UpstreamUnavailable(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let body: ValidateResponse = response.json().await.map_err(|e| {
                    AuthError::UpstreamUnavailable(format!("unreadable response: {e}"))
                })?;

                if body.subject_id.is_empty() {
                    return Err(AuthError::UpstreamUnavailable(
                        "response carried an empty subject_id".to_string(),
                    ));
                }

                Ok(body.subject_id)
            }
            StatusCode::UNAUTHORIZED => {
                // Unknown or unreadable reasons still reject
                let reason = response
                    .json::<ErrorResponse>()
                    .await
                    .ok()
                    .and_then(|body| AuthError::from_reason_code(&body.error.code))
                    .unwrap_or(AuthError::CredentialMalformed);
                Err(reason)
            }
            StatusCode::BAD_REQUEST => Err(AuthError::CredentialMissing),
            status => Err(AuthError::UpstreamUnavailable(format!(
                "identity service returned {status}"
            ))),
        }
    }
}
