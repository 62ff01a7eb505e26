//! Identity service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Credential
//! rejections carry their stable reason code so callers can tell an expired
//! credential from a forged one; both are still `401`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AuthError;
use serde::Serialize;
use thiserror::Error;

/// Value of the `WWW-Authenticate` header on `401` responses.
const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"tollgate\", error=\"invalid_token\"";

/// Identity service error type.
///
/// Maps to HTTP status codes:
/// - TokenMissing: 400 Bad Request
/// - Credential: 401 Unauthorized
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Token missing from request")]
    TokenMissing,

    #[error("Credential rejected: {0}")]
    Credential(AuthError),

    #[error("Internal server error")]
    Internal,
}

impl IdentityError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::TokenMissing => 400,
            IdentityError::Credential(_) => 401,
            IdentityError::Internal => 500,
        }
    }
}

impl From<AuthError> for IdentityError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::CredentialMissing => IdentityError::TokenMissing,
            AuthError::CredentialMalformed
            | AuthError::CredentialExpired
            | AuthError::SignatureInvalid => IdentityError::Credential(err),
            AuthError::UpstreamUnavailable(_) | AuthError::ChannelUnavailable(_) => {
                IdentityError::Internal
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            IdentityError::TokenMissing => (
                StatusCode::BAD_REQUEST,
                "TOKEN_MISSING",
                "Request body must include a token".to_string(),
            ),
            IdentityError::Credential(err) => {
                (StatusCode::UNAUTHORIZED, err.reason_code(), err.to_string())
            }
            IdentityError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = WWW_AUTHENTICATE_VALUE.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(IdentityError::TokenMissing.status_code(), 400);
        assert_eq!(
            IdentityError::Credential(AuthError::CredentialExpired).status_code(),
            401
        );
        assert_eq!(IdentityError::Internal.status_code(), 500);
    }

    #[test]
    fn test_from_auth_error() {
        assert!(matches!(
            IdentityError::from(AuthError::CredentialMissing),
            IdentityError::TokenMissing
        ));
        assert!(matches!(
            IdentityError::from(AuthError::SignatureInvalid),
            IdentityError::Credential(AuthError::SignatureInvalid)
        ));
        assert!(matches!(
            IdentityError::from(AuthError::ChannelUnavailable("down".to_string())),
            IdentityError::Internal
        ));
    }

    #[tokio::test]
    async fn test_credential_error_response_carries_reason() {
        let response = IdentityError::Credential(AuthError::CredentialExpired).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .get("WWW-Authenticate")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer")));

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CREDENTIAL_EXPIRED");
    }

    #[tokio::test]
    async fn test_token_missing_response() {
        let response = IdentityError::TokenMissing.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get("WWW-Authenticate").is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response = IdentityError::Internal.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
