//! Resource service error types.
//!
//! Every authentication failure, whether the credential is bad or the
//! identity service could not be reached, is a `401` with the same generic
//! body. The precise reason is logged server-side only.

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

/// Resource service error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(AuthError),

    #[error("Internal server error")]
    Internal,
}

impl ResourceError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ResourceError::Unauthenticated(_) => 401,
            ResourceError::Internal => 500,
        }
    }
}

impl From<AuthError> for ResourceError {
    fn from(err: AuthError) -> Self {
        ResourceError::Unauthenticated(err)
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

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ResourceError::Unauthenticated(reason) => {
                tracing::debug!(
                    target: "resource.auth",
                    reason = reason.reason_code(),
                    "Request unauthenticated"
                );
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHENTICATED",
                    "Authentication required".to_string(),
                )
            }
            ResourceError::Internal => (
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
