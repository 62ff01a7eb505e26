//! Credential validation handler.
//!
//! `POST /v1/auth/validate` with body `{"token": "<credential>"}`.
//!
//! | Outcome | Status | Body |
//! |---|---|---|
//! | valid | 200 | `{"subject_id": "..."}` |
//! | token missing or body unreadable | 400 | `TOKEN_MISSING` |
//! | expired / malformed / bad signature | 401 | reason code |

use crate::errors::IdentityError;
use crate::routes::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use common::secret::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Request body for the validate endpoint. The token is redacted in Debug.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub token: Option<SecretString>,
}

/// Successful validation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub subject_id: String,
}

/// Handler for POST /v1/auth/validate
#[instrument(skip_all, name = "identity.handlers.validate")]
pub async fn validate_credential(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, IdentityError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(target: "identity.handlers.validate", error = %e, "Unreadable validate body");
        IdentityError::TokenMissing
    })?;

    let token = request.token.ok_or(IdentityError::TokenMissing)?;

    let subject_id = state.validation.validate(token.expose_secret())?;

    Ok(Json(ValidateResponse { subject_id }))
}
