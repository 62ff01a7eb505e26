//! Handler for the authenticated caller's identity.

use crate::middleware::AuthenticatedSubject;
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Response body for `GET /v1/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub subject_id: String,
    /// Whether the confirmation cache currently holds a confirmed entry.
    /// Informational only; it played no part in authenticating this request.
    pub cache_confirmed: bool,
}

/// Handler for GET /v1/me
///
/// Runs behind `require_auth`.
#[instrument(skip_all, name = "resource.handlers.me")]
pub async fn current_subject(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedSubject(subject_id)): Extension<AuthenticatedSubject>,
) -> Json<MeResponse> {
    let cache_confirmed = match state.cache.get(&subject_id).await {
        Ok(entry) => entry.is_some_and(|entry| entry.confirmed),
        Err(e) => {
            tracing::warn!(
                target: "resource.handlers.me",
                error = %e,
                "Confirmation cache read failed, reporting unconfirmed"
            );
            false
        }
    };

    Json(MeResponse {
        subject_id,
        cache_confirmed,
    })
}
