//! Authentication middleware for protected routes.
//!
//! Every request is authenticated fresh against the identity service. The
//! confirmation cache plays no part in the decision.

use crate::auth::{AuthDecision, ValidationClient};
use crate::errors::ResourceError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Client for the identity service validate endpoint.
    pub client: Arc<ValidationClient>,
}

/// Subject id of the authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub String);

/// Reject the request with `401` unless the identity service vouches for
/// its bearer credential.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// On success the handler finds an [`AuthenticatedSubject`] in the request
/// extensions.
#[instrument(skip_all, name = "resource.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ResourceError> {
    match state.client.decide(req.headers()).await {
        AuthDecision::Authenticated(subject_id) => {
            req.extensions_mut()
                .insert(AuthenticatedSubject(subject_id));
            Ok(next.run(req).await)
        }
        AuthDecision::Rejected(reason) => Err(ResourceError::Unauthenticated(reason)),
    }
}
