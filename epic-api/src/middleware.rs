//! Axum Middleware for Authentication
//!
//! Validates the bearer token, loads the user it names and injects that
//! user into the request extensions. Handlers receive it through
//! [`AuthExtractor`].

use crate::auth::{bearer_token, validate_jwt_token, AuthConfig};
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, SharedStore};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use epic_core::EpicUser;
use std::sync::Arc;

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for authentication middleware.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
    pub store: SharedStore,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: Arc<AuthConfig>, store: SharedStore) -> Self {
        Self { auth_config, store }
    }
}

impl From<&AppState> for AuthMiddlewareState {
    fn from(state: &AppState) -> Self {
        Self::new(state.auth.clone(), state.store.clone())
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Authenticate the request and attach the principal.
///
/// Returns 401 when the header is missing or malformed, the token does not
/// verify, or its user no longer exists.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            AuthMiddlewareError(ApiError::unauthorized(
                "Authentication credentials were not provided",
            ))
        })?;

    let principal = authenticate_header(&state, header)
        .await
        .map_err(AuthMiddlewareError)?;

    tracing::debug!(user_id = %principal.id, username = %principal.username, "Authenticated request");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

async fn authenticate_header(state: &AuthMiddlewareState, header: &str) -> ApiResult<EpicUser> {
    let token = bearer_token(header)?;
    let claims = validate_jwt_token(&state.auth_config, token)?;
    let user_id = claims.user_id()?;

    state
        .store
        .user_get(user_id)
        .await?
        .ok_or_else(|| ApiError::invalid_token("User for this token no longer exists"))
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// The authenticated user of the current request.
///
/// `auth_middleware` must run on the route; without it the extractor fails
/// with a 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub EpicUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<EpicUser>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "Principal not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = EpicUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
