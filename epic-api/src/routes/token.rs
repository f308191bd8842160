//! Token Exchange
//!
//! Trades a username and password for a bearer token. Public.

use axum::{extract::State, routing::post, Json, Router};
use epic_core::require_text;
use std::sync::Arc;

use crate::{
    auth::AuthConfig,
    error::{ApiError, ApiResult},
    services::authenticate,
    state::{AppState, SharedStore},
    types::{TokenRequest, TokenResponse},
};

/// POST /api/v1/token-auth - Obtain a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/token-auth",
    tag = "Auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid credentials", body = ApiError),
    ),
)]
pub async fn obtain_token(
    State(store): State<SharedStore>,
    State(auth): State<Arc<AuthConfig>>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let username = require_text("username", &req.username)?;
    let token = authenticate(store.as_ref(), &auth, username, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/token-auth", post(obtain_token))
}
