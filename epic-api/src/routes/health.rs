//! Health Check Endpoint
//!
//! `/api/v1/health/ping` answers without authentication so load balancers
//! and the frontend can check the service.

use axum::{extract::State, routing::get, Json, Router};

use crate::state::AppState;
use crate::types::PingResponse;

/// GET /api/v1/health/ping - Liveness check
#[utoipa::path(
    get,
    path = "/api/v1/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = PingResponse),
    ),
)]
pub async fn ping(State(start_time): State<std::time::Instant>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "pong".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: start_time.elapsed().as_secs(),
    })
}

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new().route("/ping", get(ping))
}
