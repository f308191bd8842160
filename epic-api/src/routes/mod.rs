//! HTTP routes of the EPIC API
//!
//! Route handlers organized by entity type. Everything under `/api/v1`
//! requires a bearer token except the health check and the token exchange.
//!
//! Includes:
//! - Catalog routes (areas, groups, programs, agencies, questions)
//! - Answer, user and organization routes scoped to the caller
//! - Admin imports and linkages generation
//! - CORS support for the browser client

pub mod admin;
pub mod agencies;
pub mod answers;
pub mod areas;
pub mod groups;
pub mod health;
pub mod organizations;
pub mod programs;
pub mod questions;
pub mod token;
pub mod users;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::{is_production_environment, ApiConfig};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::request_logging_middleware;

// ============================================================================
// OPENAPI ENDPOINTS
// ============================================================================

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api/docs/openapi.json";

/// Handler for the OpenAPI document when Swagger UI is not compiled in.
#[cfg(not(feature = "swagger-ui"))]
async fn openapi_json() -> impl axum::response::IntoResponse {
    axum::Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// A browser client in production must come from a known origin.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set EPIC_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Routes that need an authenticated user.
fn build_entity_routes() -> Router<AppState> {
    Router::new()
        .nest("/areas", areas::create_router())
        .nest("/groups", groups::create_router())
        .nest("/programs", programs::create_router())
        .nest("/agencies", agencies::create_router())
        .nest("/questions", questions::create_router())
        .nest("/answers", answers::create_router())
        .nest("/users", users::create_router())
        .nest("/organizations", organizations::create_router())
        .nest("/admin", admin::create_router())
}

/// Create the complete API router.
///
/// Layers run CORS first, then request tracing and logging, then (for the
/// protected `/api/v1` routes only) token authentication. Production refuses
/// to start without a real token secret and explicit CORS origins.
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    if is_production_environment() {
        state.auth.validate_for_production()?;
        validate_api_config_for_production(&state.config)?;
    }

    let auth_state = AuthMiddlewareState::from(&state);
    let protected = build_entity_routes().layer(from_fn_with_state(auth_state, auth_middleware));
    let public = Router::new()
        .nest("/health", health::create_router())
        .merge(token::create_router());

    let router = Router::new().nest("/api/v1", public.merge(protected));

    // Swagger UI serves the document itself.
    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(OPENAPI_PATH, axum::routing::get(openapi_json));

    let cors = build_cors_layer(&state.config);
    Ok(router
        .layer(from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// No configured origins means any origin, which only passes outside production.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS open to any origin");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS limited to configured origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
