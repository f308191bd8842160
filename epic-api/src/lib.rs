//! EPIC API - REST API Layer
//!
//! Serves the EPIC assessment: a catalog of areas, groups and programs,
//! questions of four kinds, user answers scoped by organization and the
//! reports built from them. Storage is any `EpicStore`; the server picks the
//! in-memory store or PostgreSQL at startup.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod password;
pub mod render;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use auth::{generate_jwt_token, validate_jwt_token, AuthConfig, Claims};
pub use config::{ApiConfig, LogFormat, StorageBackend};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use render::{ReportRenderer, TextReportRenderer};
pub use routes::create_api_router;
pub use state::{AppState, SharedStore};
pub use types::*;
