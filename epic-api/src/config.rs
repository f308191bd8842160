//! API Configuration Module
//!
//! Server settings loaded from environment variables, with defaults that
//! work for local development.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// STORAGE BACKEND
// ============================================================================

/// Which `EpicStore` implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(ApiError::invalid_input(format!(
                "Unknown storage backend '{}', expected 'memory' or 'postgres'",
                other
            ))),
        }
    }
}

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Upper bound for rendering the report document.
    pub report_timeout: Duration,

    pub storage: StorageBackend,

    /// Seed the demo organizations and users at startup.
    pub seed_demo: bool,

    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400,
            report_timeout: Duration::from_secs(120),
            storage: StorageBackend::Memory,
            seed_demo: false,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `EPIC_BIND_ADDR`: Listen address (default: 0.0.0.0:8000)
    /// - `EPIC_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `EPIC_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `EPIC_REPORT_TIMEOUT_SECS`: Report document timeout (default: 120)
    /// - `EPIC_STORAGE`: "memory" or "postgres" (default: memory)
    /// - `EPIC_SEED_DEMO`: "true" or "false" (default: false)
    /// - `EPIC_LOG_FORMAT`: "json" or "pretty" (default: json)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let cors_origins = std::env::var("EPIC_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let storage = match std::env::var("EPIC_STORAGE") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::default(),
        };

        Ok(Self {
            bind_addr: std::env::var("EPIC_BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins,
            cors_max_age_secs: std::env::var("EPIC_CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
            report_timeout: std::env::var("EPIC_REPORT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.report_timeout),
            storage,
            seed_demo: std::env::var("EPIC_SEED_DEMO")
                .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),
            log_format: std::env::var("EPIC_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
        })
    }

    /// Parse the bind address.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        self.bind_addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", self.bind_addr, e))
        })
    }

    /// Check if running with a strict CORS policy.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}

/// Check if `EPIC_ENVIRONMENT` names a production deployment.
pub fn is_production_environment() -> bool {
    std::env::var("EPIC_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}
