//! Logging setup and per-request instrumentation.

pub mod middleware;
pub mod tracer;

pub use middleware::request_logging_middleware;
pub use tracer::{init_tracer, TelemetryConfig};
