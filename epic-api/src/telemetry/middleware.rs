//! Request logging middleware

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info_span, Instrument};

/// Replace id path segments with `{id}` so log fields group by route.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Wrap every request in a span and log its outcome.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = normalize_path(request.uri().path());

    let span = info_span!("http_request", http.method = %method, http.route = %route);

    async move {
        let response = next.run(request).await;
        let status = response.status();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), elapsed_ms, "Request failed");
        } else if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "Request rejected");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms, "Request completed");
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuids() {
        let path = "/api/v1/answers/0190f0a4-6a2c-7c4e-9c1f-2d3b4a5c6d7e";
        assert_eq!(normalize_path(path), "/api/v1/answers/{id}");
    }

    #[test]
    fn test_normalize_path_keeps_plain_segments() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }
}
