//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "reelforge_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reelforge_http_request_duration_seconds";

    // SSE metrics
    pub const SSE_CONNECTIONS_TOTAL: &str = "reelforge_sse_connections_total";
    pub const SSE_CONNECTIONS_ACTIVE: &str = "reelforge_sse_connections_active";

    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "reelforge_jobs_submitted_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "reelforge_jobs_cancelled_total";

    // Credit metrics
    pub const CREDITS_SPENT_TOTAL: &str = "reelforge_credits_spent_total";
    pub const CREDITS_GRANTED_TOTAL: &str = "reelforge_credits_granted_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job submission.
pub fn record_job_submitted(job_type: &str, cost: u32) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
    counter!(names::CREDITS_SPENT_TOTAL, &labels).increment(cost as u64);
}

/// Record a job cancellation.
pub fn record_job_cancelled(job_type: &str) {
    let labels = [("type", job_type.to_string())];
    counter!(names::JOBS_CANCELLED_TOTAL, &labels).increment(1);
}

/// Record granted credits (purchase, refund, bonus).
pub fn record_credits_granted(tx_type: &str, amount: u32) {
    let labels = [("type", tx_type.to_string())];
    counter!(names::CREDITS_GRANTED_TOTAL, &labels).increment(amount as u64);
}

/// Record an SSE connection opening or closing.
pub fn record_sse_connection(delta: i64) {
    if delta > 0 {
        counter!(names::SSE_CONNECTIONS_TOTAL).increment(delta as u64);
    }
    gauge!(names::SSE_CONNECTIONS_ACTIVE).increment(delta as f64);
}

/// Axum middleware that records request metrics.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse id path segments so metric cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() > 20 || segment.chars().any(|c| c.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_collapses_ids() {
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000"),
            "/api/jobs/:id"
        );
        assert_eq!(sanitize_path("/api/credits/history"), "/api/credits/history");
    }
}
