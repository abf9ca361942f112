//! Prometheus metrics endpoint and HTTP request tracking middleware.
//!
//! This module provides:
//! - A `/metrics` endpoint that returns Prometheus-formatted metrics
//! - Middleware for tracking HTTP request counts and durations
//! - Helper functions to record lead intake

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const LEADS_CREATED_TOTAL: &str = "leads_created_total";
pub const LEADS_TOTAL: &str = "leads_total";

/// Path label for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Install the Prometheus recorder. Call once during startup.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(LEADS_CREATED_TOTAL, "Leads created, by source");
    describe_gauge!(LEADS_TOTAL, "Number of leads stored, by status");

    Ok(handle)
}

/// GET /metrics - Returns Prometheus-formatted metrics.
///
/// This endpoint is accessible without authentication.
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_gauge_metrics(&state).await;

    match state.metrics_handle.as_ref() {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics not initialized".to_string(),
        ),
    }
}

async fn update_gauge_metrics(state: &AppState) {
    match sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM leads GROUP BY status",
    )
    .fetch_all(&state.db)
    .await
    {
        Ok(rows) => {
            for (status, count) in rows {
                gauge!(LEADS_TOTAL, "status" => status).set(count as f64);
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to count leads for metrics"),
    }
}

/// Track request count and latency in Prometheus and the performance monitor.
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let (method, path) = request_labels(&request);

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();

    state.monitor.record(&method, &path, status, elapsed);

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status.to_string()).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path)
        .record(elapsed.as_secs_f64());

    response
}

/// Method and route template of a request. Raw paths and unknown methods
/// never become labels, so the label set stays bounded.
fn request_labels(request: &Request<Body>) -> (String, String) {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str())
        .unwrap_or(UNMATCHED_ROUTE)
        .to_string();

    let method = match *request.method() {
        Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        | Method::HEAD | Method::OPTIONS => request.method().as_str(),
        _ => "OTHER",
    };

    (method.to_string(), path)
}

/// Record a newly created lead.
pub fn record_lead_created(source: &str) {
    counter!(LEADS_CREATED_TOTAL, "source" => source.to_string()).increment(1);
}
