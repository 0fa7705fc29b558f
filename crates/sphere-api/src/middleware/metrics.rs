//! # Request Metrics
//!
//! Process-lifetime counters, read by `GET /v1/metrics`. The router
//! installs one [`ApiMetrics`] as an extension; every clone shares it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    server_errors: AtomicU64,
}

/// Shared response counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    counters: Arc<Counters>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one response.
    pub fn record(&self, status: StatusCode) {
        let c = &self.counters;
        c.requests.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() || status.is_server_error() {
            c.errors.fetch_add(1, Ordering::Relaxed);
        }
        if status.is_server_error() {
            c.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    /// 4xx and 5xx responses.
    pub fn errors(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn server_errors(&self) -> u64 {
        self.counters.server_errors.load(Ordering::Relaxed)
    }
}

/// Count every response that passes through. A no-op when the extension
/// is missing.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let response = next.run(request).await;
    if let Some(metrics) = metrics {
        metrics.record(response.status());
    }
    response
}
