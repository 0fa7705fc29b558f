//! # sphere-api: Credential Verification Service
//!
//! Users upload certificates and degrees, pay the verification fee to the
//! credential contract from their own wallet, and report the payment.
//! Organizations review what was paid for and accept or decline it; the
//! decision reaches the contract before it is mirrored here.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/v1/accounts/*`, `/v1/organizations` | [`routes::accounts`] | Profiles |
//! | `/v1/documents`, `/v1/users/*/documents` | [`routes::documents`] | Document store |
//! | `/v1/documents/*/payment` | [`routes::payments`] | Reconciliation |
//! | `/v1/organizations/*/notifications`, `/v1/notifications/*` | [`routes::notifications`] | Review inbox |
//! | `/v1/discrepancies` | [`routes::discrepancies`] | Operations |
//! | `/v1/documents/*/audit`, `/v1/audit/*` | [`routes::audit`] | Operations |
//! | `/v1/metrics` | this module | Operations |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated with utoipa at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod inbox;
pub mod middleware;
pub mod openapi;
pub mod reconciliation;
pub mod routes;
pub mod state;
pub mod verification;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use sphere_core::{DocumentStatus, NotificationStatus};
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, Session};
use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`) are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    // Body size limit: 2 MiB. The upload route overrides it.
    let api = Router::new()
        .merge(routes::accounts::router())
        .merge(routes::documents::router())
        .merge(routes::payments::router())
        .merge(routes::notifications::router())
        .merge(routes::discrepancies::router())
        .merge(routes::audit::router())
        .route("/v1/metrics", get(service_metrics))
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(metrics))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Documents per lifecycle status.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct DocumentCounts {
    pub unpaid: usize,
    pub pending: usize,
    pub verified: usize,
    pub declined: usize,
}

/// Service counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    pub requests: u64,
    /// 4xx and 5xx responses.
    pub errors: u64,
    pub server_errors: u64,
    /// Recorded chain/off-chain divergences.
    pub discrepancies: usize,
    pub documents: DocumentCounts,
    pub pending_notifications: usize,
}

/// GET /v1/metrics: Request counters and document lifecycle gauges.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    responses(
        (status = 200, description = "Counters", body = MetricsResponse),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "operations"
)]
async fn service_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
    session: Session,
) -> Result<Json<MetricsResponse>, AppError> {
    session.require_admin()?;

    let mut documents = DocumentCounts::default();
    for doc in state.documents.list() {
        match doc.status {
            DocumentStatus::Unpaid => documents.unpaid += 1,
            DocumentStatus::Pending => documents.pending += 1,
            DocumentStatus::Verified => documents.verified += 1,
            DocumentStatus::Declined => documents.declined += 1,
        }
    }
    let pending_notifications = state
        .notifications
        .filter(|n| n.status == NotificationStatus::Pending)
        .len();

    Ok(Json(MetricsResponse {
        requests: metrics.requests(),
        errors: metrics.errors(),
        server_errors: metrics.server_errors(),
        discrepancies: state.discrepancies.len(),
        documents,
        pending_notifications,
    }))
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check. Fails only when a configured database is unreachable;
/// a missing ledger or content store is reported by 503s on the routes
/// that need them.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
