//! # Audit Trail API
//!
//! Reads over the hash-chained audit log. Requires a database; without one
//! nothing is recorded and these endpoints return 503. Admin only.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::audit::{self, AuditEventRow};
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_INTEGRITY_LIMIT: i64 = 10_000;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub actor: Option<String>,
    pub action: String,
    pub metadata: serde_json::Value,
    pub previous_hash: Option<String>,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEventResponse {
    fn from(row: AuditEventRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            actor: row.actor,
            action: row.action,
            metadata: row.metadata,
            previous_hash: row.previous_hash,
            event_hash: row.event_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntegrityQuery {
    /// Events to check from the start of the chain.
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntegrityResponse {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/:id/audit", get(document_audit))
        .route("/v1/audit/integrity", get(chain_integrity))
}

fn pool(state: &AppState) -> Result<&sqlx::PgPool, AppError> {
    state
        .db_pool
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("audit log (no database configured)"))
}

/// GET /v1/documents/:id/audit: A document's transitions, oldest first.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}/audit",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Audit events", body = Vec<AuditEventResponse>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 503, description = "No database", body = crate::error::ErrorBody),
    ),
    tag = "operations"
)]
async fn document_audit(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEventResponse>>, AppError> {
    session.require_admin()?;
    let rows = audit::events_for_resource(pool(&state)?, "credential_document", id)
        .await
        .map_err(|e| AppError::Internal(format!("audit read failed: {e}")))?;
    Ok(Json(rows.into_iter().map(AuditEventResponse::from).collect()))
}

/// GET /v1/audit/integrity: Recompute the hash chain.
#[utoipa::path(
    get,
    path = "/v1/audit/integrity",
    params(("limit" = Option<i64>, Query, description = "Events to check")),
    responses(
        (status = 200, description = "Chain check result", body = IntegrityResponse),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 503, description = "No database", body = crate::error::ErrorBody),
    ),
    tag = "operations"
)]
async fn chain_integrity(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<IntegrityQuery>,
) -> Result<Json<IntegrityResponse>, AppError> {
    session.require_admin()?;
    let limit = query.limit.unwrap_or(DEFAULT_INTEGRITY_LIMIT).max(1);
    let result = audit::verify_chain_integrity(pool(&state)?, limit)
        .await
        .map_err(|e| AppError::Internal(format!("audit read failed: {e}")))?;
    if !result.chain_valid {
        tracing::error!(
            broken_links = result.broken_links,
            total_events = result.total_events,
            "audit chain integrity check failed"
        );
    }
    Ok(Json(IntegrityResponse {
        total_events: result.total_events,
        broken_links: result.broken_links,
        chain_valid: result.chain_valid,
    }))
}
