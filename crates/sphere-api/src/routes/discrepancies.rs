//! # Discrepancy Register
//!
//! `GET /v1/discrepancies`: decisions that landed on chain without the
//! matching off-chain write. Each one freezes its document until an
//! operator repairs it. Admin only.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sphere_core::ReconciliationDiscrepancy;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiscrepancyResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub notification_id: Uuid,
    pub contract_id: u64,
    /// `accepted` or `declined`, as sent on chain.
    pub decision: String,
    /// Verification transaction that landed.
    pub transaction_hash: Option<String>,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<ReconciliationDiscrepancy> for DiscrepancyResponse {
    fn from(d: ReconciliationDiscrepancy) -> Self {
        Self {
            id: *d.id.as_uuid(),
            document_id: *d.document_id.as_uuid(),
            notification_id: *d.notification_id.as_uuid(),
            contract_id: d.contract_id.value(),
            decision: d.decision.as_str().to_string(),
            transaction_hash: d.transaction_hash.map(String::from),
            reason: d.reason,
            recorded_at: d.recorded_at,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/discrepancies", get(list_discrepancies))
}

/// GET /v1/discrepancies: Open discrepancies, newest first.
#[utoipa::path(
    get,
    path = "/v1/discrepancies",
    responses(
        (status = 200, description = "Recorded discrepancies", body = Vec<DiscrepancyResponse>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
    ),
    tag = "operations"
)]
async fn list_discrepancies(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<DiscrepancyResponse>>, AppError> {
    session.require_admin()?;
    let mut all = state.discrepancies.list();
    all.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    Ok(Json(all.into_iter().map(DiscrepancyResponse::from).collect()))
}
