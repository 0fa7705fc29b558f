//! # Notification Inbox & Review API
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/v1/organizations/:id/notifications` | pending items by kind |
//! | GET | `/v1/organizations/:id/notifications/history` | resolved items, newest first |
//! | POST | `/v1/notifications/:id/respond` | accept or decline |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sphere_core::{Decision, NotificationId, OrganizationId};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::inbox::{self, Inbox, InboxItem};
use crate::state::AppState;
use crate::verification;

/// A review decision.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RespondRequest {
    /// `accepted` or `declined`.
    #[schema(value_type = String, example = "accepted")]
    pub decision: Decision,
    /// Optional reviewer note, stored on the notification and sent on chain.
    pub comment: Option<String>,
}

/// Decode a [`RespondRequest`]. A well-formed body naming an unknown
/// decision is a 422; anything else malformed is a 400.
fn respond_request(
    body: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<RespondRequest, AppError> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::JsonDataError(e)) => Err(AppError::Validation(format!(
            "decision must be \"accepted\" or \"declined\": {}",
            e.body_text()
        ))),
        Err(other) => extract_json(Err(other)),
    }
}

/// Result of a decision.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RespondResponse {
    pub notification_id: Uuid,
    /// Notification status: `accepted` or `declined`.
    pub status: String,
    pub document_id: Uuid,
    /// `verified` or `declined`.
    pub document_status: String,
    /// Verification transaction. Absent when a decline stayed off chain.
    pub transaction_hash: Option<String>,
}

/// Build the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/organizations/:id/notifications", get(list_pending))
        .route(
            "/v1/organizations/:id/notifications/history",
            get(list_history),
        )
        .route("/v1/notifications/:id/respond", post(respond))
}

/// GET /v1/organizations/:id/notifications: Pending review items.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/notifications",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Pending items, oldest first", body = Inbox),
        (status = 403, description = "Not this organization", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
async fn list_pending(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Inbox>, AppError> {
    let org = OrganizationId::from_uuid(id);
    session.require_organization(&org)?;
    Ok(Json(inbox::list_pending(&state, &org)))
}

/// GET /v1/organizations/:id/notifications/history: Resolved review items.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/notifications/history",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Resolved items, newest first", body = Vec<InboxItem>),
        (status = 403, description = "Not this organization", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
async fn list_history(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InboxItem>>, AppError> {
    let org = OrganizationId::from_uuid(id);
    session.require_organization(&org)?;
    Ok(Json(inbox::history(&state, &org)))
}

/// POST /v1/notifications/:id/respond: Accept or decline a credential.
#[utoipa::path(
    post,
    path = "/v1/notifications/{id}/respond",
    params(("id" = Uuid, Path, description = "Notification ID")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Decision applied", body = RespondResponse),
        (status = 404, description = "Notification not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already resolved or in progress", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid decision or comment", body = crate::error::ErrorBody),
        (status = 500, description = "Decision on chain, off-chain write failed", body = crate::error::ErrorBody),
        (status = 502, description = "Verification transaction failed", body = crate::error::ErrorBody),
    ),
    tag = "notifications"
)]
async fn respond(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    body: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<Json<RespondResponse>, AppError> {
    let req = respond_request(body)?;

    let outcome = verification::respond(
        &state,
        &session,
        NotificationId::from_uuid(id),
        req.decision,
        req.comment,
    )
    .await?;

    Ok(Json(RespondResponse {
        notification_id: *outcome.notification.id.as_uuid(),
        status: outcome.notification.status.as_str().to_string(),
        document_id: *outcome.document.id.as_uuid(),
        document_status: outcome.document.status.as_str().to_string(),
        transaction_hash: outcome.transaction_hash.map(String::from),
    }))
}
