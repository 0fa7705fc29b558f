//! # Payment Reconciliation API
//!
//! `POST /v1/documents/:id/payment`: the client reports the transaction
//! that paid the upload fee. See [`crate::reconciliation`] for what is
//! checked before the document leaves `unpaid`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sphere_core::{ContractId, DocumentId, PaymentOutcome, TransactionHash};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::reconciliation::{self, PaymentReport};
use crate::state::AppState;

/// A client-reported payment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// `0x` followed by 64 hex characters.
    pub transaction_hash: String,
    /// Id assigned by the contract in `CertificateUploaded`.
    pub contract_id: i64,
}

impl Validate for PaymentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.contract_id < 0 {
            return Err("contract_id must be non-negative".to_string());
        }
        TransactionHash::parse(&self.transaction_hash).map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// State after a payment report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub document_id: Uuid,
    /// Document status, `pending` after a first report.
    pub status: String,
    pub notification_id: Uuid,
    pub transaction_hash: String,
    pub contract_id: u64,
    /// `true` when this exact payment had already been recorded.
    pub replayed: bool,
}

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/documents/:id/payment", post(record_payment))
}

/// POST /v1/documents/:id/payment: Bind an on-chain payment to a document.
#[utoipa::path(
    post,
    path = "/v1/documents/{id}/payment",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Payment recorded or replayed", body = PaymentResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
        (status = 409, description = "Document bound to a different payment", body = crate::error::ErrorBody),
        (status = 422, description = "Event does not match the document", body = crate::error::ErrorBody),
        (status = 502, description = "Chain read failed", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
async fn record_payment(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<PaymentResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let report = PaymentReport {
        transaction_hash: TransactionHash::parse(&req.transaction_hash)?,
        contract_id: ContractId::new(req.contract_id.unsigned_abs()),
    };

    let receipt =
        reconciliation::record_payment(&state, &session, DocumentId::from_uuid(id), report.clone())
            .await?;

    Ok(Json(PaymentResponse {
        document_id: *receipt.document.id.as_uuid(),
        status: receipt.document.status.as_str().to_string(),
        notification_id: *receipt.notification.id.as_uuid(),
        transaction_hash: report.transaction_hash.as_str().to_string(),
        contract_id: report.contract_id.value(),
        replayed: receipt.outcome == PaymentOutcome::Replayed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_contract_id_is_rejected() {
        let req = PaymentRequest {
            transaction_hash: format!("0x{}", "ab".repeat(32)),
            contract_id: -1,
        };
        assert!(req.validate().unwrap_err().contains("non-negative"));
    }

    #[test]
    fn short_hash_is_rejected() {
        let req = PaymentRequest {
            transaction_hash: "0xabc".into(),
            contract_id: 3,
        };
        assert!(req.validate().is_err());
    }
}
