//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain, ledger and content-store errors to HTTP status codes and
//! returns JSON bodies with a machine-readable code, a message and optional
//! details. Messages of 500-class and upstream errors are replaced with a
//! generic string before they leave the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sphere_content_client::ContentApiError;
use sphere_core::{ReconciliationError, TransitionError, ValidationError};
use sphere_ledger::LedgerError;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "MISSING_EVENT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The session may not act on this resource (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state, or a request already in
    /// flight for the same document (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The signer, the RPC node or the transaction failed (502).
    #[error("wallet error: {0}")]
    Wallet(String),

    /// A confirmed transaction carries no decodable upload event (422).
    #[error("{0}; the payment could not be matched to a credential, contact support with the transaction hash")]
    MissingEvent(String),

    /// The verification transaction failed; nothing changed off chain (502).
    #[error("verification transaction failed: {0}")]
    ChainVerification(String),

    /// The chain advanced but the off-chain write did not (500).
    #[error("reconciliation discrepancy {discrepancy_id}: {reason}")]
    Discrepancy { discrepancy_id: Uuid, reason: String },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// An upstream service returned an error (502).
    #[error("upstream service error: {0}")]
    UpstreamError(String),

    /// A required service is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Wallet(_) => (StatusCode::BAD_GATEWAY, "WALLET_ERROR"),
            Self::MissingEvent(_) => (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_EVENT"),
            Self::ChainVerification(_) => (StatusCode::BAD_GATEWAY, "CHAIN_VERIFICATION_FAILED"),
            Self::Discrepancy { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RECONCILIATION_DISCREPANCY",
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    /// Create a service unavailable error for an unconfigured dependency.
    pub fn service_unavailable(service: &str) -> Self {
        Self::ServiceUnavailable(format!("{service} is not configured"))
    }

    /// Wrap a content-store failure.
    pub fn upstream(msg: String) -> Self {
        Self::UpstreamError(msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::UpstreamError(_) => "An upstream service error occurred".to_string(),
            Self::Discrepancy { .. } => {
                "The decision was recorded on chain but could not be saved; an operator has been notified".to_string()
            }
            other => other.to_string(),
        };

        let details = match &self {
            Self::Discrepancy { discrepancy_id, .. } => {
                Some(serde_json::json!({ "discrepancy_id": discrepancy_id }))
            }
            _ => None,
        };

        match &self {
            Self::Internal(_) | Self::UpstreamError(_) => {
                tracing::error!(error = %self, "internal server error");
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(error = %self, "service unavailable");
            }
            Self::Wallet(_) | Self::ChainVerification(_) => {
                tracing::warn!(error = %self, "chain call failed");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        Self::Conflict(err.to_string())
    }
}

/// Mapping used on the payment path. The decision path wraps every ledger
/// failure in [`AppError::ChainVerification`] instead.
impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::MissingEvent { .. } => Self::MissingEvent(err.to_string()),
            LedgerError::FeeMismatch { .. } | LedgerError::OutOfRange { .. } => {
                Self::Validation(err.to_string())
            }
            LedgerError::Config(_) => Self::Internal(err.to_string()),
            LedgerError::Signer(_)
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::Transport { .. }
            | LedgerError::Reverted { .. }
            | LedgerError::Rejected { .. } => Self::Wallet(err.to_string()),
        }
    }
}

impl From<ContentApiError> for AppError {
    fn from(err: ContentApiError) -> Self {
        Self::upstream(format!("content store: {err}"))
    }
}
