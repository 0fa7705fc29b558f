//! Reconciliation discrepancies.
//!
//! Recorded when the verification transaction succeeded on chain but the
//! off-chain write that should follow it did not land. The item stays
//! `pending` off-chain while the contract already shows the decision, so an
//! operator has to repair it by hand. The chain call is never replayed
//! automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ContractId, DiscrepancyId, DocumentId, NotificationId, TransactionHash};
use crate::notification::Decision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationDiscrepancy {
    pub id: DiscrepancyId,
    pub document_id: DocumentId,
    pub notification_id: NotificationId,
    pub contract_id: ContractId,
    pub decision: Decision,
    /// Hash of the verification transaction that did land.
    pub transaction_hash: Option<TransactionHash>,
    /// Why the off-chain write failed.
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl ReconciliationDiscrepancy {
    pub fn new(
        document_id: DocumentId,
        notification_id: NotificationId,
        contract_id: ContractId,
        decision: Decision,
        transaction_hash: Option<TransactionHash>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: DiscrepancyId::new(),
            document_id,
            notification_id,
            contract_id,
            decision,
            transaction_hash,
            reason: reason.into(),
            recorded_at: Utc::now(),
        }
    }
}
