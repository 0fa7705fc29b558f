//! # Reconciliation Service
//!
//! Binds a client-reported payment to its document exactly once.
//!
//! The client pays on chain and reports `(transaction_hash, contract_id)`.
//! Nothing in the report is trusted: the receipt is fetched from the chain,
//! the `CertificateUploaded` event is decoded from it (with the block-range
//! fallback), and the event must name the reported id, the document's
//! content URL, the protocol fee and the organization's wallet. Only then
//! does the document move `unpaid → pending`, together with its one
//! pending notification.
//!
//! Replaying the identical report returns the existing state. A different
//! report against a paid document is a conflict.

use sphere_core::{
    ChainLink, ContractId, CredentialDocument, DocumentId, DocumentStatus, Notification,
    NotificationStatus, PaymentOutcome, TransactionHash,
};
use sphere_ledger::{resolve_uploaded, Address, CredentialLedger, UploadedEvent, B256};

use crate::auth::Session;
use crate::db::audit::AuditEvent;
use crate::error::AppError;
use crate::state::{AppState, Claim};

/// A validated payment report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReport {
    pub transaction_hash: TransactionHash,
    pub contract_id: ContractId,
}

impl PaymentReport {
    fn link(&self) -> ChainLink {
        ChainLink {
            transaction_hash: self.transaction_hash.clone(),
            contract_id: self.contract_id,
        }
    }

    fn claims(&self) -> [Claim; 2] {
        [
            Claim::Transaction(self.transaction_hash.to_string()),
            Claim::Contract(self.contract_id.value()),
        ]
    }
}

/// What [`record_payment`] produced.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub document: CredentialDocument,
    pub notification: Notification,
    pub outcome: PaymentOutcome,
}

/// Verify a reported payment against the chain and bind it to the document.
pub async fn record_payment(
    state: &AppState,
    session: &Session,
    document_id: DocumentId,
    report: PaymentReport,
) -> Result<PaymentReceipt, AppError> {
    let doc = state
        .documents
        .get(document_id.as_uuid())
        .ok_or_else(|| AppError::NotFound(format!("document {document_id} not found")))?;
    session.require_user(&doc.user_id)?;

    let _guard = state
        .in_flight
        .try_acquire(*document_id.as_uuid())
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "a payment or decision for document {document_id} is already in progress"
            ))
        })?;

    // Re-read under the guard: a concurrent request may have finished
    // between the lookup above and the claim.
    let doc = state
        .documents
        .get(document_id.as_uuid())
        .ok_or_else(|| AppError::NotFound(format!("document {document_id} not found")))?;

    if doc.status != DocumentStatus::Unpaid {
        return replay(state, doc, &report);
    }

    let ledger = state
        .ledger
        .as_deref()
        .ok_or_else(|| AppError::service_unavailable("credential ledger"))?;

    // Held until the document is bound. Another document reporting the same
    // payment meanwhile is rejected here, and afterwards by `ensure_unbound`.
    let _payment_guard = state
        .in_flight
        .try_acquire_all(report.claims())
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "payment {} (contract id {}) is already being reported",
                report.transaction_hash, report.contract_id
            ))
        })?;
    ensure_unbound(state, &doc, &report)?;
    let event = confirm_on_chain(ledger, &report).await?;
    check_event(state, &doc, &report, &event)?;

    let mut updated = doc.clone();
    let outcome = updated.record_payment(report.link())?;
    let notification = Notification::for_document(&updated);

    if let Some(pool) = &state.db_pool {
        crate::db::transitions::record_payment(pool, &updated, &notification)
            .await
            .map_err(|e| {
                if crate::db::accounts::is_unique_violation(&e) {
                    AppError::Conflict(format!(
                        "payment {} (contract id {}) is already bound to another document",
                        report.transaction_hash, report.contract_id
                    ))
                } else {
                    AppError::Internal(format!("failed to persist payment: {e}"))
                }
            })?;
    }
    state.documents.insert(*updated.id.as_uuid(), updated.clone());
    state
        .notifications
        .insert(*notification.id.as_uuid(), notification.clone());

    crate::db::audit::record(
        state.db_pool.as_ref(),
        AuditEvent::document(
            *updated.id.as_uuid(),
            "payment_recorded",
            session.actor(),
            serde_json::json!({
                "transaction_hash": report.transaction_hash,
                "contract_id": report.contract_id,
                "notification_id": notification.id,
            }),
        ),
    )
    .await;

    tracing::info!(
        document_id = %updated.id,
        contract_id = %report.contract_id,
        tx_hash = %report.transaction_hash,
        "payment reconciled"
    );

    Ok(PaymentReceipt {
        document: updated,
        notification,
        outcome,
    })
}

/// A report against a document that has already left `unpaid`.
fn replay(
    state: &AppState,
    mut doc: CredentialDocument,
    report: &PaymentReport,
) -> Result<PaymentReceipt, AppError> {
    let outcome = doc.record_payment(report.link())?;
    let notification = latest_notification(state, &doc.id).ok_or_else(|| {
        AppError::Internal(format!("document {} is paid but has no notification", doc.id))
    })?;
    tracing::debug!(document_id = %doc.id, "payment report replayed");
    Ok(PaymentReceipt {
        document: doc,
        notification,
        outcome,
    })
}

/// The pending notification for a document, or the newest resolved one.
fn latest_notification(state: &AppState, document_id: &DocumentId) -> Option<Notification> {
    let mut all = state
        .notifications
        .filter(|n| n.document_id == *document_id);
    all.sort_by_key(|n| (n.status == NotificationStatus::Pending, n.updated_at));
    all.pop()
}

/// A transaction or contract id pays for one document only.
fn ensure_unbound(
    state: &AppState,
    doc: &CredentialDocument,
    report: &PaymentReport,
) -> Result<(), AppError> {
    let other = state.documents.find(|d| {
        d.id != doc.id
            && d.chain_link.as_ref().is_some_and(|l| {
                l.transaction_hash == report.transaction_hash || l.contract_id == report.contract_id
            })
    });
    match other {
        Some(d) => Err(AppError::Conflict(format!(
            "payment {} (contract id {}) is already bound to document {}",
            report.transaction_hash, report.contract_id, d.id
        ))),
        None => Ok(()),
    }
}

/// Fetch the receipt and decode the upload event from it.
async fn confirm_on_chain(
    ledger: &dyn CredentialLedger,
    report: &PaymentReport,
) -> Result<UploadedEvent, AppError> {
    let tx_hash: B256 = report
        .transaction_hash
        .as_str()
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid transaction hash {}", report.transaction_hash)))?;

    let receipt = ledger.transaction_receipt(tx_hash).await?.ok_or_else(|| {
        AppError::Validation(format!(
            "transaction {} was not found on chain; wait until it is mined and report it again",
            report.transaction_hash
        ))
    })?;
    if !receipt.succeeded {
        return Err(AppError::Wallet(format!(
            "transaction {} reverted; the fee was not paid",
            report.transaction_hash
        )));
    }

    Ok(resolve_uploaded(ledger, &receipt).await?)
}

/// Compare the decoded event with the report and the document.
fn check_event(
    state: &AppState,
    doc: &CredentialDocument,
    report: &PaymentReport,
    event: &UploadedEvent,
) -> Result<(), AppError> {
    if event.contract_id != report.contract_id.value() {
        return Err(AppError::Validation(format!(
            "contract id {} does not match id {} emitted by transaction {}",
            report.contract_id, event.contract_id, report.transaction_hash
        )));
    }
    if event.ipfs_hash != doc.content_url {
        return Err(AppError::Validation(format!(
            "transaction {} paid for {}, not for document {}",
            report.transaction_hash, event.ipfs_hash, doc.id
        )));
    }
    sphere_core::validate_fee(event.fee_wei()?)?;

    match state
        .accounts
        .get(doc.organization_id.as_uuid())
        .as_ref()
        .and_then(|a| a.as_organization())
    {
        Some(org) => {
            let wallet: Address = org.wallet_address.as_str().parse().map_err(|_| {
                AppError::Internal(format!("organization {} has a malformed wallet", org.id))
            })?;
            if wallet != event.organization {
                return Err(AppError::Validation(format!(
                    "transaction {} pays organization {}, but document {} is addressed to {}",
                    report.transaction_hash, event.organization, doc.id, org.wallet_address
                )));
            }
        }
        None => {
            tracing::warn!(
                organization_id = %doc.organization_id,
                "organization account missing, payee not checked"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphere_core::{CredentialKind, NewDocument, OrganizationId, UserId};

    fn report(hash_byte: u8, id: u64) -> PaymentReport {
        PaymentReport {
            transaction_hash: TransactionHash::parse(&format!("0x{}", format!("{hash_byte:02x}").repeat(32)))
                .unwrap(),
            contract_id: ContractId::new(id),
        }
    }

    fn unpaid_doc() -> CredentialDocument {
        CredentialDocument::new(NewDocument {
            kind: CredentialKind::Certificate,
            user_id: UserId::new(),
            organization_id: OrganizationId::new(),
            description: "AWS Solutions Architect".into(),
            content_url: "https://gw/ipfs/QmCert".into(),
        })
        .unwrap()
    }

    #[test]
    fn ensure_unbound_rejects_reused_transaction() {
        let state = AppState::new();
        let mut paid = unpaid_doc();
        paid.record_payment(report(0xaa, 1).link()).unwrap();
        state.documents.insert(*paid.id.as_uuid(), paid);

        let fresh = unpaid_doc();
        let err = ensure_unbound(&state, &fresh, &report(0xaa, 2)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = ensure_unbound(&state, &fresh, &report(0xbb, 1)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(ensure_unbound(&state, &fresh, &report(0xbb, 2)).is_ok());
    }

    #[test]
    fn latest_notification_prefers_pending() {
        let state = AppState::new();
        let mut doc = unpaid_doc();
        doc.record_payment(report(0x01, 1).link()).unwrap();

        let mut resolved = Notification::for_document(&doc);
        resolved
            .resolve(sphere_core::Decision::Declined, None)
            .unwrap();
        let pending = Notification::for_document(&doc);
        state.notifications.insert(*resolved.id.as_uuid(), resolved);
        state.notifications.insert(*pending.id.as_uuid(), pending.clone());

        assert_eq!(latest_notification(&state, &doc.id).unwrap().id, pending.id);
    }
}
