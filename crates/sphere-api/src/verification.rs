//! # Verification Orchestrator
//!
//! Applies an organization's decision to a pending document.
//!
//! ```text
//! pending --accept-->  verifyCertificate(id, true, comment)  --> verified / accepted, credential appended
//! pending --decline--> verifyCertificate(id, false, comment) --> declined / accepted=false
//! ```
//!
//! The chain call completes before anything changes off chain. When it
//! fails, the document and notification stay `pending` and the reviewer
//! may retry. When it succeeds and the off-chain write then fails, the
//! divergence is recorded as a [`ReconciliationDiscrepancy`], logged under
//! the `sphere::discrepancy` target, and the document is frozen until an
//! operator repairs it. The chain call is never repeated automatically.

use sphere_core::{
    Account, ContractId, CredentialDocument, Decision, DocumentStatus, Notification, NotificationId,
    NotificationStatus, ReconciliationDiscrepancy, TransactionHash,
};

use crate::auth::Session;
use crate::db::audit::AuditEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Result of a successful decision.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub notification: Notification,
    pub document: CredentialDocument,
    /// Hash of the verification transaction. `None` for an off-chain decline.
    pub transaction_hash: Option<TransactionHash>,
}

/// Apply `decision` to the notification's document.
pub async fn respond(
    state: &AppState,
    session: &Session,
    notification_id: NotificationId,
    decision: Decision,
    comment: Option<String>,
) -> Result<DecisionOutcome, AppError> {
    let comment = sphere_core::notification::normalize_comment(comment.as_deref())?;

    let notification = state
        .notifications
        .get(notification_id.as_uuid())
        .ok_or_else(|| AppError::NotFound(format!("notification {notification_id} not found")))?;
    session.require_organization(&notification.organization_id)?;

    let document_id = notification.document_id;
    let _guard = state
        .in_flight
        .try_acquire(*document_id.as_uuid())
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "a payment or decision for document {document_id} is already in progress"
            ))
        })?;

    // Preconditions, re-read under the guard.
    let notification = state
        .notifications
        .get(notification_id.as_uuid())
        .ok_or_else(|| AppError::NotFound(format!("notification {notification_id} not found")))?;
    if notification.status != NotificationStatus::Pending {
        return Err(AppError::Conflict(format!(
            "notification {notification_id} is already {}",
            notification.status
        )));
    }
    let doc = state
        .documents
        .get(document_id.as_uuid())
        .ok_or_else(|| AppError::NotFound(format!("document {document_id} not found")))?;
    if doc.status != DocumentStatus::Pending {
        return Err(AppError::Conflict(format!(
            "document {document_id} is {}, only pending documents can be reviewed",
            doc.status
        )));
    }
    let contract_id = doc.contract_id().ok_or_else(|| {
        AppError::Internal(format!("pending document {document_id} has no contract id"))
    })?;
    if state.has_discrepancy(&document_id) {
        return Err(AppError::Conflict(format!(
            "document {document_id} has an unresolved reconciliation discrepancy"
        )));
    }

    // Chain first.
    let transaction_hash = if decision.is_accepted() || state.config.decline_on_chain {
        let ledger = state
            .ledger
            .as_deref()
            .ok_or_else(|| AppError::service_unavailable("credential ledger"))?;
        let receipt = ledger
            .submit_verification(
                contract_id.value(),
                decision.is_accepted(),
                comment.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(|e| {
                tracing::warn!(
                    document_id = %document_id,
                    contract_id = %contract_id,
                    decision = %decision,
                    error = %e,
                    "verification call failed, document stays pending"
                );
                AppError::ChainVerification(e.to_string())
            })?;
        let hash = TransactionHash::parse(&receipt.transaction_hash.to_string())
            .map_err(|e| tracing::error!(error = %e, "verification receipt carries a malformed hash"))
            .ok();
        Some(hash)
    } else {
        None
    };
    let on_chain = transaction_hash.is_some();
    let transaction_hash = transaction_hash.flatten();

    // From here on the chain has moved. Any failure is a discrepancy.
    let persisted = apply_off_chain(state, &doc, &notification, decision, comment).await;
    let (document, notification) = match persisted {
        Ok(pair) => pair,
        Err(reason) if on_chain => {
            return Err(record_discrepancy(
                state,
                &doc,
                &notification,
                contract_id,
                decision,
                transaction_hash,
                reason,
            )
            .await);
        }
        Err(reason) => return Err(AppError::Internal(reason)),
    };

    crate::db::audit::record(
        state.db_pool.as_ref(),
        AuditEvent::document(
            *document.id.as_uuid(),
            document.status.as_str(),
            session.actor(),
            serde_json::json!({
                "notification_id": notification.id,
                "contract_id": contract_id,
                "transaction_hash": transaction_hash,
                "on_chain": on_chain,
            }),
        ),
    )
    .await;

    tracing::info!(
        document_id = %document.id,
        contract_id = %contract_id,
        decision = %decision,
        on_chain,
        "decision applied"
    );

    Ok(DecisionOutcome {
        notification,
        document,
        transaction_hash,
    })
}

/// Flip document and notification, append the credential, persist, then
/// update the stores. Returns the failure reason as text so the caller can
/// record it.
async fn apply_off_chain(
    state: &AppState,
    doc: &CredentialDocument,
    notification: &Notification,
    decision: Decision,
    comment: Option<String>,
) -> Result<(CredentialDocument, Notification), String> {
    let mut document = doc.clone();
    document.resolve(decision).map_err(|e| e.to_string())?;
    let mut notification = notification.clone();
    notification
        .resolve(decision, comment)
        .map_err(|e| e.to_string())?;

    let owner = if decision.is_accepted() {
        let mut account = state
            .accounts
            .get(document.user_id.as_uuid())
            .ok_or_else(|| format!("owner account {} not found", document.user_id))?;
        match &mut account {
            Account::User(profile) => {
                profile.append_credential(document.kind, document.id);
            }
            Account::Organization(_) => {
                return Err(format!("owner account {} is not a user", document.user_id));
            }
        }
        Some(account)
    } else {
        None
    };

    if let Some(pool) = &state.db_pool {
        crate::db::transitions::apply_decision(pool, &document, &notification, owner.as_ref())
            .await
            .map_err(|e| format!("failed to persist decision: {e}"))?;
    }

    state
        .documents
        .insert(*document.id.as_uuid(), document.clone());
    state
        .notifications
        .insert(*notification.id.as_uuid(), notification.clone());
    if let Some(account) = owner {
        state.accounts.insert(account.id(), account);
    }

    Ok((document, notification))
}

/// Record and log a chain/off-chain divergence.
async fn record_discrepancy(
    state: &AppState,
    doc: &CredentialDocument,
    notification: &Notification,
    contract_id: ContractId,
    decision: Decision,
    transaction_hash: Option<TransactionHash>,
    reason: String,
) -> AppError {
    let discrepancy = ReconciliationDiscrepancy::new(
        doc.id,
        notification.id,
        contract_id,
        decision,
        transaction_hash,
        reason.clone(),
    );

    tracing::error!(
        target: "sphere::discrepancy",
        discrepancy_id = %discrepancy.id,
        document_id = %doc.id,
        notification_id = %notification.id,
        contract_id = %contract_id,
        decision = %decision,
        tx_hash = ?discrepancy.transaction_hash.as_ref().map(|h| h.as_str()),
        %reason,
        "decision landed on chain but off-chain state was not updated"
    );

    state
        .discrepancies
        .insert(*discrepancy.id.as_uuid(), discrepancy.clone());
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::discrepancies::insert(pool, &discrepancy).await {
            tracing::error!(
                target: "sphere::discrepancy",
                discrepancy_id = %discrepancy.id,
                error = %e,
                "failed to persist discrepancy, it is held in memory only"
            );
        }
    }

    AppError::Discrepancy {
        discrepancy_id: *discrepancy.id.as_uuid(),
        reason,
    }
}
