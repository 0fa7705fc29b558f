//! # Notification Inbox
//!
//! An organization's review queue, split by credential kind. Each entry
//! joins the notification with the owner's display identity and the
//! document it refers to, so a reviewer sees everything in one read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sphere_core::{
    CredentialDocument, CredentialKind, DocumentStatus, Notification, NotificationStatus,
    OrganizationId,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::AppState;

/// Display identity of the credential owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

/// One review item.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InboxItem {
    pub notification_id: Uuid,
    pub document_id: Uuid,
    /// `certificate` or `degree`.
    pub kind: String,
    /// The document description at payment time.
    pub message: String,
    /// `pending`, `accepted` or `declined`.
    pub status: String,
    pub comment: Option<String>,
    /// Absent if the owner account is gone.
    pub owner: Option<OwnerSummary>,
    pub content_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending items, oldest first.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct Inbox {
    pub certificates: Vec<InboxItem>,
    pub degrees: Vec<InboxItem>,
}

/// Pending notifications whose document is still pending. Documents frozen
/// by a reconciliation discrepancy are left out until an operator repairs
/// them.
pub fn list_pending(state: &AppState, organization: &OrganizationId) -> Inbox {
    let mut pending = state.notifications.filter(|n| {
        n.organization_id == *organization && n.status == NotificationStatus::Pending
    });
    pending.sort_by_key(|n| n.created_at);

    let mut inbox = Inbox::default();
    for n in pending {
        let Some(doc) = state.documents.get(n.document_id.as_uuid()) else {
            tracing::warn!(notification_id = %n.id, document_id = %n.document_id, "notification without document");
            continue;
        };
        if doc.status != DocumentStatus::Pending {
            continue;
        }
        if state.has_discrepancy(&doc.id) {
            tracing::debug!(document_id = %doc.id, "document frozen by discrepancy, not listed");
            continue;
        }
        let item = join(state, &n, &doc);
        match n.kind {
            CredentialKind::Certificate => inbox.certificates.push(item),
            CredentialKind::Degree => inbox.degrees.push(item),
        }
    }
    inbox
}

/// Resolved notifications, newest first.
pub fn history(state: &AppState, organization: &OrganizationId) -> Vec<InboxItem> {
    let mut resolved = state.notifications.filter(|n| {
        n.organization_id == *organization && n.status != NotificationStatus::Pending
    });
    resolved.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    resolved
        .iter()
        .filter_map(|n| {
            let doc = state.documents.get(n.document_id.as_uuid())?;
            Some(join(state, n, &doc))
        })
        .collect()
}

fn join(state: &AppState, n: &Notification, doc: &CredentialDocument) -> InboxItem {
    let owner = state
        .accounts
        .get(n.user_id.as_uuid())
        .and_then(|a| a.as_user().cloned())
        .map(|u| OwnerSummary {
            id: *u.id.as_uuid(),
            name: u.name,
            email: u.email,
            photo_url: u.photo_url,
        });

    InboxItem {
        notification_id: *n.id.as_uuid(),
        document_id: *n.document_id.as_uuid(),
        kind: n.kind.as_str().to_string(),
        message: n.message.clone(),
        status: n.status.as_str().to_string(),
        comment: n.comment.clone(),
        owner,
        content_url: doc.content_url.clone(),
        description: doc.description.clone(),
        created_at: n.created_at,
        updated_at: n.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphere_core::{
        Account, ChainLink, ContractId, Decision, NewDocument, TransactionHash, UserId, UserProfile,
    };

    fn owner() -> UserProfile {
        UserProfile {
            id: UserId::new(),
            name: "Ada Obi".into(),
            email: "ada@example.com".into(),
            photo_url: Some("https://img/ada.png".into()),
            workplace: None,
            wallet_address: None,
            certificates: Vec::new(),
            degrees: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn paid(state: &AppState, user: &UserProfile, org: OrganizationId, kind: CredentialKind, n: u64) -> Notification {
        let mut doc = CredentialDocument::new(NewDocument {
            kind,
            user_id: user.id,
            organization_id: org,
            description: format!("credential {n}"),
            content_url: format!("https://gw/ipfs/Qm{n}"),
        })
        .unwrap();
        doc.record_payment(ChainLink {
            transaction_hash: TransactionHash::parse(&format!("0x{n:064x}")).unwrap(),
            contract_id: ContractId::new(n),
        })
        .unwrap();
        let note = Notification::for_document(&doc);
        state.documents.insert(*doc.id.as_uuid(), doc);
        state.notifications.insert(*note.id.as_uuid(), note.clone());
        note
    }

    #[test]
    fn pending_items_are_split_by_kind_and_joined() {
        let state = AppState::new();
        let user = owner();
        state.accounts.insert(*user.id.as_uuid(), Account::User(user.clone()));
        let org = OrganizationId::new();

        paid(&state, &user, org, CredentialKind::Certificate, 1);
        paid(&state, &user, org, CredentialKind::Degree, 2);
        paid(&state, &user, OrganizationId::new(), CredentialKind::Degree, 3);

        let inbox = list_pending(&state, &org);
        assert_eq!(inbox.certificates.len(), 1);
        assert_eq!(inbox.degrees.len(), 1);
        let item = &inbox.degrees[0];
        assert_eq!(item.content_url, "https://gw/ipfs/Qm2");
        assert_eq!(item.description, "credential 2");
        let owner = item.owner.as_ref().unwrap();
        assert_eq!(owner.name, "Ada Obi");
        assert_eq!(owner.photo_url.as_deref(), Some("https://img/ada.png"));
    }

    #[test]
    fn resolved_items_move_to_history() {
        let state = AppState::new();
        let user = owner();
        let org = OrganizationId::new();
        let note = paid(&state, &user, org, CredentialKind::Certificate, 7);

        let mut doc = state.documents.get(note.document_id.as_uuid()).unwrap();
        doc.resolve(Decision::Declined).unwrap();
        state.documents.insert(*doc.id.as_uuid(), doc);
        let mut resolved = note.clone();
        resolved.resolve(Decision::Declined, Some("blurry".into())).unwrap();
        state.notifications.insert(*resolved.id.as_uuid(), resolved);

        assert!(list_pending(&state, &org).certificates.is_empty());
        let past = history(&state, &org);
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].status, "declined");
        assert_eq!(past[0].comment.as_deref(), Some("blurry"));
        assert!(past[0].owner.is_none());
    }

    #[test]
    fn pending_notification_on_settled_document_is_hidden() {
        let state = AppState::new();
        let user = owner();
        let org = OrganizationId::new();
        let note = paid(&state, &user, org, CredentialKind::Degree, 9);

        let mut doc = state.documents.get(note.document_id.as_uuid()).unwrap();
        doc.resolve(Decision::Accepted).unwrap();
        state.documents.insert(*doc.id.as_uuid(), doc);

        assert!(list_pending(&state, &org).degrees.is_empty());
    }
}
