//! # Credential Documents
//!
//! A [`CredentialDocument`] is the off-chain record of an uploaded
//! certificate or degree. Its lifecycle:
//!
//! ```text
//! UNPAID ─record_payment()──▶ PENDING ─resolve(accepted)──▶ VERIFIED
//!                                │
//!                                └────resolve(declined)───▶ DECLINED
//! ```
//!
//! The transaction hash and contract id live together in one
//! [`ChainLink`], so a document is either fully linked to its payment or
//! not linked at all. Every status other than `unpaid` requires the link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReconciliationError, TransitionError, ValidationError};
use crate::identity::{ContractId, DocumentId, OrganizationId, TransactionHash, UserId};
use crate::notification::Decision;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1_000;

// ── Kind ─────────────────────────────────────────────────────────────

/// The two parallel credential variants. They share one shape and one
/// lifecycle; only the profile list they land in differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Certificate,
    Degree,
}

impl CredentialKind {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Degree => "degree",
        }
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "certificate" => Some(Self::Certificate),
            "degree" => Some(Self::Degree),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CredentialKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ValidationError::InvalidEnum {
            field: "kind",
            value: s.to_string(),
        })
    }
}

// ── Status ───────────────────────────────────────────────────────────

/// Document review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Uploaded, fee not yet reconciled.
    Unpaid,
    /// Fee reconciled; awaiting the organization's decision.
    Pending,
    /// Accepted by the organization. Terminal.
    Verified,
    /// Declined by the organization. Terminal.
    Declined,
}

impl DocumentStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Declined => "declined",
        }
    }

    /// Parse a wire name. Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "unpaid" => Some(Self::Unpaid),
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Declined)
    }

    /// The set of valid target states from this state.
    pub fn valid_transitions(&self) -> &'static [DocumentStatus] {
        match self {
            Self::Unpaid => &[Self::Pending],
            Self::Pending => &[Self::Verified, Self::Declined],
            Self::Verified | Self::Declined => &[],
        }
    }

    /// Whether `to` is reachable in one step.
    pub fn can_transition_to(&self, to: DocumentStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Whether a document in this state must carry a [`ChainLink`].
    pub fn requires_chain_link(&self) -> bool {
        !matches!(self, Self::Unpaid)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Chain Link ───────────────────────────────────────────────────────

/// Binding between a document and the transaction that paid for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainLink {
    pub transaction_hash: TransactionHash,
    pub contract_id: ContractId,
}

/// A single recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub at: DateTime<Utc>,
}

/// Result of reporting a payment against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The document moved `unpaid → pending`.
    Recorded,
    /// The same payment had already been recorded; nothing changed.
    Replayed,
}

// ── Document ─────────────────────────────────────────────────────────

/// Validated input for a new upload.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub kind: CredentialKind,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub description: String,
    pub content_url: String,
}

/// Check an upload description before any external call is made.
pub fn validate_description(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("description"));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description",
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Off-chain record of an uploaded certificate or degree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDocument {
    pub id: DocumentId,
    pub kind: CredentialKind,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    /// Publicly dereferenceable URL in content storage. Also the string
    /// passed to the contract as the content hash.
    pub content_url: String,
    pub description: String,
    pub status: DocumentStatus,
    /// Present exactly when `status` is not `unpaid`.
    pub chain_link: Option<ChainLink>,
    #[serde(default)]
    pub status_log: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialDocument {
    /// Create a new document in `unpaid` state.
    pub fn new(input: NewDocument) -> Result<Self, ValidationError> {
        let description = validate_description(&input.description)?;
        let content_url = input.content_url.trim().to_string();
        if !(content_url.starts_with("https://") || content_url.starts_with("http://")) {
            return Err(ValidationError::InvalidContentUrl(input.content_url));
        }
        let now = Utc::now();
        Ok(Self {
            id: DocumentId::new(),
            kind: input.kind,
            user_id: input.user_id,
            organization_id: input.organization_id,
            content_url,
            description,
            status: DocumentStatus::Unpaid,
            chain_link: None,
            status_log: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Contract id, once paid.
    pub fn contract_id(&self) -> Option<ContractId> {
        self.chain_link.as_ref().map(|l| l.contract_id)
    }

    /// Bind a confirmed payment to this document.
    ///
    /// Moves `unpaid → pending`. Reporting the identical link again is a
    /// no-op returning [`PaymentOutcome::Replayed`]; any other link, or any
    /// report against a document that is not `unpaid`, is a conflict.
    pub fn record_payment(
        &mut self,
        link: ChainLink,
    ) -> Result<PaymentOutcome, ReconciliationError> {
        if self.status == DocumentStatus::Unpaid {
            self.chain_link = Some(link);
            self.push_status(DocumentStatus::Pending);
            return Ok(PaymentOutcome::Recorded);
        }
        if self.chain_link.as_ref() == Some(&link) {
            return Ok(PaymentOutcome::Replayed);
        }
        Err(ReconciliationError::Conflict {
            document_id: self.id.to_string(),
            status: self.status.to_string(),
            transaction_hash: link.transaction_hash.to_string(),
        })
    }

    /// Apply an organization's decision: `pending → verified | declined`.
    pub fn resolve(&mut self, decision: Decision) -> Result<(), TransitionError> {
        let target = match decision {
            Decision::Accepted => DocumentStatus::Verified,
            Decision::Declined => DocumentStatus::Declined,
        };
        if self.chain_link.is_none() {
            return Err(TransitionError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
                reason: "payment has not been recorded".into(),
            });
        }
        self.transition(target)
    }

    /// Validate a transition against [`DocumentStatus::valid_transitions`].
    fn transition(&mut self, to: DocumentStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            let reason = if self.status.is_terminal() {
                format!("{} is terminal", self.status)
            } else {
                format!("allowed targets: {:?}", self.status.valid_transitions())
            };
            return Err(TransitionError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
                reason,
            });
        }
        self.push_status(to);
        Ok(())
    }

    fn push_status(&mut self, to: DocumentStatus) {
        let now = Utc::now();
        self.status_log.push(StatusChange {
            from: self.status,
            to,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
    }

    /// Check the record-level invariants. Used when loading persisted rows.
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.status.requires_chain_link(), self.chain_link.is_some()) {
            (true, false) => Err(format!(
                "document {} is {} without a payment link",
                self.id, self.status
            )),
            (false, true) => Err(format!(
                "document {} is unpaid but carries a payment link",
                self.id
            )),
            _ => Ok(()),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::notification::{Notification, NotificationStatus};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Pay(u64),
        Decide(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..4).prop_map(Op::Pay),
            any::<bool>().prop_map(Op::Decide),
        ]
    }

    fn link(id: u64) -> ChainLink {
        ChainLink {
            transaction_hash: TransactionHash::parse(&format!("0x{:064x}", id + 7)).unwrap(),
            contract_id: ContractId::new(id),
        }
    }

    /// Apply an operation the way the reconciliation and review paths do:
    /// a recorded payment opens one notification, a decision resolves it.
    fn apply(doc: &mut CredentialDocument, notes: &mut Vec<Notification>, op: &Op) {
        match op {
            Op::Pay(id) => {
                if let Ok(PaymentOutcome::Recorded) = doc.record_payment(link(*id)) {
                    notes.push(Notification::for_document(doc));
                }
            }
            Op::Decide(accepted) => {
                let decision = if *accepted {
                    Decision::Accepted
                } else {
                    Decision::Declined
                };
                if doc.resolve(decision).is_ok() {
                    if let Some(n) = notes.iter_mut().find(|n| n.status.is_active()) {
                        n.resolve(decision, None).unwrap();
                    }
                }
            }
        }
    }

    proptest! {
        /// Link presence always agrees with status.
        #[test]
        fn link_presence_matches_status(ops in prop::collection::vec(op(), 0..12)) {
            let mut doc = CredentialDocument::new(NewDocument {
                kind: CredentialKind::Certificate,
                user_id: UserId::new(),
                organization_id: OrganizationId::new(),
                description: "property".into(),
                content_url: "https://gateway.pinata.cloud/ipfs/QmProp".into(),
            }).unwrap();
            let mut notes = Vec::new();
            for op in &ops {
                apply(&mut doc, &mut notes, op);
                prop_assert!(doc.check_invariants().is_ok());
            }
        }

        /// Every logged step is an allowed transition.
        #[test]
        fn status_log_only_contains_valid_steps(ops in prop::collection::vec(op(), 0..12)) {
            let mut doc = CredentialDocument::new(NewDocument {
                kind: CredentialKind::Degree,
                user_id: UserId::new(),
                organization_id: OrganizationId::new(),
                description: "property".into(),
                content_url: "https://gateway.pinata.cloud/ipfs/QmProp".into(),
            }).unwrap();
            let mut notes = Vec::new();
            for op in &ops {
                apply(&mut doc, &mut notes, op);
            }
            prop_assert!(doc.status_log.len() <= 2);
            for step in &doc.status_log {
                prop_assert!(step.from.can_transition_to(step.to));
            }
        }

        /// Exactly one active notification while pending, none otherwise.
        #[test]
        fn one_active_notification_while_pending(ops in prop::collection::vec(op(), 0..12)) {
            let mut doc = CredentialDocument::new(NewDocument {
                kind: CredentialKind::Certificate,
                user_id: UserId::new(),
                organization_id: OrganizationId::new(),
                description: "property".into(),
                content_url: "https://gateway.pinata.cloud/ipfs/QmProp".into(),
            }).unwrap();
            let mut notes = Vec::new();
            for op in &ops {
                apply(&mut doc, &mut notes, op);
                let active = notes.iter().filter(|n| n.status == NotificationStatus::Pending).count();
                let expected = usize::from(doc.status == DocumentStatus::Pending);
                prop_assert_eq!(active, expected);
                prop_assert!(notes.len() <= 1);
            }
        }
    }
}
