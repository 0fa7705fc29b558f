//! # Review Notifications
//!
//! One notification is opened per reconciled payment and resolved by the
//! organization's decision. After resolution the document's own status is
//! the source of truth; the notification stays behind as history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{CredentialDocument, CredentialKind};
use crate::error::{TransitionError, ValidationError};
use crate::identity::{DocumentId, NotificationId, OrganizationId, UserId};

/// Longest accepted reviewer comment, in characters.
pub const MAX_COMMENT_LEN: usize = 1_000;

/// An organization's review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Declined,
}

impl Decision {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Value of the `accepted` flag passed to the contract.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification status. Mirrors the decision half of the document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Accepted,
    Declined,
}

impl NotificationStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    /// Whether the notification still awaits a decision.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Decision> for NotificationStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Accepted => Self::Accepted,
            Decision::Declined => Self::Declined,
        }
    }
}

/// Normalize an optional reviewer comment: blank becomes `None`.
pub fn normalize_comment(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(ValidationError::TooLong {
            field: "comment",
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(Some(trimmed.to_string()))
}

/// A review-queue entry for an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub document_id: DocumentId,
    pub kind: CredentialKind,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    /// The document description at the time of payment.
    pub message: String,
    pub status: NotificationStatus,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Open a pending notification for a freshly reconciled document.
    pub fn for_document(doc: &CredentialDocument) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationId::new(),
            document_id: doc.id,
            kind: doc.kind,
            user_id: doc.user_id,
            organization_id: doc.organization_id,
            message: doc.description.clone(),
            status: NotificationStatus::Pending,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the decision and the reviewer's comment.
    pub fn resolve(
        &mut self,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<(), TransitionError> {
        if !self.status.is_active() {
            return Err(TransitionError::InvalidTransition {
                from: self.status.to_string(),
                to: NotificationStatus::from(decision).to_string(),
                reason: "notification has already been resolved".into(),
            });
        }
        self.status = decision.into();
        self.comment = comment;
        self.updated_at = Utc::now();
        Ok(())
    }
}
