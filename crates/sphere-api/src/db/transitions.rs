//! Writes that change several rows at once.
//!
//! Each function runs in one database transaction so a document never
//! lands in `pending` without its notification, or in a terminal status
//! with its notification still open.

use sphere_core::{Account, CredentialDocument, DocumentStatus, Notification};
use sqlx::PgPool;

use super::{accounts, documents, notifications};

/// `unpaid → pending` plus the new pending notification.
pub async fn record_payment(
    pool: &PgPool,
    doc: &CredentialDocument,
    notification: &Notification,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    documents::update_status(&mut *tx, doc, DocumentStatus::Unpaid).await?;
    notifications::insert(&mut *tx, notification).await?;
    tx.commit().await
}

/// `pending → verified | declined`, the notification resolution and, on
/// acceptance, the owner's updated credential list.
pub async fn apply_decision(
    pool: &PgPool,
    doc: &CredentialDocument,
    notification: &Notification,
    owner: Option<&Account>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    documents::update_status(&mut *tx, doc, DocumentStatus::Pending).await?;
    notifications::resolve(&mut *tx, notification).await?;
    if let Some(account) = owner {
        accounts::update_payload(&mut *tx, account).await?;
    }
    tx.commit().await
}
