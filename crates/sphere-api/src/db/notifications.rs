//! Notification persistence.

use chrono::{DateTime, Utc};
use sphere_core::{
    CredentialKind, DocumentId, Notification, NotificationId, NotificationStatus, OrganizationId,
    UserId,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::decode_error;

/// Insert a notification. The partial unique index rejects a second
/// pending row for the same document.
pub async fn insert<'e, E: PgExecutor<'e>>(exec: E, n: &Notification) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, document_id, kind, user_id, organization_id, message,
         status, comment, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(n.id.as_uuid())
    .bind(n.document_id.as_uuid())
    .bind(n.kind.as_str())
    .bind(n.user_id.as_uuid())
    .bind(n.organization_id.as_uuid())
    .bind(&n.message)
    .bind(n.status.as_str())
    .bind(&n.comment)
    .bind(n.created_at)
    .bind(n.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Record the resolution of a pending notification.
pub async fn resolve<'e, E: PgExecutor<'e>>(exec: E, n: &Notification) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET status = $1, comment = $2, updated_at = $3
         WHERE id = $4 AND status = 'pending'",
    )
    .bind(n.status.as_str())
    .bind(&n.comment)
    .bind(n.updated_at)
    .bind(n.id.as_uuid())
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Load all notifications on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Notification>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id, document_id, kind, user_id, organization_id, message, status, comment,
         created_at, updated_at
         FROM notifications ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(NotificationRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    document_id: Uuid,
    kind: String,
    user_id: Uuid,
    organization_id: Uuid,
    message: String,
    status: String,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_record(self) -> Result<Notification, sqlx::Error> {
        let kind = CredentialKind::from_name(&self.kind).ok_or_else(|| {
            decode_error(format!("notification {}: unknown kind {}", self.id, self.kind))
        })?;
        let status = NotificationStatus::from_name(&self.status).ok_or_else(|| {
            decode_error(format!("notification {}: unknown status {}", self.id, self.status))
        })?;
        Ok(Notification {
            id: NotificationId::from_uuid(self.id),
            document_id: DocumentId::from_uuid(self.document_id),
            kind,
            user_id: UserId::from_uuid(self.user_id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            message: self.message,
            status,
            comment: self.comment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
