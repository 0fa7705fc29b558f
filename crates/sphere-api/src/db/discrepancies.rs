//! Reconciliation discrepancy persistence.

use chrono::{DateTime, Utc};
use sphere_core::{
    Decision, DiscrepancyId, DocumentId, NotificationId, ReconciliationDiscrepancy,
    TransactionHash,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::{contract_id_column, contract_id_from_column, decode_error};

/// Insert a discrepancy.
pub async fn insert(pool: &PgPool, d: &ReconciliationDiscrepancy) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reconciliation_discrepancies (id, document_id, notification_id,
         contract_id, decision, transaction_hash, reason, recorded_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(d.id.as_uuid())
    .bind(d.document_id.as_uuid())
    .bind(d.notification_id.as_uuid())
    .bind(contract_id_column(d.contract_id)?)
    .bind(d.decision.as_str())
    .bind(d.transaction_hash.as_ref().map(|h| h.as_str()))
    .bind(&d.reason)
    .bind(d.recorded_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load all discrepancies on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ReconciliationDiscrepancy>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DiscrepancyRow>(
        "SELECT id, document_id, notification_id, contract_id, decision, transaction_hash,
         reason, recorded_at
         FROM reconciliation_discrepancies ORDER BY recorded_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DiscrepancyRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct DiscrepancyRow {
    id: Uuid,
    document_id: Uuid,
    notification_id: Uuid,
    contract_id: i64,
    decision: String,
    transaction_hash: Option<String>,
    reason: String,
    recorded_at: DateTime<Utc>,
}

impl DiscrepancyRow {
    fn into_record(self) -> Result<ReconciliationDiscrepancy, sqlx::Error> {
        let decision: Decision =
            serde_json::from_value(serde_json::Value::String(self.decision.clone())).map_err(
                |_| decode_error(format!("discrepancy {}: unknown decision {}", self.id, self.decision)),
            )?;
        // The hash is informational; a malformed one is dropped rather than
        // hiding the whole row from operators.
        let transaction_hash = self.transaction_hash.as_deref().and_then(|h| {
            TransactionHash::parse(h)
                .map_err(|e| tracing::error!(id = %self.id, error = %e, "malformed discrepancy transaction_hash"))
                .ok()
        });
        Ok(ReconciliationDiscrepancy {
            id: DiscrepancyId::from_uuid(self.id),
            document_id: DocumentId::from_uuid(self.document_id),
            notification_id: NotificationId::from_uuid(self.notification_id),
            contract_id: contract_id_from_column(self.contract_id)?,
            decision,
            transaction_hash,
            reason: self.reason,
            recorded_at: self.recorded_at,
        })
    }
}
