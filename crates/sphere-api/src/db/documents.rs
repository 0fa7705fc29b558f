//! Credential document persistence.
//!
//! Status rules are enforced by `CredentialDocument`; the table's CHECK
//! constraints repeat the chain-link invariant so a bad write fails loudly.

use chrono::{DateTime, Utc};
use sphere_core::{
    ChainLink, CredentialDocument, CredentialKind, DocumentId, DocumentStatus, OrganizationId,
    StatusChange, TransactionHash, UserId,
};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::{contract_id_column, contract_id_from_column, decode_error, encode_error};

fn status_log_json(log: &[StatusChange]) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(log).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize document status_log");
        encode_error(e)
    })
}

fn link_columns(doc: &CredentialDocument) -> Result<(Option<String>, Option<i64>), sqlx::Error> {
    match &doc.chain_link {
        Some(link) => Ok((
            Some(link.transaction_hash.as_str().to_string()),
            Some(contract_id_column(link.contract_id)?),
        )),
        None => Ok((None, None)),
    }
}

/// Insert a new document.
pub async fn insert<'e, E: PgExecutor<'e>>(
    exec: E,
    doc: &CredentialDocument,
) -> Result<(), sqlx::Error> {
    let (tx_hash, contract_id) = link_columns(doc)?;
    sqlx::query(
        "INSERT INTO credential_documents (id, kind, user_id, organization_id, content_url,
         description, status, transaction_hash, contract_id, status_log, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(doc.id.as_uuid())
    .bind(doc.kind.as_str())
    .bind(doc.user_id.as_uuid())
    .bind(doc.organization_id.as_uuid())
    .bind(&doc.content_url)
    .bind(&doc.description)
    .bind(doc.status.as_str())
    .bind(tx_hash)
    .bind(contract_id)
    .bind(status_log_json(&doc.status_log)?)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Write the status, chain link and status log of `doc`, provided the row
/// is still in `expected`. A row that moved on in the meantime yields
/// `RowNotFound`.
pub async fn update_status<'e, E: PgExecutor<'e>>(
    exec: E,
    doc: &CredentialDocument,
    expected: DocumentStatus,
) -> Result<(), sqlx::Error> {
    let (tx_hash, contract_id) = link_columns(doc)?;
    let result = sqlx::query(
        "UPDATE credential_documents
         SET status = $1, transaction_hash = $2, contract_id = $3, status_log = $4, updated_at = $5
         WHERE id = $6 AND status = $7",
    )
    .bind(doc.status.as_str())
    .bind(tx_hash)
    .bind(contract_id)
    .bind(status_log_json(&doc.status_log)?)
    .bind(doc.updated_at)
    .bind(doc.id.as_uuid())
    .bind(expected.as_str())
    .execute(exec)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Load all documents on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CredentialDocument>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, kind, user_id, organization_id, content_url, description, status,
         transaction_hash, contract_id, status_log, created_at, updated_at
         FROM credential_documents ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DocumentRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    kind: String,
    user_id: Uuid,
    organization_id: Uuid,
    content_url: String,
    description: String,
    status: String,
    transaction_hash: Option<String>,
    contract_id: Option<i64>,
    status_log: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_record(self) -> Result<CredentialDocument, sqlx::Error> {
        let kind = CredentialKind::from_name(&self.kind)
            .ok_or_else(|| decode_error(format!("document {}: unknown kind {}", self.id, self.kind)))?;
        let status = DocumentStatus::from_name(&self.status).ok_or_else(|| {
            decode_error(format!("document {}: unknown status {}", self.id, self.status))
        })?;
        let chain_link = match (self.transaction_hash, self.contract_id) {
            (Some(hash), Some(id)) => Some(ChainLink {
                transaction_hash: TransactionHash::parse(&hash)
                    .map_err(|e| decode_error(format!("document {}: {e}", self.id)))?,
                contract_id: contract_id_from_column(id)?,
            }),
            (None, None) => None,
            _ => {
                return Err(decode_error(format!(
                    "document {}: transaction_hash and contract_id must be set together",
                    self.id
                )))
            }
        };
        let status_log: Vec<StatusChange> =
            serde_json::from_value(self.status_log).unwrap_or_else(|e| {
                tracing::error!(id = %self.id, error = %e, "failed to deserialize status_log, defaulting to empty");
                Vec::new()
            });

        Ok(CredentialDocument {
            id: DocumentId::from_uuid(self.id),
            kind,
            user_id: UserId::from_uuid(self.user_id),
            organization_id: OrganizationId::from_uuid(self.organization_id),
            content_url: self.content_url,
            description: self.description,
            status,
            chain_link,
            status_log,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
