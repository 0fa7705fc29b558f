//! Audit event persistence: an append-only hash chain.
//!
//! Every document transition appends an event whose hash covers the
//! previous event's hash, so rewriting history breaks every later link.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Hash the first event chains from.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An audit event to be persisted.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub actor: Option<String>,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// A document transition.
    pub fn document(
        document_id: Uuid,
        action: &str,
        actor: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            event_type: "document.transition".into(),
            actor: Some(actor),
            resource_type: "credential_document".into(),
            resource_id: document_id,
            action: action.into(),
            metadata,
        }
    }
}

/// `SHA-256(previous_hash || event_type || resource_type || resource_id || action)`.
pub fn chain_hash(previous_hash: &str, event: &AuditEvent) -> String {
    let hash_input = format!(
        "{}{}{}{}{}",
        previous_hash, event.event_type, event.resource_type, event.resource_id, event.action,
    );
    sha256_hex(&hash_input)
}

/// Append an audit event to the log.
pub async fn append(pool: &PgPool, event: AuditEvent) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();

    let previous_hash: Option<String> =
        sqlx::query_scalar("SELECT event_hash FROM audit_events ORDER BY created_at DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let prev = previous_hash.as_deref().unwrap_or(GENESIS_HASH);
    let event_hash = chain_hash(prev, &event);

    sqlx::query(
        "INSERT INTO audit_events (id, event_type, actor, resource_type, resource_id,
         action, metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())",
    )
    .bind(id)
    .bind(&event.event_type)
    .bind(&event.actor)
    .bind(&event.resource_type)
    .bind(event.resource_id)
    .bind(&event.action)
    .bind(&event.metadata)
    .bind(prev)
    .bind(&event_hash)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Append when a database is configured. Failures are logged, not returned:
/// the transition itself has already been committed.
pub async fn record(pool: Option<&PgPool>, event: AuditEvent) {
    let Some(pool) = pool else {
        return;
    };
    let resource_id = event.resource_id;
    let action = event.action.clone();
    if let Err(e) = append(pool, event).await {
        tracing::warn!(error = %e, %resource_id, %action, "failed to append audit event");
    }
}

/// Audit events for one resource, oldest first.
pub async fn events_for_resource(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
) -> Result<Vec<AuditEventRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, event_type, actor, resource_type, resource_id,
         action, metadata, previous_hash, event_hash, created_at
         FROM audit_events
         WHERE resource_type = $1 AND resource_id = $2
         ORDER BY created_at ASC",
    )
    .bind(resource_type)
    .bind(resource_id)
    .fetch_all(pool)
    .await
}

/// Verify the first `limit` events of the chain.
pub async fn verify_chain_integrity(
    pool: &PgPool,
    limit: i64,
) -> Result<ChainIntegrityResult, sqlx::Error> {
    let events = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, event_type, actor, resource_type, resource_id,
         action, metadata, previous_hash, event_hash, created_at
         FROM audit_events ORDER BY created_at ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(check_chain(&events))
}

/// Check link continuity and recompute every hash.
pub fn check_chain(events: &[AuditEventRow]) -> ChainIntegrityResult {
    let mut broken_links = 0;
    let mut last_hash: Option<&str> = None;

    for row in events {
        let prev = row.previous_hash.as_deref().unwrap_or(GENESIS_HASH);
        if let Some(expected_prev) = last_hash {
            if prev != expected_prev {
                broken_links += 1;
            }
        }
        if chain_hash(prev, &row.as_event()) != row.event_hash {
            broken_links += 1;
        }
        last_hash = Some(&row.event_hash);
    }

    ChainIntegrityResult {
        total_events: events.len(),
        broken_links,
        chain_valid: broken_links == 0,
    }
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIntegrityResult {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Database row for audit events.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEventRow {
    pub id: Uuid,
    pub event_type: String,
    pub actor: Option<String>,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub action: String,
    pub metadata: serde_json::Value,
    pub previous_hash: Option<String>,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn as_event(&self) -> AuditEvent {
        AuditEvent {
            event_type: self.event_type.clone(),
            actor: self.actor.clone(),
            resource_type: self.resource_type.clone(),
            resource_id: self.resource_id,
            action: self.action.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
