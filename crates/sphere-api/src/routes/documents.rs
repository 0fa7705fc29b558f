//! # Document API
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/v1/documents` | multipart upload, creates an `unpaid` document |
//! | GET | `/v1/documents/:id` | one document with its payment state |
//! | GET | `/v1/users/:id/documents?kind=` | the uploader's documents |
//! | GET | `/v1/documents/:id/ledger-record` | the contract's view of a paid document |

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sphere_core::{
    Account, CredentialDocument, CredentialKind, DocumentId, DocumentStatus, NewDocument,
    OrganizationId, UserId,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::audit::AuditEvent;
use crate::error::AppError;
use crate::extractors::parse_id;
use crate::state::AppState;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Multipart form of `POST /v1/documents`. Documented for OpenAPI only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    /// `certificate` or `degree`.
    pub kind: String,
    pub description: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Response of a successful upload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub document_id: Uuid,
    /// Always `unpaid`.
    pub status: String,
    pub content_url: String,
    pub kind: String,
}

/// A document and its payment state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub kind: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub content_url: String,
    pub description: String,
    /// `unpaid`, `pending`, `verified` or `declined`.
    pub status: String,
    pub transaction_hash: Option<String>,
    pub contract_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialDocument> for DocumentResponse {
    fn from(doc: &CredentialDocument) -> Self {
        Self {
            id: *doc.id.as_uuid(),
            kind: doc.kind.as_str().to_string(),
            user_id: *doc.user_id.as_uuid(),
            organization_id: *doc.organization_id.as_uuid(),
            content_url: doc.content_url.clone(),
            description: doc.description.clone(),
            status: doc.status.as_str().to_string(),
            transaction_hash: doc
                .chain_link
                .as_ref()
                .map(|l| l.transaction_hash.as_str().to_string()),
            contract_id: doc.contract_id().map(|c| c.value()),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Filter for the uploader's document list.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentFilter {
    /// `certificate` or `degree`.
    pub kind: Option<String>,
}

/// The contract's record of a credential.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OnChainRecord {
    pub user: String,
    pub organization: String,
    pub ipfs_hash: String,
    /// Fee held for this credential, in wei, as a decimal string.
    pub fee_wei: String,
    pub verified: bool,
    pub rejected: bool,
    pub comment: String,
}

/// On-chain record next to the off-chain status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerRecordResponse {
    pub document_id: Uuid,
    pub contract_id: u64,
    pub off_chain_status: String,
    pub on_chain: OnChainRecord,
    /// Whether the two views agree.
    pub consistent: bool,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/documents",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/v1/documents/:id", get(get_document))
        .route("/v1/documents/:id/ledger-record", get(get_ledger_record))
        .route("/v1/users/:id/documents", get(list_user_documents))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Fields collected from the multipart body.
#[derive(Default)]
struct UploadFields {
    user_id: Option<String>,
    organization_id: Option<String>,
    kind: Option<String>,
    description: Option<String>,
    file: Option<UploadedFile>,
}

struct UploadedFile {
    bytes: Vec<u8>,
    filename: String,
    content_type: Option<String>,
}

async fn read_fields(mut multipart: Multipart) -> Result<UploadFields, AppError> {
    let mut fields = UploadFields::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("credential").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                fields.file = Some(UploadedFile {
                    bytes: bytes.to_vec(),
                    filename,
                    content_type,
                });
            }
            "user_id" | "organization_id" | "kind" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let slot = match name.as_str() {
                    "user_id" => &mut fields.user_id,
                    "organization_id" => &mut fields.organization_id,
                    "kind" => &mut fields.kind,
                    _ => &mut fields.description,
                };
                *slot = Some(text);
            }
            other => tracing::debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    Ok(fields)
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| sphere_core::ValidationError::MissingField(field).into())
}

/// POST /v1/documents: Upload a certificate or degree.
///
/// Every field is checked before the file is sent to content storage, so a
/// rejected request leaves nothing behind.
#[utoipa::path(
    post,
    path = "/v1/documents",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document created as unpaid", body = UploadResponse),
        (status = 404, description = "Unknown user or organization", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid field", body = crate::error::ErrorBody),
        (status = 502, description = "Content storage failed", body = crate::error::ErrorBody),
        (status = 503, description = "Content storage not configured", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn upload_document(
    State(state): State<AppState>,
    session: Session,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let fields = read_fields(multipart).await?;

    let description = sphere_core::document::validate_description(
        fields.description.as_deref().unwrap_or_default(),
    )?;
    let kind: CredentialKind = required(&fields.kind, "kind")?.trim().parse()?;
    let user_id = UserId::from_uuid(parse_id("user_id", required(&fields.user_id, "user_id")?)?);
    let organization_id = OrganizationId::from_uuid(parse_id(
        "organization_id",
        required(&fields.organization_id, "organization_id")?,
    )?);
    let file = fields
        .file
        .filter(|f| !f.bytes.is_empty())
        .ok_or(sphere_core::ValidationError::MissingField("file"))?;

    session.require_user(&user_id)?;
    match state.accounts.get(user_id.as_uuid()) {
        Some(Account::User(_)) => {}
        _ => return Err(AppError::NotFound(format!("user {user_id} not found"))),
    }
    match state.accounts.get(organization_id.as_uuid()) {
        Some(Account::Organization(_)) => {}
        _ => {
            return Err(AppError::NotFound(format!(
                "organization {organization_id} not found"
            )))
        }
    }

    let content = state
        .content
        .as_ref()
        .ok_or_else(|| AppError::service_unavailable("content storage"))?;
    let pinned = content
        .upload(file.bytes, &file.filename, file.content_type.as_deref())
        .await?;

    let doc = CredentialDocument::new(NewDocument {
        kind,
        user_id,
        organization_id,
        description,
        content_url: pinned.url,
    })?;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::documents::insert(pool, &doc).await {
            tracing::error!(
                document_id = %doc.id,
                ipfs_hash = %pinned.ipfs_hash,
                error = %e,
                "failed to persist document, pinned file is orphaned"
            );
            return Err(AppError::Internal("document persist failed".to_string()));
        }
    }
    state.documents.insert(*doc.id.as_uuid(), doc.clone());

    crate::db::audit::record(
        state.db_pool.as_ref(),
        AuditEvent::document(
            *doc.id.as_uuid(),
            "uploaded",
            session.actor(),
            serde_json::json!({ "content_url": doc.content_url, "kind": doc.kind }),
        ),
    )
    .await;
    tracing::info!(document_id = %doc.id, kind = %doc.kind, "document uploaded");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id: *doc.id.as_uuid(),
            status: doc.status.as_str().to_string(),
            content_url: doc.content_url,
            kind: doc.kind.as_str().to_string(),
        }),
    ))
}

/// Owner, reviewing organization, or admin.
fn can_view(session: &Session, doc: &CredentialDocument) -> bool {
    session.is_admin()
        || session.require_user(&doc.user_id).is_ok()
        || session.require_organization(&doc.organization_id).is_ok()
}

fn visible_document(
    state: &AppState,
    session: &Session,
    id: Uuid,
) -> Result<CredentialDocument, AppError> {
    let not_found = || AppError::NotFound(format!("document {id} not found"));
    let doc = state.documents.get(&id).ok_or_else(not_found)?;
    // 404 rather than 403 so ids cannot be enumerated.
    if !can_view(session, &doc) {
        return Err(not_found());
    }
    Ok(doc)
}

/// GET /v1/documents/:id: Fetch one document.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document found", body = DocumentResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn get_document(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    let doc = visible_document(&state, &session, id)?;
    Ok(Json(DocumentResponse::from(&doc)))
}

/// GET /v1/users/:id/documents: The uploader's documents, newest first.
#[utoipa::path(
    get,
    path = "/v1/users/{id}/documents",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("kind" = Option<String>, Query, description = "certificate or degree"),
    ),
    responses(
        (status = 200, description = "Documents", body = Vec<DocumentResponse>),
        (status = 403, description = "Not the owner", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown kind", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn list_user_documents(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let user_id = UserId::from_uuid(id);
    session.require_user(&user_id)?;
    let kind = filter
        .kind
        .as_deref()
        .map(str::parse::<CredentialKind>)
        .transpose()?;

    let mut docs = state
        .documents
        .filter(|d| d.user_id == user_id && kind.map_or(true, |k| d.kind == k));
    docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(docs.iter().map(DocumentResponse::from).collect()))
}

/// GET /v1/documents/:id/ledger-record: Read `getCertificate` for a paid document.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}/ledger-record",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "On-chain record", body = LedgerRecordResponse),
        (status = 404, description = "Not found or unpaid", body = crate::error::ErrorBody),
        (status = 502, description = "Chain read failed", body = crate::error::ErrorBody),
        (status = 503, description = "Ledger not configured", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn get_ledger_record(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<LedgerRecordResponse>, AppError> {
    let doc = visible_document(&state, &session, id)?;
    let contract_id = doc.contract_id().ok_or_else(|| {
        AppError::NotFound(format!("document {id} is unpaid and has no on-chain record"))
    })?;
    let ledger = state
        .ledger
        .as_deref()
        .ok_or_else(|| AppError::service_unavailable("credential ledger"))?;

    let record = ledger.certificate(contract_id.value()).await?;
    let consistent = record.ipfs_hash == doc.content_url
        && match doc.status {
            DocumentStatus::Pending => !record.verified && !record.rejected,
            DocumentStatus::Verified => record.verified && !record.rejected,
            DocumentStatus::Declined => {
                !record.verified && (record.rejected || !state.config.decline_on_chain)
            }
            DocumentStatus::Unpaid => false,
        };

    Ok(Json(LedgerRecordResponse {
        document_id: *DocumentId::from_uuid(id).as_uuid(),
        contract_id: contract_id.value(),
        off_chain_status: doc.status.as_str().to_string(),
        on_chain: OnChainRecord {
            user: record.user.to_string(),
            organization: record.organization.to_string(),
            ipfs_hash: record.ipfs_hash,
            fee_wei: record.fee.to_string(),
            verified: record.verified,
            rejected: record.rejected,
            comment: record.comment,
        },
        consistent,
    }))
}
