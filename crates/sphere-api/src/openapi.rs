//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`{kind}:{account_id}:{secret}` with kind user, organization or admin, \
                             or the bare secret for admin. Set the secret via AUTH_TOKEN.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the Sphere API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sphere API",
        version = "0.3.1",
        description = "Credential verification for the Sphere network.\n\nUsers upload certificates and degrees, pay the verification fee to the credential contract, and report the payment. Organizations review pending credentials and accept or decline them; the decision is recorded on chain before it is mirrored off chain.\n\nAuthentication: `Authorization: Bearer <token>`. All `/v1/*` endpoints require it. Health checks (`/health/*`) do not.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Accounts ─────────────────────────────────────────────────────
        crate::routes::accounts::create_user,
        crate::routes::accounts::create_organization,
        crate::routes::accounts::get_account,
        crate::routes::accounts::list_organizations,
        crate::routes::accounts::get_wallet,
        // ── Documents ────────────────────────────────────────────────────
        crate::routes::documents::upload_document,
        crate::routes::documents::get_document,
        crate::routes::documents::list_user_documents,
        crate::routes::documents::get_ledger_record,
        // ── Payments ─────────────────────────────────────────────────────
        crate::routes::payments::record_payment,
        // ── Notifications ────────────────────────────────────────────────
        crate::routes::notifications::list_pending,
        crate::routes::notifications::list_history,
        crate::routes::notifications::respond,
        // ── Operations ───────────────────────────────────────────────────
        crate::routes::discrepancies::list_discrepancies,
        crate::routes::audit::document_audit,
        crate::routes::audit::chain_integrity,
        crate::service_metrics,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::accounts::CreateUserRequest,
            crate::routes::accounts::CreateOrganizationRequest,
            crate::routes::accounts::AccoladeInput,
            crate::routes::accounts::OrganizationSummary,
            crate::routes::accounts::WalletResponse,
            crate::routes::documents::UploadForm,
            crate::routes::documents::UploadResponse,
            crate::routes::documents::DocumentResponse,
            crate::routes::documents::OnChainRecord,
            crate::routes::documents::LedgerRecordResponse,
            crate::routes::payments::PaymentRequest,
            crate::routes::payments::PaymentResponse,
            crate::routes::notifications::RespondRequest,
            crate::routes::notifications::RespondResponse,
            crate::inbox::Inbox,
            crate::inbox::InboxItem,
            crate::inbox::OwnerSummary,
            crate::routes::discrepancies::DiscrepancyResponse,
            crate::routes::audit::AuditEventResponse,
            crate::routes::audit::IntegrityResponse,
            crate::MetricsResponse,
            crate::DocumentCounts,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "accounts", description = "User and organization registration and lookup"),
        (name = "documents", description = "Credential upload and document reads"),
        (name = "payments", description = "Reconciliation of on-chain fee payments"),
        (name = "notifications", description = "Organization review inbox and decisions"),
        (name = "operations", description = "Discrepancies, audit trail and service counters (admin)"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_the_credential_flow() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Sphere API");
        for path in [
            "/v1/documents",
            "/v1/documents/{id}/payment",
            "/v1/organizations/{id}/notifications",
            "/v1/notifications/{id}/respond",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_declares_bearer_auth() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
