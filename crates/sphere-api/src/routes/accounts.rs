//! # Accounts API
//!
//! Registration and lookup of users and organizations. Emails and wallet
//! addresses are unique across both kinds. Registration is an operator
//! task: tokens are bound to account ids, so the account exists first.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sphere_core::{Accolade, Account, NewOrganization, NewUser, OrganizationType};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Register a user.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub workplace: Option<String>,
    /// 20-byte hex address, `0x`-prefixed.
    pub wallet_address: Option<String>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            name: req.name,
            email: req.email,
            photo_url: req.photo_url,
            workplace: req.workplace,
            wallet_address: req.wallet_address,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccoladeInput {
    pub title: String,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub photo_url: Option<String>,
}

/// Register an organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    /// Receives fees when the organization accepts a credential.
    pub wallet_address: String,
    /// `Business`, `Education` or `Other`.
    pub organization_type: String,
    pub established_since: Option<i32>,
    pub num_workers: Option<u32>,
    #[serde(default)]
    pub accolades: Vec<AccoladeInput>,
}

impl TryFrom<CreateOrganizationRequest> for NewOrganization {
    type Error = AppError;

    fn try_from(req: CreateOrganizationRequest) -> Result<Self, Self::Error> {
        Ok(NewOrganization {
            name: req.name,
            email: req.email,
            photo_url: req.photo_url,
            wallet_address: req.wallet_address,
            organization_type: req.organization_type.trim().parse()?,
            established_since: req.established_since,
            num_workers: req.num_workers,
            accolades: req
                .accolades
                .into_iter()
                .map(|a| Accolade {
                    title: a.title,
                    description: a.description,
                    year: a.year,
                    photo_url: a.photo_url,
                })
                .collect(),
        })
    }
}

/// Directory entry for an organization.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub organization_type: String,
    pub wallet_address: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrganizationFilter {
    /// `Business`, `Education` or `Other`.
    #[serde(rename = "type")]
    pub organization_type: Option<String>,
}

/// Where to send an upload fee.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub organization_id: Uuid,
    pub wallet_address: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the accounts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/accounts/users", post(create_user))
        .route("/v1/accounts/organizations", post(create_organization))
        .route("/v1/accounts/:id", get(get_account))
        .route("/v1/organizations", get(list_organizations))
        .route("/v1/organizations/:id/wallet", get(get_wallet))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Check uniqueness, persist, then publish to the store.
async fn register(state: &AppState, account: Account) -> Result<Account, AppError> {
    let email = account.email().to_string();
    let wallet = account.wallet_address().cloned();
    if let Some(existing) = state.accounts.find(|a| {
        a.email() == email || (wallet.is_some() && a.wallet_address() == wallet.as_ref())
    }) {
        let field = if existing.email() == email {
            "email"
        } else {
            "wallet address"
        };
        return Err(AppError::Conflict(format!(
            "an account with this {field} already exists"
        )));
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::accounts::insert(pool, &account).await {
            if crate::db::accounts::is_unique_violation(&e) {
                return Err(AppError::Conflict(
                    "an account with this email or wallet address already exists".into(),
                ));
            }
            tracing::error!(account_id = %account.id(), error = %e, "failed to persist account");
            return Err(AppError::Internal("account persist failed".into()));
        }
    }
    state.accounts.insert(account.id(), account.clone());
    tracing::info!(account_id = %account.id(), kind = account.kind(), "account registered");
    Ok(account)
}

/// POST /v1/accounts/users: Register a user.
#[utoipa::path(
    post,
    path = "/v1/accounts/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered; tagged account", body = serde_json::Value),
        (status = 409, description = "Email or wallet taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid field", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn create_user(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    session.require_admin()?;
    let req = extract_json(body)?;
    let profile = NewUser::from(req).into_profile()?;
    let account = register(&state, Account::User(profile)).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /v1/accounts/organizations: Register an organization.
#[utoipa::path(
    post,
    path = "/v1/accounts/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization registered; tagged account", body = serde_json::Value),
        (status = 409, description = "Email or wallet taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid field", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn create_organization(
    State(state): State<AppState>,
    session: Session,
    body: Result<Json<CreateOrganizationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    session.require_admin()?;
    let req = extract_json(body)?;
    let profile = NewOrganization::try_from(req)?.into_profile()?;
    let account = register(&state, Account::Organization(profile)).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /v1/accounts/:id: Fetch a user or organization.
#[utoipa::path(
    get,
    path = "/v1/accounts/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Tagged account (`kind` = user | organization)", body = serde_json::Value),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>, AppError> {
    state
        .accounts
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("account {id} not found")))
}

/// GET /v1/organizations: Organization directory.
#[utoipa::path(
    get,
    path = "/v1/organizations",
    params(("type" = Option<String>, Query, description = "Business, Education or Other")),
    responses(
        (status = 200, description = "Organizations, by name", body = Vec<OrganizationSummary>),
        (status = 422, description = "Unknown type", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn list_organizations(
    State(state): State<AppState>,
    Query(filter): Query<OrganizationFilter>,
) -> Result<Json<Vec<OrganizationSummary>>, AppError> {
    let wanted = filter
        .organization_type
        .as_deref()
        .map(str::parse::<OrganizationType>)
        .transpose()?;

    let mut orgs: Vec<OrganizationSummary> = state
        .accounts
        .list()
        .into_iter()
        .filter_map(|a| match a {
            Account::Organization(o) => Some(o),
            Account::User(_) => None,
        })
        .filter(|o| wanted.map_or(true, |t| o.organization_type == t))
        .map(|o| OrganizationSummary {
            id: *o.id.as_uuid(),
            name: o.name,
            email: o.email,
            photo_url: o.photo_url,
            organization_type: o.organization_type.as_str().to_string(),
            wallet_address: o.wallet_address.to_string(),
        })
        .collect();
    orgs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(orgs))
}

/// GET /v1/organizations/:id/wallet: Fee recipient for an organization.
#[utoipa::path(
    get,
    path = "/v1/organizations/{id}/wallet",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Wallet address", body = WalletResponse),
        (status = 404, description = "Not an organization", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
async fn get_wallet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let org = state
        .accounts
        .get(&id)
        .and_then(|a| a.as_organization().cloned())
        .ok_or_else(|| AppError::NotFound(format!("organization {id} not found")))?;
    Ok(Json(WalletResponse {
        organization_id: id,
        wallet_address: org.wallet_address.to_string(),
    }))
}
