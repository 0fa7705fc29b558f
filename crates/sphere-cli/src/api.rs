//! Client for the Sphere API endpoints the payer uses.

use std::time::Duration;

use anyhow::{bail, Context};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// The fields of `GET /v1/documents/{id}` the payer reads.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub content_url: String,
    pub status: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub contract_id: Option<u64>,
}

/// Response of `POST /v1/documents/{id}/payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentView {
    pub document_id: Uuid,
    pub status: String,
    pub notification_id: Uuid,
    pub transaction_hash: String,
    pub contract_id: u64,
    pub replayed: bool,
}

#[derive(Debug, Deserialize)]
struct WalletView {
    wallet_address: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Bearer-authenticated JSON client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ApiClient {
    pub fn new(mut base: Url, token: Option<String>) -> anyhow::Result<Self> {
        // Url::join drops the last path segment unless it ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, base, token })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn document(&self, id: Uuid) -> anyhow::Result<DocumentView> {
        let endpoint = format!("GET /v1/documents/{id}");
        let resp = self
            .request(Method::GET, &format!("v1/documents/{id}"))?
            .send()
            .await
            .with_context(|| format!("{endpoint}: request failed"))?;
        decode(&endpoint, resp).await
    }

    /// Wallet address registered for an organization.
    pub async fn organization_wallet(&self, id: Uuid) -> anyhow::Result<String> {
        let endpoint = format!("GET /v1/organizations/{id}/wallet");
        let resp = self
            .request(Method::GET, &format!("v1/organizations/{id}/wallet"))?
            .send()
            .await
            .with_context(|| format!("{endpoint}: request failed"))?;
        let wallet: WalletView = decode(&endpoint, resp).await?;
        Ok(wallet.wallet_address)
    }

    pub async fn report_payment(
        &self,
        document: Uuid,
        transaction_hash: &str,
        contract_id: u64,
    ) -> anyhow::Result<PaymentView> {
        let endpoint = format!("POST /v1/documents/{document}/payment");
        let resp = self
            .request(Method::POST, &format!("v1/documents/{document}/payment"))?
            .json(&serde_json::json!({
                "transaction_hash": transaction_hash,
                "contract_id": contract_id,
            }))
            .send()
            .await
            .with_context(|| format!("{endpoint}: request failed"))?;
        decode(&endpoint, resp).await
    }

    fn request(&self, method: Method, path: &str) -> anyhow::Result<reqwest::RequestBuilder> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("invalid API path {path}"))?;
        let mut req = self.http.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, resp: reqwest::Response) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json()
            .await
            .with_context(|| format!("{endpoint}: unexpected response body"));
    }
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => bail!(
            "{endpoint} returned {status} {}: {}",
            envelope.error.code,
            envelope.error.message
        ),
        Err(_) => bail!("{endpoint} returned {status}: {body}"),
    }
}
