//! Shared harness for the API integration tests: an app wired to a
//! [`MockLedger`] and a wiremock pinning service, with one registered user
//! and one organization.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sphere_api::state::{AppConfig, AppState};
use sphere_content_client::{ContentClient, ContentStoreConfig};
use sphere_core::CANONICAL_FEE_WEI;
use sphere_ledger::{
    decode_uploaded, Address, CredentialLedger, LedgerError, LedgerReceipt, MockLedger,
    OnChainCertificate, UploadedEvent, B256, U256,
};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SECRET: &str = "test-secret";
pub const IPFS_HASH: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
pub const FIRST_CONTRACT_ID: u64 = 42;
const BOUNDARY: &str = "sphere-test-boundary";

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub ledger: Arc<MockLedger>,
    pub pinata: MockServer,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub org_wallet: Address,
}

impl Harness {
    /// Auth enabled, declines recorded on chain.
    pub async fn start() -> Self {
        Self::with_config(AppConfig {
            port: 8080,
            auth_token: Some(SECRET.to_string()),
            decline_on_chain: true,
        })
        .await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let ledger = Arc::new(MockLedger::new().with_starting_id(FIRST_CONTRACT_ID));
        Self::build(config, ledger.clone(), ledger).await
    }

    /// Like [`Harness::start`], with every receipt lookup and verification
    /// call taking `delay`.
    pub async fn with_slow_ledger(delay: Duration) -> Self {
        let ledger = Arc::new(MockLedger::new().with_starting_id(FIRST_CONTRACT_ID));
        let slow = Arc::new(SlowLedger {
            inner: ledger.clone(),
            delay,
        });
        Self::build(
            AppConfig {
                port: 8080,
                auth_token: Some(SECRET.to_string()),
                decline_on_chain: true,
            },
            slow,
            ledger,
        )
        .await
    }

    async fn build(
        config: AppConfig,
        chain: Arc<dyn CredentialLedger>,
        ledger: Arc<MockLedger>,
    ) -> Self {
        let pinata = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "IpfsHash": IPFS_HASH,
                "PinSize": 13,
                "Timestamp": "2026-03-01T10:00:00.000Z"
            })))
            .mount(&pinata)
            .await;
        let content = ContentClient::new(
            ContentStoreConfig::local_mock(&pinata.uri(), "test-key", "test-secret").unwrap(),
        )
        .unwrap();

        let state = AppState::with_config(config)
            .with_ledger(chain)
            .with_content_client(content);
        let app = sphere_api::app(state.clone());

        let org_wallet = Address::repeat_byte(0x0b);
        let mut harness = Self {
            app,
            state,
            ledger,
            pinata,
            user_id: Uuid::nil(),
            org_id: Uuid::nil(),
            org_wallet,
        };

        let (status, user) = harness
            .send(post_json(
                "/v1/accounts/users",
                SECRET,
                json!({
                    "name": "Ada Obi",
                    "email": "ada@example.com",
                    "workplace": "Lagos Data Labs",
                    "wallet_address": format!("{}", Address::repeat_byte(0x0a)),
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");
        harness.user_id = user["id"].as_str().unwrap().parse().unwrap();

        let (status, org) = harness
            .send(post_json(
                "/v1/accounts/organizations",
                SECRET,
                json!({
                    "name": "Riverside University",
                    "email": "registrar@riverside.edu",
                    "wallet_address": format!("{org_wallet}"),
                    "organization_type": "Education",
                    "established_since": 1891,
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{org}");
        harness.org_id = org["id"].as_str().unwrap().parse().unwrap();

        harness
    }

    pub fn user_token(&self) -> String {
        format!("user:{}:{SECRET}", self.user_id)
    }

    pub fn org_token(&self) -> String {
        format!("organization:{}:{SECRET}", self.org_id)
    }

    /// Send a request and decode the body as JSON (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Upload a certificate as the user. Returns `(document_id, content_url)`.
    pub async fn upload(&self) -> (Uuid, String) {
        let (status, body) = self
            .send(upload_request(
                &self.user_token(),
                &[
                    ("user_id", &self.user_id.to_string()),
                    ("organization_id", &self.org_id.to_string()),
                    ("kind", "certificate"),
                    ("description", "AWS Solutions Architect Associate"),
                ],
                Some(&b"%PDF-1.4 cert"[..]),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["document_id"].as_str().unwrap().parse().unwrap(),
            body["content_url"].as_str().unwrap().to_string(),
        )
    }

    /// Simulate the user's wallet paying the canonical fee for `content_url`.
    pub fn pay(&self, content_url: &str) -> LedgerReceipt {
        self.ledger.record_upload(
            MockLedger::PAYER,
            self.org_wallet,
            content_url,
            U256::from(CANONICAL_FEE_WEI),
        )
    }

    /// Report a payment as the user.
    pub async fn report(&self, document_id: Uuid, receipt: &LedgerReceipt, contract_id: u64) -> (StatusCode, Value) {
        self.send(post_json(
            &format!("/v1/documents/{document_id}/payment"),
            &self.user_token(),
            json!({
                "transaction_hash": receipt.transaction_hash.to_string(),
                "contract_id": contract_id,
            }),
        ))
        .await
    }

    /// Upload, pay and report. Returns `(document_id, notification_id, contract_id)`.
    pub async fn pending_document(&self) -> (Uuid, Uuid, u64) {
        let (document_id, content_url) = self.upload().await;
        let receipt = self.pay(&content_url);
        let contract_id = decode_uploaded(&receipt, MockLedger::CONTRACT)
            .unwrap()
            .contract_id;
        let (status, body) = self.report(document_id, &receipt, contract_id).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            document_id,
            body["notification_id"].as_str().unwrap().parse().unwrap(),
            contract_id,
        )
    }

    /// Respond as the organization.
    pub async fn respond(&self, notification_id: Uuid, decision: &str, comment: Option<&str>) -> (StatusCode, Value) {
        self.send(post_json(
            &format!("/v1/notifications/{notification_id}/respond"),
            &self.org_token(),
            json!({ "decision": decision, "comment": comment }),
        ))
        .await
    }
}

/// A [`MockLedger`] whose receipt lookups and verification calls are slow
/// enough for two requests to overlap.
#[derive(Debug)]
pub struct SlowLedger {
    inner: Arc<MockLedger>,
    delay: Duration,
}

#[async_trait]
impl CredentialLedger for SlowLedger {
    fn contract_address(&self) -> Address {
        self.inner.contract_address()
    }

    fn payer_address(&self) -> Option<Address> {
        self.inner.payer_address()
    }

    fn log_window(&self) -> u64 {
        self.inner.log_window()
    }

    async fn submit_upload(
        &self,
        organization: Address,
        content_ref: &str,
        fee: U256,
    ) -> Result<LedgerReceipt, LedgerError> {
        self.inner.submit_upload(organization, content_ref, fee).await
    }

    async fn submit_verification(
        &self,
        contract_id: u64,
        accepted: bool,
        comment: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .submit_verification(contract_id, accepted, comment)
            .await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.transaction_receipt(tx_hash).await
    }

    async fn uploaded_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<UploadedEvent>, LedgerError> {
        self.inner.uploaded_events(from_block, to_block).await
    }

    async fn certificate(&self, contract_id: u64) -> Result<OnChainCertificate, LedgerError> {
        self.inner.certificate(contract_id).await
    }
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A `multipart/form-data` upload with text fields and an optional file.
pub fn upload_request(token: &str, fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cert.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/v1/documents")
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
