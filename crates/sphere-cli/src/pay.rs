//! # Pay Subcommand
//!
//! Pays for an uploaded document and reports the payment.
//!
//! 1. `GET /v1/documents/{id}`; anything but `unpaid` stops here.
//! 2. `uploadCertificate(organization, content_url)` with the protocol fee.
//! 3. The contract id is recovered from the receipt, falling back to the
//!    event filter when inline logs do not decode.
//! 4. `POST /v1/documents/{id}/payment`.
//!
//! With `--transaction` step 2 is skipped and an already-mined payment is
//! reported instead, for when step 4 failed on an earlier run.

use std::str::FromStr;

use anyhow::{bail, Context};
use clap::Args;
use sphere_core::{format_eth, CANONICAL_FEE_WEI};
use sphere_ledger::{resolve_uploaded, Address, B256, U256};
use uuid::Uuid;

use crate::api::PaymentView;
use crate::session::PayerSession;

/// Arguments for the pay subcommand.
#[derive(Args, Debug, Clone)]
pub struct PayArgs {
    /// Document to pay for.
    #[arg(long)]
    pub document: Uuid,

    /// Receiving organization's wallet. Looked up through the API when omitted.
    #[arg(long)]
    pub organization_wallet: Option<String>,

    /// Content reference passed to the contract. Must equal the document's
    /// content URL; defaults to it.
    #[arg(long)]
    pub content_url: Option<String>,

    /// Report this mined upload transaction instead of paying again.
    #[arg(long)]
    pub transaction: Option<String>,
}

pub async fn run(session: &PayerSession, args: &PayArgs) -> anyhow::Result<PaymentView> {
    let document = session.api.document(args.document).await?;
    if document.status != "unpaid" {
        bail!(
            "document {} is already {} (transaction {}), refusing to pay again",
            document.id,
            document.status,
            document.transaction_hash.as_deref().unwrap_or("unknown")
        );
    }

    let receipt = match &args.transaction {
        Some(tx) => {
            let tx_hash = B256::from_str(tx.trim())
                .with_context(|| format!("'{tx}' is not a transaction hash"))?;
            session
                .ledger
                .transaction_receipt(tx_hash)
                .await?
                .with_context(|| format!("transaction {tx_hash} is unknown or not yet mined"))?
        }
        None => {
            let content_url = match &args.content_url {
                Some(url) if *url != document.content_url => bail!(
                    "content URL {url} does not match the document's {}",
                    document.content_url
                ),
                _ => document.content_url.clone(),
            };
            let wallet = match &args.organization_wallet {
                Some(wallet) => wallet.clone(),
                None => session
                    .api
                    .organization_wallet(document.organization_id)
                    .await?,
            };
            let organization = Address::from_str(wallet.trim())
                .with_context(|| format!("'{wallet}' is not a wallet address"))?;

            tracing::info!(
                document = %document.id,
                %organization,
                fee_eth = %format_eth(CANONICAL_FEE_WEI),
                "submitting uploadCertificate"
            );
            session
                .ledger
                .submit_upload(organization, &content_url, U256::from(CANONICAL_FEE_WEI))
                .await
                .context("uploadCertificate failed, the document is still unpaid")?
        }
    };

    let event = resolve_uploaded(session.ledger.as_ref(), &receipt)
        .await
        .with_context(|| {
            format!(
                "transaction {} has no CertificateUploaded event",
                receipt.transaction_hash
            )
        })?;
    tracing::info!(
        contract_id = event.contract_id,
        tx_hash = %receipt.transaction_hash,
        "upload mined"
    );

    let tx_hash = receipt.transaction_hash.to_string();
    session
        .api
        .report_payment(document.id, &tx_hash, event.contract_id)
        .await
        .with_context(|| {
            format!(
                "payment is on chain but was not recorded; rerun with --transaction {tx_hash}"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::{json, Value};
    use sphere_ledger::{CredentialLedger, MockLedger};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::api::ApiClient;

    const CONTENT_URL: &str = "https://gateway.example/ipfs/QmCert";
    const TOKEN: &str = "user:00000000-0000-0000-0000-000000000001:s3cret";

    struct Fixture {
        server: MockServer,
        ledger: Arc<MockLedger>,
        session: PayerSession,
        document: Uuid,
    }

    fn org_wallet() -> Address {
        Address::repeat_byte(0x0b)
    }

    async fn fixture(status: &str) -> Fixture {
        let server = MockServer::start().await;
        let document = Uuid::new_v4();
        let organization = Uuid::new_v4();
        let paid_tx = if status == "unpaid" {
            Value::Null
        } else {
            json!(format!("0x{}", "cd".repeat(32)))
        };
        Mock::given(method("GET"))
            .and(path(format!("/v1/documents/{document}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": document,
                "kind": "certificate",
                "organization_id": organization,
                "content_url": CONTENT_URL,
                "status": status,
                "transaction_hash": paid_tx,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/organizations/{organization}/wallet")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "organization_id": organization,
                "wallet_address": org_wallet().to_string().to_lowercase(),
            })))
            .mount(&server)
            .await;

        let ledger = Arc::new(MockLedger::new().with_starting_id(7));
        let api = ApiClient::new(server.uri().parse().unwrap(), Some(TOKEN.into())).unwrap();
        let session = PayerSession::new(ledger.clone(), api);
        Fixture {
            server,
            ledger,
            session,
            document,
        }
    }

    impl Fixture {
        fn args(&self) -> PayArgs {
            PayArgs {
                document: self.document,
                organization_wallet: None,
                content_url: None,
                transaction: None,
            }
        }

        async fn accept_payment(&self, contract_id: u64, expected_calls: u64) {
            Mock::given(method("POST"))
                .and(path(format!("/v1/documents/{}/payment", self.document)))
                .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
                .and(body_partial_json(json!({ "contract_id": contract_id })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "document_id": self.document,
                    "status": "pending",
                    "notification_id": Uuid::new_v4(),
                    "transaction_hash": format!("0x{}", "ab".repeat(32)),
                    "contract_id": contract_id,
                    "replayed": false,
                })))
                .expect(expected_calls)
                .mount(&self.server)
                .await;
        }
    }

    #[tokio::test]
    async fn pays_unpaid_document_and_reports_contract_id() {
        let f = fixture("unpaid").await;
        f.accept_payment(7, 1).await;

        let payment = run(&f.session, &f.args()).await.unwrap();
        assert_eq!(payment.contract_id, 7);
        assert_eq!(payment.status, "pending");

        let cert = f.ledger.certificate(7).await.unwrap();
        assert_eq!(cert.organization, org_wallet());
        assert_eq!(cert.ipfs_hash, CONTENT_URL);
        assert_eq!(cert.fee, U256::from(CANONICAL_FEE_WEI));
    }

    #[tokio::test]
    async fn explicit_wallet_skips_the_lookup() {
        let f = fixture("unpaid").await;
        f.accept_payment(7, 1).await;
        let wallet = Address::repeat_byte(0x0c);

        let mut args = f.args();
        args.organization_wallet = Some(wallet.to_string());
        run(&f.session, &args).await.unwrap();

        assert_eq!(f.ledger.certificate(7).await.unwrap().organization, wallet);
    }

    #[tokio::test]
    async fn contract_id_is_recovered_without_inline_logs() {
        let f = fixture("unpaid").await;
        f.ledger.set_inline_logs(false);
        f.accept_payment(7, 1).await;

        let payment = run(&f.session, &f.args()).await.unwrap();
        assert_eq!(payment.contract_id, 7);
    }

    #[tokio::test]
    async fn refuses_to_pay_a_paid_document() {
        let f = fixture("pending").await;
        f.accept_payment(7, 0).await;

        let err = run(&f.session, &f.args()).await.unwrap_err().to_string();
        assert!(err.contains("refusing to pay again"), "{err}");
        assert!(f.ledger.certificate(7).await.is_err());
    }

    #[tokio::test]
    async fn mismatched_content_url_is_refused_before_paying() {
        let f = fixture("unpaid").await;
        f.accept_payment(7, 0).await;

        let mut args = f.args();
        args.content_url = Some("https://gateway.example/ipfs/QmOther".into());
        assert!(run(&f.session, &args).await.is_err());
        assert!(f.ledger.certificate(7).await.is_err());
    }

    #[tokio::test]
    async fn mined_transaction_can_be_reported_without_paying_again() {
        let f = fixture("unpaid").await;
        let receipt = f.ledger.record_upload(
            MockLedger::PAYER,
            org_wallet(),
            CONTENT_URL,
            U256::from(CANONICAL_FEE_WEI),
        );
        f.accept_payment(7, 1).await;

        let mut args = f.args();
        args.transaction = Some(receipt.transaction_hash.to_string());
        let payment = run(&f.session, &args).await.unwrap();

        assert_eq!(payment.contract_id, 7);
        // Nothing new was submitted.
        assert!(f.ledger.certificate(8).await.is_err());
    }

    #[tokio::test]
    async fn failed_report_names_the_transaction_to_retry_with() {
        let f = fixture("unpaid").await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/documents/{}/payment", f.document)))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "code": "SERVICE_UNAVAILABLE", "message": "ledger is not configured" }
            })))
            .mount(&f.server)
            .await;

        let err = run(&f.session, &f.args()).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("--transaction 0x"), "{message}");
        assert!(message.contains("SERVICE_UNAVAILABLE"), "{message}");
    }

    #[tokio::test]
    async fn signer_is_required_to_pay() {
        let server = MockServer::start().await;
        let document = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path(format!("/v1/documents/{document}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": document,
                "organization_id": Uuid::new_v4(),
                "content_url": CONTENT_URL,
                "status": "unpaid",
            })))
            .mount(&server)
            .await;
        let api = ApiClient::new(server.uri().parse().unwrap(), None).unwrap();
        let session = PayerSession::new(Arc::new(MockLedger::new().without_signer()), api);

        let args = PayArgs {
            document,
            organization_wallet: Some(org_wallet().to_string()),
            content_url: None,
            transaction: None,
        };
        let err = run(&session, &args).await.unwrap_err();
        assert!(format!("{err:#}").contains("still unpaid"));
    }
}
