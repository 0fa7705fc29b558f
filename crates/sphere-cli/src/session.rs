//! Long-lived handles for one CLI invocation.

use std::sync::Arc;

use anyhow::Context;
use sphere_ledger::{AlloyLedger, CredentialLedger, LedgerConfig};
use url::Url;

use crate::api::ApiClient;

/// The ledger adapter and API client, built once per process.
#[derive(Debug, Clone)]
pub struct PayerSession {
    pub ledger: Arc<dyn CredentialLedger>,
    pub api: ApiClient,
}

impl PayerSession {
    pub fn new(ledger: Arc<dyn CredentialLedger>, api: ApiClient) -> Self {
        Self { ledger, api }
    }

    /// Connect using the `LEDGER_*` environment and the given API settings.
    ///
    /// Fails when the node reports a different chain id than configured.
    pub async fn connect(api_url: Url, token: Option<String>) -> anyhow::Result<Self> {
        let config = LedgerConfig::from_env().context("loading ledger configuration")?;
        let ledger = AlloyLedger::new(config)?;
        ledger
            .verify_chain_id()
            .await
            .context("checking the node's chain id")?;
        match ledger.payer_address() {
            Some(payer) => tracing::debug!(%payer, "signer loaded"),
            None => tracing::debug!("no signer configured, read-only session"),
        }
        Ok(Self::new(Arc::new(ledger), ApiClient::new(api_url, token)?))
    }
}
