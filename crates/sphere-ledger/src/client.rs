//! JSON-RPC implementation of [`CredentialLedger`] backed by alloy.
//!
//! The signer is parsed once at construction. Providers are cheap HTTP
//! wrappers and are built per call.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use tracing::info;

use crate::bindings::ICertificatePayment::{self, CertificateUploaded};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::receipt::{decode_filtered, LedgerReceipt, ReceiptLog, UploadedEvent};
use crate::traits::{ensure_canonical_fee, CredentialLedger, OnChainCertificate};

/// Ledger adapter talking to a node over HTTP.
pub struct AlloyLedger {
    config: LedgerConfig,
    signer: Option<PrivateKeySigner>,
}

impl std::fmt::Debug for AlloyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyLedger")
            .field("config", &self.config)
            .field("payer", &self.signer.as_ref().map(|s| s.address()))
            .finish()
    }
}

impl AlloyLedger {
    /// Build an adapter. Fails if a private key is configured but malformed.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let signer = match config.private_key.as_deref() {
            Some(key) => Some(
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| LedgerError::Signer(format!("invalid private key: {e}")))?,
            ),
            None => None,
        };
        Ok(Self { config, signer })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Compare the node's chain id with the configured one.
    pub async fn verify_chain_id(&self) -> Result<(), LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.config.rpc_url.clone());
        let actual = provider
            .get_chain_id()
            .await
            .map_err(|e| LedgerError::from_call("eth_chainId", e))?;
        if actual != self.config.chain_id {
            return Err(LedgerError::Transport {
                operation: "eth_chainId",
                message: format!(
                    "node reports chain id {actual}, expected {}",
                    self.config.chain_id
                ),
            });
        }
        Ok(())
    }

    fn signer(&self, operation: &'static str) -> Result<PrivateKeySigner, LedgerError> {
        self.signer
            .clone()
            .ok_or_else(|| LedgerError::Signer(format!("{operation} requires LEDGER_PRIVATE_KEY")))
    }
}

fn into_receipt(
    operation: &'static str,
    receipt: &alloy::rpc::types::TransactionReceipt,
) -> Result<LedgerReceipt, LedgerError> {
    let receipt = LedgerReceipt::from(receipt);
    if !receipt.succeeded {
        return Err(LedgerError::Reverted {
            operation,
            tx_hash: receipt.transaction_hash,
        });
    }
    Ok(receipt)
}

#[async_trait]
impl CredentialLedger for AlloyLedger {
    fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    fn payer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    fn log_window(&self) -> u64 {
        self.config.log_window
    }

    async fn submit_upload(
        &self,
        organization: Address,
        content_ref: &str,
        fee: U256,
    ) -> Result<LedgerReceipt, LedgerError> {
        const OP: &str = "uploadCertificate";
        ensure_canonical_fee(fee)?;
        let signer = self.signer(OP)?;

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(self.config.rpc_url.clone());
        let contract = ICertificatePayment::new(self.config.contract_address, &provider);

        let pending = contract
            .uploadCertificate(organization, content_ref.to_string())
            .value(fee)
            .send()
            .await
            .map_err(|e| LedgerError::from_call(OP, e))?;
        info!(tx_hash = %pending.tx_hash(), %organization, "upload transaction sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerError::from_call(OP, e))?;
        into_receipt(OP, &receipt)
    }

    async fn submit_verification(
        &self,
        contract_id: u64,
        accepted: bool,
        comment: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        const OP: &str = "verifyCertificate";
        let signer = self.signer(OP)?;

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(self.config.rpc_url.clone());
        let contract = ICertificatePayment::new(self.config.contract_address, &provider);

        let pending = contract
            .verifyCertificate(U256::from(contract_id), accepted, comment.to_string())
            .send()
            .await
            .map_err(|e| LedgerError::from_call(OP, e))?;
        info!(tx_hash = %pending.tx_hash(), contract_id, accepted, "verification transaction sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LedgerError::from_call(OP, e))?;
        into_receipt(OP, &receipt)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.config.rpc_url.clone());
        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| LedgerError::from_call("eth_getTransactionReceipt", e))?;
        Ok(receipt.as_ref().map(LedgerReceipt::from))
    }

    async fn uploaded_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<UploadedEvent>, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.config.rpc_url.clone());
        let filter = Filter::new()
            .address(self.config.contract_address)
            .event_signature(CertificateUploaded::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);
        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| LedgerError::from_call("eth_getLogs", e))?;
        let logs: Vec<ReceiptLog> = logs.iter().map(ReceiptLog::from).collect();
        Ok(decode_filtered(&logs, self.config.contract_address))
    }

    async fn certificate(&self, contract_id: u64) -> Result<OnChainCertificate, LedgerError> {
        let provider = ProviderBuilder::new().on_http(self.config.rpc_url.clone());
        let contract = ICertificatePayment::new(self.config.contract_address, &provider);
        let record = contract
            .getCertificate(U256::from(contract_id))
            .call()
            .await
            .map_err(|e| LedgerError::from_call("getCertificate", e))?;
        let id = u64::try_from(record.id).map_err(|_| LedgerError::OutOfRange {
            field: "contract id",
            value: record.id.to_string(),
        })?;
        Ok(OnChainCertificate {
            id,
            user: record.user,
            organization: record.organization,
            ipfs_hash: record.ipfsHash,
            fee: record.fee,
            verified: record.verified,
            rejected: record.rejected,
            comment: record.comment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_KEY_0: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn signer_address_is_derived_from_key() {
        let cfg = LedgerConfig::local(Address::repeat_byte(0x11), Some(HARDHAT_KEY_0)).unwrap();
        let ledger = AlloyLedger::new(cfg).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(ledger.payer_address(), Some(expected));
    }

    #[test]
    fn malformed_key_is_rejected_at_construction() {
        let cfg = LedgerConfig::local(Address::repeat_byte(0x11), Some("not-a-key")).unwrap();
        assert!(matches!(AlloyLedger::new(cfg), Err(LedgerError::Signer(_))));
    }

    #[tokio::test]
    async fn upload_without_signer_fails_before_any_rpc() {
        let cfg = LedgerConfig::local(Address::repeat_byte(0x11), None).unwrap();
        let ledger = AlloyLedger::new(cfg).unwrap();
        let err = ledger
            .submit_upload(
                Address::repeat_byte(0x22),
                "https://gateway.pinata.cloud/ipfs/Qm",
                U256::from(sphere_core::CANONICAL_FEE_WEI),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Signer(_)));
    }

    #[tokio::test]
    async fn upload_with_wrong_fee_fails_before_any_rpc() {
        let cfg = LedgerConfig::local(Address::repeat_byte(0x11), Some(HARDHAT_KEY_0)).unwrap();
        let ledger = AlloyLedger::new(cfg).unwrap();
        let err = ledger
            .submit_upload(Address::repeat_byte(0x22), "ipfs", U256::from(5u64))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FeeMismatch { .. }));
    }

    #[test]
    fn debug_does_not_print_key() {
        let cfg = LedgerConfig::local(Address::repeat_byte(0x11), Some(HARDHAT_KEY_0)).unwrap();
        let rendered = format!("{:?}", AlloyLedger::new(cfg).unwrap());
        assert!(!rendered.contains("ac0974"));
    }
}
