//! # Ledger Abstraction
//!
//! [`CredentialLedger`] is the seam between the credential flow and the
//! chain. The API and CLI hold an `Arc<dyn CredentialLedger>`; production
//! wiring uses [`AlloyLedger`](crate::AlloyLedger), tests use
//! [`MockLedger`](crate::MockLedger).
//!
//! Implementations only move data. Deciding whether a payment is acceptable
//! (id, content reference and fee all matching) belongs to the caller.

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::DEFAULT_LOG_WINDOW;
use crate::error::LedgerError;
use crate::receipt::{decode_uploaded, fallback_range, LedgerReceipt, UploadedEvent};

/// The contract's view of one credential, from `getCertificate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnChainCertificate {
    pub id: u64,
    pub user: Address,
    pub organization: Address,
    pub ipfs_hash: String,
    pub fee: U256,
    pub verified: bool,
    pub rejected: bool,
    pub comment: String,
}

/// Operations against the deployed credential contract.
#[async_trait]
pub trait CredentialLedger: Send + Sync + std::fmt::Debug {
    /// Address of the credential contract. Logs from any other emitter are
    /// ignored during decoding.
    fn contract_address(&self) -> Address;

    /// Address transactions are signed from, if a signer is configured.
    fn payer_address(&self) -> Option<Address>;

    /// Blocks searched on each side of a receipt's block by the fallback.
    fn log_window(&self) -> u64 {
        DEFAULT_LOG_WINDOW
    }

    /// Call `uploadCertificate(organization, content_ref)` with `fee` wei
    /// attached and wait for the receipt.
    ///
    /// `fee` must equal the protocol fee. A reverted transaction is an error.
    async fn submit_upload(
        &self,
        organization: Address,
        content_ref: &str,
        fee: U256,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Call `verifyCertificate(contract_id, accepted, comment)` and wait for
    /// the receipt. A reverted transaction is an error.
    async fn submit_verification(
        &self,
        contract_id: u64,
        accepted: bool,
        comment: &str,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Fetch a mined transaction's receipt. `None` if unknown or pending.
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<LedgerReceipt>, LedgerError>;

    /// `CertificateUploaded` events emitted by the contract in
    /// `[from_block, to_block]`.
    async fn uploaded_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<UploadedEvent>, LedgerError>;

    /// Read a credential record from the contract.
    async fn certificate(&self, contract_id: u64) -> Result<OnChainCertificate, LedgerError>;
}

/// Reject any fee other than the protocol fee before a transaction is built.
pub fn ensure_canonical_fee(fee: U256) -> Result<(), LedgerError> {
    let expected = U256::from(sphere_core::CANONICAL_FEE_WEI);
    if fee != expected {
        return Err(LedgerError::FeeMismatch {
            expected,
            actual: fee,
        });
    }
    Ok(())
}

/// Recover the `CertificateUploaded` event for a receipt.
///
/// Inline logs are tried first. If none decodes and the receipt names its
/// block, the contract's event filter is queried over
/// `block ± ledger.log_window()` and the event whose transaction hash equals
/// the receipt's is returned.
pub async fn resolve_uploaded(
    ledger: &dyn CredentialLedger,
    receipt: &LedgerReceipt,
) -> Result<UploadedEvent, LedgerError> {
    let inline_err = match decode_uploaded(receipt, ledger.contract_address()) {
        Ok(event) => return Ok(event),
        Err(e @ LedgerError::MissingEvent { .. }) => e,
        Err(e) => return Err(e),
    };

    let Some(block) = receipt.block_number else {
        return Err(inline_err);
    };
    let (from, to) = fallback_range(block, ledger.log_window());
    tracing::debug!(
        tx_hash = %receipt.transaction_hash,
        from,
        to,
        "inline logs did not decode, querying event filter"
    );

    ledger
        .uploaded_events(from, to)
        .await?
        .into_iter()
        .find(|ev| ev.transaction_hash == receipt.transaction_hash)
        .ok_or(inline_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_fee_passes() {
        assert!(ensure_canonical_fee(U256::from(1_000_000_000_000_000u128)).is_ok());
    }

    #[test]
    fn other_fees_are_rejected() {
        let err = ensure_canonical_fee(U256::from(1u64)).unwrap_err();
        match err {
            LedgerError::FeeMismatch { expected, actual } => {
                assert_eq!(expected, U256::from(sphere_core::CANONICAL_FEE_WEI));
                assert_eq!(actual, U256::from(1u64));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
