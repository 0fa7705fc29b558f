//! # Receipt Decoding
//!
//! Transaction receipts are reduced to the fields the credential flow
//! needs ([`LedgerReceipt`]) and scanned for the contract's
//! `CertificateUploaded` event.
//!
//! A receipt may carry logs from other contracts and unrelated events from
//! this one. Only logs whose emitter equals the configured contract address
//! are considered; the first that decodes wins.

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, LogData, B256, U256};
use alloy::rpc::types::{Log, TransactionReceipt};
use alloy::sol_types::SolEvent;
use serde::Serialize;

use crate::bindings::ICertificatePayment::CertificateUploaded;
use crate::error::LedgerError;

/// One log entry of a receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLog {
    /// Emitting contract.
    pub address: Address,
    pub data: LogData,
    pub transaction_hash: Option<B256>,
    pub block_number: Option<u64>,
}

impl From<&Log> for ReceiptLog {
    fn from(log: &Log) -> Self {
        Self {
            address: log.inner.address,
            data: log.inner.data.clone(),
            transaction_hash: log.transaction_hash,
            block_number: log.block_number,
        }
    }
}

/// The parts of a transaction receipt the credential flow reads.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    /// `false` when the transaction reverted.
    pub succeeded: bool,
    pub logs: Vec<ReceiptLog>,
}

impl From<&TransactionReceipt> for LedgerReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            succeeded: receipt.status(),
            logs: receipt.inner.logs().iter().map(ReceiptLog::from).collect(),
        }
    }
}

/// A decoded `CertificateUploaded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedEvent {
    /// Contract-assigned id.
    pub contract_id: u64,
    /// Payer.
    pub user: Address,
    pub organization: Address,
    /// The content reference passed to `uploadCertificate`.
    pub ipfs_hash: String,
    /// Fee paid, in wei.
    pub fee: U256,
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
}

impl UploadedEvent {
    fn from_decoded(
        event: CertificateUploaded,
        transaction_hash: B256,
        block_number: Option<u64>,
    ) -> Result<Self, LedgerError> {
        let contract_id = u64::try_from(event.id).map_err(|_| LedgerError::OutOfRange {
            field: "contract id",
            value: event.id.to_string(),
        })?;
        Ok(Self {
            contract_id,
            user: event.user,
            organization: event.organization,
            ipfs_hash: event.ipfsHash,
            fee: event.fee,
            transaction_hash,
            block_number,
        })
    }

    /// Fee as `u128` wei, for comparison against the protocol constant.
    pub fn fee_wei(&self) -> Result<u128, LedgerError> {
        u128::try_from(self.fee).map_err(|_| LedgerError::OutOfRange {
            field: "fee",
            value: self.fee.to_string(),
        })
    }
}

/// Try to decode one log as `CertificateUploaded`.
pub fn decode_uploaded_log(
    log: &ReceiptLog,
    contract: Address,
) -> Option<CertificateUploaded> {
    if log.address != contract {
        return None;
    }
    CertificateUploaded::decode_log_data(&log.data, true).ok()
}

/// Recover the contract-assigned id from a receipt's inline logs.
///
/// Returns [`LedgerError::MissingEvent`] when no log from `contract`
/// decodes. Callers must not persist anything without this id.
pub fn decode_uploaded(
    receipt: &LedgerReceipt,
    contract: Address,
) -> Result<UploadedEvent, LedgerError> {
    let event = receipt
        .logs
        .iter()
        .find_map(|log| decode_uploaded_log(log, contract))
        .ok_or(LedgerError::MissingEvent {
            tx_hash: receipt.transaction_hash,
            contract,
        })?;
    UploadedEvent::from_decoded(event, receipt.transaction_hash, receipt.block_number)
}

/// Decode every `CertificateUploaded` log returned by an event filter.
/// Logs without a transaction hash are skipped.
pub fn decode_filtered(logs: &[ReceiptLog], contract: Address) -> Vec<UploadedEvent> {
    logs.iter()
        .filter_map(|log| {
            let tx_hash = log.transaction_hash?;
            let event = decode_uploaded_log(log, contract)?;
            match UploadedEvent::from_decoded(event, tx_hash, log.block_number) {
                Ok(ev) => Some(ev),
                Err(e) => {
                    tracing::warn!(%tx_hash, "skipping undecodable upload event: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Block range `[block - window, block + window]`, saturating at zero.
pub fn fallback_range(block: u64, window: u64) -> (u64, u64) {
    (block.saturating_sub(window), block.saturating_add(window))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use alloy::primitives::Bytes;

    pub fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    pub fn uploaded_log(id: u64, tx: B256, emitter: Address) -> ReceiptLog {
        let event = CertificateUploaded {
            id: U256::from(id),
            user: Address::repeat_byte(0x01),
            organization: Address::repeat_byte(0x02),
            ipfsHash: "https://gateway.pinata.cloud/ipfs/QmCert".into(),
            fee: U256::from(sphere_core::CANONICAL_FEE_WEI),
        };
        ReceiptLog {
            address: emitter,
            data: event.encode_log_data(),
            transaction_hash: Some(tx),
            block_number: Some(100),
        }
    }

    pub fn unrelated_log(emitter: Address) -> ReceiptLog {
        ReceiptLog {
            address: emitter,
            data: LogData::new_unchecked(vec![B256::repeat_byte(0x99)], Bytes::from(vec![1, 2, 3])),
            transaction_hash: None,
            block_number: Some(100),
        }
    }

    pub fn receipt(tx: B256, logs: Vec<ReceiptLog>) -> LedgerReceipt {
        LedgerReceipt {
            transaction_hash: tx,
            block_number: Some(100),
            succeeded: true,
            logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn decodes_id_from_contract_log() {
        let tx = B256::repeat_byte(0xaa);
        let r = receipt(tx, vec![uploaded_log(42, tx, contract())]);
        let ev = decode_uploaded(&r, contract()).unwrap();
        assert_eq!(ev.contract_id, 42);
        assert_eq!(ev.transaction_hash, tx);
        assert_eq!(ev.fee_wei().unwrap(), sphere_core::CANONICAL_FEE_WEI);
        assert_eq!(ev.ipfs_hash, "https://gateway.pinata.cloud/ipfs/QmCert");
    }

    #[test]
    fn skips_unrelated_logs_before_the_event() {
        let tx = B256::repeat_byte(0xab);
        let r = receipt(
            tx,
            vec![
                unrelated_log(contract()),
                unrelated_log(Address::repeat_byte(0x77)),
                uploaded_log(7, tx, contract()),
            ],
        );
        assert_eq!(decode_uploaded(&r, contract()).unwrap().contract_id, 7);
    }

    #[test]
    fn ignores_the_same_event_from_another_contract() {
        let tx = B256::repeat_byte(0xac);
        let impostor = Address::repeat_byte(0x66);
        let r = receipt(tx, vec![uploaded_log(9, tx, impostor)]);
        let err = decode_uploaded(&r, contract()).unwrap_err();
        assert!(matches!(err, LedgerError::MissingEvent { .. }));
    }

    #[test]
    fn first_decodable_event_wins() {
        let tx = B256::repeat_byte(0xad);
        let r = receipt(
            tx,
            vec![uploaded_log(3, tx, contract()), uploaded_log(4, tx, contract())],
        );
        assert_eq!(decode_uploaded(&r, contract()).unwrap().contract_id, 3);
    }

    #[test]
    fn empty_receipt_is_missing_event() {
        let r = receipt(B256::repeat_byte(0xae), vec![]);
        assert!(matches!(
            decode_uploaded(&r, contract()),
            Err(LedgerError::MissingEvent { .. })
        ));
    }

    #[test]
    fn oversized_id_is_out_of_range() {
        let tx = B256::repeat_byte(0xaf);
        let event = CertificateUploaded {
            id: U256::MAX,
            user: Address::ZERO,
            organization: Address::ZERO,
            ipfsHash: String::new(),
            fee: U256::ZERO,
        };
        let log = ReceiptLog {
            address: contract(),
            data: event.encode_log_data(),
            transaction_hash: Some(tx),
            block_number: None,
        };
        let err = decode_uploaded(&receipt(tx, vec![log]), contract()).unwrap_err();
        assert!(matches!(err, LedgerError::OutOfRange { .. }));
    }

    #[test]
    fn filtered_logs_without_tx_hash_are_skipped() {
        let tx = B256::repeat_byte(0xb0);
        let mut orphan = uploaded_log(1, tx, contract());
        orphan.transaction_hash = None;
        let events = decode_filtered(&[orphan, uploaded_log(2, tx, contract())], contract());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].contract_id, 2);
    }

    #[test]
    fn fallback_range_saturates() {
        assert_eq!(fallback_range(3, 5), (0, 8));
        assert_eq!(fallback_range(100, 5), (95, 105));
    }

    mod props {
        use super::super::fallback_range;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fallback_range_contains_block(block in any::<u64>(), window in 0u64..1_000) {
                let (from, to) = fallback_range(block, window);
                prop_assert!(from <= block && block <= to);
                prop_assert!(to - from <= window * 2);
            }
        }
    }
}
