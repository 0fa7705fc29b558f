//! # In-Process Ledger
//!
//! [`MockLedger`] mimics the `CertificatePayment` contract in memory: it
//! assigns sequential ids, produces receipts carrying real ABI-encoded
//! `CertificateUploaded` logs, keeps the event history for the filter
//! fallback and tracks verified/rejected flags per credential.
//!
//! Failure injection covers the paths the credential flow must survive:
//! failing verification calls, receipts whose inline logs are missing, an
//! absent signer, and arbitrary hand-built receipts.

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bindings::ICertificatePayment::{CertificateUploaded, CertificateVerified};
use crate::error::LedgerError;
use crate::receipt::{decode_filtered, LedgerReceipt, ReceiptLog, UploadedEvent};
use crate::traits::{ensure_canonical_fee, CredentialLedger, OnChainCertificate};

/// A verification call the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedVerification {
    pub contract_id: u64,
    pub accepted: bool,
    pub comment: String,
    pub transaction_hash: B256,
}

#[derive(Debug)]
struct MockState {
    next_id: u64,
    block: u64,
    nonce: u64,
    receipts: HashMap<B256, LedgerReceipt>,
    certificates: BTreeMap<u64, OnChainCertificate>,
    event_log: Vec<ReceiptLog>,
    verifications: Vec<RecordedVerification>,
    verification_failure: Option<String>,
    inline_logs: bool,
}

/// In-memory stand-in for the credential contract.
#[derive(Debug)]
pub struct MockLedger {
    contract: Address,
    payer: Option<Address>,
    log_window: u64,
    state: Mutex<MockState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Contract address used by [`MockLedger::new`].
    pub const CONTRACT: Address = Address::repeat_byte(0xc0);
    /// Signer address used by [`MockLedger::new`].
    pub const PAYER: Address = Address::repeat_byte(0xfa);

    pub fn new() -> Self {
        Self {
            contract: Self::CONTRACT,
            payer: Some(Self::PAYER),
            log_window: crate::config::DEFAULT_LOG_WINDOW,
            state: Mutex::new(MockState {
                next_id: 0,
                block: 1,
                nonce: 0,
                receipts: HashMap::new(),
                certificates: BTreeMap::new(),
                event_log: Vec::new(),
                verifications: Vec::new(),
                verification_failure: None,
                inline_logs: true,
            }),
        }
    }

    /// Start id assignment at `id` instead of 0.
    pub fn with_starting_id(self, id: u64) -> Self {
        self.state.lock().next_id = id;
        self
    }

    /// Drop the signer; every submit call then fails with
    /// [`LedgerError::Signer`].
    pub fn without_signer(mut self) -> Self {
        self.payer = None;
        self
    }

    /// Make every `submit_verification` fail with the given RPC message,
    /// or succeed again with `None`.
    pub fn fail_verifications(&self, message: Option<&str>) {
        self.state.lock().verification_failure = message.map(str::to_string);
    }

    /// When `false`, upload receipts carry no logs; the event is only
    /// reachable through [`CredentialLedger::uploaded_events`].
    pub fn set_inline_logs(&self, inline: bool) {
        self.state.lock().inline_logs = inline;
    }

    /// Register a hand-built receipt, e.g. one with foreign logs only.
    pub fn insert_receipt(&self, receipt: LedgerReceipt) {
        self.state
            .lock()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    /// Verification calls accepted so far, oldest first.
    pub fn verifications(&self) -> Vec<RecordedVerification> {
        self.state.lock().verifications.clone()
    }

    /// Simulate a mined `uploadCertificate` from `payer` with any fee.
    ///
    /// Used to model client-side payments, including ones that a real
    /// client should not be able to make.
    pub fn record_upload(
        &self,
        payer: Address,
        organization: Address,
        content_ref: &str,
        fee: U256,
    ) -> LedgerReceipt {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        let (tx_hash, block) = state.advance();

        let event = CertificateUploaded {
            id: U256::from(id),
            user: payer,
            organization,
            ipfsHash: content_ref.to_string(),
            fee,
        };
        let log = ReceiptLog {
            address: self.contract,
            data: event.encode_log_data(),
            transaction_hash: Some(tx_hash),
            block_number: Some(block),
        };
        state.event_log.push(log.clone());
        state.certificates.insert(
            id,
            OnChainCertificate {
                id,
                user: payer,
                organization,
                ipfs_hash: content_ref.to_string(),
                fee,
                verified: false,
                rejected: false,
                comment: String::new(),
            },
        );

        let receipt = LedgerReceipt {
            transaction_hash: tx_hash,
            block_number: Some(block),
            succeeded: true,
            logs: if state.inline_logs { vec![log] } else { Vec::new() },
        };
        state.receipts.insert(tx_hash, receipt.clone());
        receipt
    }

    fn require_signer(&self) -> Result<Address, LedgerError> {
        self.payer
            .ok_or_else(|| LedgerError::Signer("mock ledger has no signer".into()))
    }
}

impl MockState {
    fn advance(&mut self) -> (B256, u64) {
        let tx_hash = keccak256(self.nonce.to_be_bytes());
        self.nonce += 1;
        self.block += 1;
        (tx_hash, self.block)
    }
}

#[async_trait]
impl CredentialLedger for MockLedger {
    fn contract_address(&self) -> Address {
        self.contract
    }

    fn payer_address(&self) -> Option<Address> {
        self.payer
    }

    fn log_window(&self) -> u64 {
        self.log_window
    }

    async fn submit_upload(
        &self,
        organization: Address,
        content_ref: &str,
        fee: U256,
    ) -> Result<LedgerReceipt, LedgerError> {
        ensure_canonical_fee(fee)?;
        let payer = self.require_signer()?;
        Ok(self.record_upload(payer, organization, content_ref, fee))
    }

    async fn submit_verification(
        &self,
        contract_id: u64,
        accepted: bool,
        comment: &str,
    ) -> Result<LedgerReceipt, LedgerError> {
        const OP: &str = "verifyCertificate";
        self.require_signer()?;
        let mut state = self.state.lock();

        if let Some(message) = state.verification_failure.clone() {
            return Err(LedgerError::from_call(OP, message));
        }
        let cert = state
            .certificates
            .get_mut(&contract_id)
            .ok_or_else(|| LedgerError::Rejected {
                operation: OP,
                message: format!("execution reverted: certificate {contract_id} does not exist"),
            })?;
        if cert.verified || cert.rejected {
            return Err(LedgerError::Rejected {
                operation: OP,
                message: "execution reverted: Already processed".into(),
            });
        }
        if accepted {
            cert.verified = true;
        } else {
            cert.rejected = true;
        }
        cert.comment = comment.to_string();

        let (tx_hash, block) = state.advance();
        let event = CertificateVerified {
            id: U256::from(contract_id),
            accepted,
            comment: comment.to_string(),
        };
        let receipt = LedgerReceipt {
            transaction_hash: tx_hash,
            block_number: Some(block),
            succeeded: true,
            logs: vec![ReceiptLog {
                address: self.contract,
                data: event.encode_log_data(),
                transaction_hash: Some(tx_hash),
                block_number: Some(block),
            }],
        };
        state.receipts.insert(tx_hash, receipt.clone());
        state.verifications.push(RecordedVerification {
            contract_id,
            accepted,
            comment: comment.to_string(),
            transaction_hash: tx_hash,
        });
        Ok(receipt)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        Ok(self.state.lock().receipts.get(&tx_hash).cloned())
    }

    async fn uploaded_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<UploadedEvent>, LedgerError> {
        let state = self.state.lock();
        let in_range: Vec<ReceiptLog> = state
            .event_log
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|b| (from_block..=to_block).contains(&b))
            })
            .cloned()
            .collect();
        Ok(decode_filtered(&in_range, self.contract))
    }

    async fn certificate(&self, contract_id: u64) -> Result<OnChainCertificate, LedgerError> {
        self.state
            .lock()
            .certificates
            .get(&contract_id)
            .cloned()
            .ok_or_else(|| LedgerError::Rejected {
                operation: "getCertificate",
                message: format!("execution reverted: certificate {contract_id} does not exist"),
            })
    }
}
