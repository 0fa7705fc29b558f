//! # sphere-ledger: Credential Contract Adapter
//!
//! Talks to the `CertificatePayment` contract: fee-paying uploads,
//! verification decisions, receipt and event-filter reads.
//!
//! ## Identifier Recovery
//!
//! `uploadCertificate` does not return the id it assigns. The id is read
//! from the `CertificateUploaded` event in the transaction receipt
//! ([`decode_uploaded`]); when the inline logs do not decode,
//! [`resolve_uploaded`] falls back to the event filter over a small block
//! window around the receipt's block and matches by transaction hash.
//!
//! ## Backends
//!
//! | Type | Feature | Use |
//! |------|---------|-----|
//! | [`AlloyLedger`] | always | JSON-RPC node via alloy |
//! | [`MockLedger`] | `mock` (default) | tests and local runs |

pub mod bindings;
pub mod client;
pub mod config;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod receipt;
pub mod traits;

pub use client::AlloyLedger;
pub use config::{ConfigError, LedgerConfig};
pub use error::LedgerError;
#[cfg(feature = "mock")]
pub use mock::{MockLedger, RecordedVerification};
pub use receipt::{decode_uploaded, LedgerReceipt, ReceiptLog, UploadedEvent};
pub use traits::{ensure_canonical_fee, resolve_uploaded, CredentialLedger, OnChainCertificate};

/// Re-exported so dependents need not name alloy for the common types.
pub use alloy::primitives::{Address, B256, U256};
