//! Ledger adapter error types.

use alloy::primitives::{Address, B256, U256};

/// Errors from contract calls and receipt decoding.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// No signer is configured, or the configured key is unusable.
    #[error("signer unavailable: {0}")]
    Signer(String),

    /// The payer cannot cover value plus gas.
    #[error("insufficient funds for {operation}: {message}")]
    InsufficientFunds {
        operation: &'static str,
        message: String,
    },

    /// The node could not be reached or rejected the request.
    #[error("RPC error during {operation}: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted during {operation}")]
    Reverted {
        operation: &'static str,
        tx_hash: B256,
    },

    /// The contract rejected a call before it was mined.
    #[error("contract rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },

    /// A fee other than the protocol fee was requested.
    #[error("fee of {actual} wei does not match the protocol fee of {expected} wei")]
    FeeMismatch { expected: U256, actual: U256 },

    /// The receipt holds no decodable `CertificateUploaded` from the contract.
    #[error("transaction {tx_hash} emitted no CertificateUploaded event from {contract}")]
    MissingEvent { tx_hash: B256, contract: Address },

    /// A uint256 from the chain does not fit the off-chain type.
    #[error("{field} {value} is out of range")]
    OutOfRange { field: &'static str, value: String },
}

impl LedgerError {
    /// Map a send/call failure into the closest variant.
    pub(crate) fn from_call(operation: &'static str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("insufficient funds") {
            Self::InsufficientFunds { operation, message }
        } else if lower.contains("revert") {
            Self::Rejected { operation, message }
        } else {
            Self::Transport { operation, message }
        }
    }

    /// Failures a user can fix and retry without operator help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Signer(_)
                | Self::InsufficientFunds { .. }
                | Self::Transport { .. }
                | Self::Rejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_call_classifies_insufficient_funds() {
        let err = LedgerError::from_call(
            "uploadCertificate",
            "server returned an error response: insufficient funds for gas * price + value",
        );
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn from_call_classifies_reverts() {
        let err = LedgerError::from_call(
            "verifyCertificate",
            "execution reverted: Already processed",
        );
        assert!(matches!(err, LedgerError::Rejected { .. }));
    }

    #[test]
    fn missing_event_is_not_retryable() {
        let err = LedgerError::MissingEvent {
            tx_hash: B256::ZERO,
            contract: Address::ZERO,
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("CertificateUploaded"));
    }
}
