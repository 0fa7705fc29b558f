//! # Error Hierarchy
//!
//! Structured error types for the credential domain, built with `thiserror`.
//!
//! Each variant carries enough context (the offending value, the state at
//! the time of failure) for the API layer to produce an actionable message
//! without re-inspecting the record.

use thiserror::Error;

/// Top-level error type for domain operations.
#[derive(Error, Debug)]
pub enum SphereError {
    /// Input failed a domain rule.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Status machine violation.
    #[error("state transition error: {0}")]
    Transition(#[from] TransitionError),

    /// A payment could not be bound to its document.
    #[error("reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),
}

/// Validation errors for domain primitives and request payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A text field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// Maximum accepted length.
        max: usize,
    },

    /// Transaction hash is not a 32-byte 0x-prefixed hex string.
    #[error("invalid transaction hash: \"{0}\" (expected 0x followed by 64 hex digits)")]
    InvalidTransactionHash(String),

    /// Wallet address is not a 20-byte 0x-prefixed hex string.
    #[error("invalid wallet address: \"{0}\" (expected 0x followed by 40 hex digits)")]
    InvalidWalletAddress(String),

    /// Email address has no plausible `local@domain` shape.
    #[error("invalid email address: \"{0}\"")]
    InvalidEmail(String),

    /// Content reference is not an absolute http(s) URL.
    #[error("invalid content URL: \"{0}\"")]
    InvalidContentUrl(String),

    /// The fee paid differs from the protocol fee.
    #[error("fee of {actual} wei does not match the protocol fee of {expected} wei")]
    FeeMismatch {
        /// Protocol fee in wei.
        expected: u128,
        /// Fee observed on chain, in wei.
        actual: u128,
    },

    /// Enumerated value outside the accepted set.
    #[error("invalid {field}: \"{value}\"")]
    InvalidEnum {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Errors raised by the document and notification status machines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The attempted transition is not valid from the current state.
    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },
}

/// Errors binding an on-chain payment to an off-chain document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    /// The document already carries a different payment, or is past `pending`.
    #[error("document {document_id} is {status}; payment {transaction_hash} cannot be recorded")]
    Conflict {
        /// Document the payment was reported against.
        document_id: String,
        /// Current document status.
        status: String,
        /// Transaction hash of the rejected report.
        transaction_hash: String,
    },
}
