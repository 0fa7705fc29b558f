//! # sphere-core: Credential Verification Domain
//!
//! Types and rules shared by the API, the ledger adapter and the CLI.
//!
//! ## Records
//!
//! | Type | Module | Lifecycle |
//! |------|--------|-----------|
//! | [`CredentialDocument`] | [`document`] | `unpaid → pending → verified \| declined` |
//! | [`Notification`] | [`notification`] | `pending → accepted \| declined` |
//! | [`Account`] | [`account`] | user or organization, tagged by `kind` |
//! | [`ReconciliationDiscrepancy`] | [`discrepancy`] | append-only |
//!
//! ## Invariants
//!
//! - A document's transaction hash and contract id are set together or not
//!   at all ([`ChainLink`]).
//! - Only `unpaid` documents carry no link.
//! - Terminal statuses have no outgoing transitions.
//!
//! This crate does no I/O.

pub mod account;
pub mod discrepancy;
pub mod document;
pub mod error;
pub mod fee;
pub mod identity;
pub mod notification;

pub use account::{Accolade, Account, NewOrganization, NewUser, OrganizationProfile, OrganizationType, UserProfile};
pub use discrepancy::ReconciliationDiscrepancy;
pub use document::{
    ChainLink, CredentialDocument, CredentialKind, DocumentStatus, NewDocument, PaymentOutcome,
    StatusChange,
};
pub use error::{ReconciliationError, SphereError, TransitionError, ValidationError};
pub use fee::{format_eth, validate_fee, CANONICAL_FEE_WEI};
pub use identity::{
    ContractId, DiscrepancyId, DocumentId, NotificationId, OrganizationId, TransactionHash, UserId,
    WalletAddress,
};
pub use notification::{Decision, Notification, NotificationStatus};
