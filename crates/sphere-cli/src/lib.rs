//! # sphere-cli: Payer Command-Line Interface
//!
//! Pays the credential fee from a local wallet and reports the payment to
//! the Sphere API, the job a browser wallet does for end users.
//!
//! ## Subcommands
//!
//! - `pay`: submit `uploadCertificate` with the protocol fee, recover the
//!   contract id and report the payment
//! - `decode-receipt`: fetch an upload receipt and print its decoded event
//! - `fee`: print the protocol fee
//!
//! ## Crate Policy
//!
//! - Argument structs live next to their handlers; `main.rs` only dispatches.
//! - Acceptance of a payment is decided by the API. The CLI refuses to pay
//!   documents the API does not report as `unpaid`, and never builds a
//!   transaction with a fee other than the protocol fee.

pub mod api;
pub mod pay;
pub mod receipt;
pub mod session;

pub use api::{ApiClient, DocumentView, PaymentView};
pub use session::PayerSession;
