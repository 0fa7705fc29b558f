//! # API Route Modules
//!
//! - `accounts`: user and organization registration, directory, wallets.
//! - `documents`: credential upload, document reads, on-chain record read.
//! - `payments`: reconciliation of client-reported payments.
//! - `notifications`: organization review inbox, history, decisions.
//! - `discrepancies`: chain/off-chain divergences awaiting repair.
//! - `audit`: hash-chained document transition log.

pub mod accounts;
pub mod audit;
pub mod discrepancies;
pub mod documents;
pub mod notifications;
pub mod payments;
