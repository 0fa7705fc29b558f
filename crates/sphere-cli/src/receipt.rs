//! # Decode-Receipt Subcommand
//!
//! Fetches an upload transaction's receipt and prints the decoded
//! `CertificateUploaded` event, including whether the fee matches the
//! protocol fee.

use std::str::FromStr;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use sphere_core::{format_eth, CANONICAL_FEE_WEI};
use sphere_ledger::{resolve_uploaded, CredentialLedger, B256};

/// Arguments for the decode-receipt subcommand.
#[derive(Args, Debug, Clone)]
pub struct DecodeReceiptArgs {
    /// Transaction hash of an `uploadCertificate` call.
    #[arg(long)]
    pub tx: String,
}

/// Printed as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct DecodedReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub contract_id: u64,
    pub user: String,
    pub organization: String,
    pub ipfs_hash: String,
    pub fee_wei: String,
    pub fee_eth: Option<String>,
    pub fee_is_canonical: bool,
}

pub async fn run(
    ledger: &dyn CredentialLedger,
    args: &DecodeReceiptArgs,
) -> anyhow::Result<DecodedReceipt> {
    let tx_hash = B256::from_str(args.tx.trim())
        .with_context(|| format!("'{}' is not a transaction hash", args.tx))?;
    let receipt = ledger
        .transaction_receipt(tx_hash)
        .await?
        .with_context(|| format!("transaction {tx_hash} is unknown or not yet mined"))?;
    let event = resolve_uploaded(ledger, &receipt).await?;

    let fee_wei = event.fee_wei().ok();
    Ok(DecodedReceipt {
        transaction_hash: event.transaction_hash.to_string(),
        block_number: event.block_number,
        contract_id: event.contract_id,
        user: event.user.to_string(),
        organization: event.organization.to_string(),
        ipfs_hash: event.ipfs_hash,
        fee_wei: event.fee.to_string(),
        fee_eth: fee_wei.map(format_eth),
        fee_is_canonical: fee_wei == Some(CANONICAL_FEE_WEI),
    })
}
