//! Ledger adapter configuration.
//!
//! Read from the environment at startup. The signing key is optional: a
//! ledger without one can still read receipts and events (enough to verify
//! payments) but cannot submit transactions.

use alloy::primitives::Address;
use url::Url;
use zeroize::Zeroizing;

/// Hardhat's default chain id.
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Blocks searched on either side of a receipt's block when its inline
/// logs do not decode.
pub const DEFAULT_LOG_WINDOW: u64 = 5;

/// Connection settings for the credential contract.
///
/// Custom `Debug` redacts the private key.
#[derive(Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Deployed `CertificatePayment` address.
    pub contract_address: Address,
    /// Hex-encoded secp256k1 key for signing transactions.
    pub private_key: Option<Zeroizing<String>>,
    /// Expected chain id. Checked against the node on connect.
    pub chain_id: u64,
    /// Fallback event-filter window, in blocks.
    pub log_window: u64,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("contract_address", &self.contract_address)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("chain_id", &self.chain_id)
            .field("log_window", &self.log_window)
            .finish()
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `LEDGER_RPC_URL` (required)
    /// - `LEDGER_CONTRACT_ADDRESS` (required)
    /// - `LEDGER_PRIVATE_KEY` (optional; read-only without it)
    /// - `LEDGER_CHAIN_ID` (default: 31337)
    /// - `LEDGER_LOG_WINDOW` (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = std::env::var("LEDGER_RPC_URL")
            .map_err(|_| ConfigError::Missing("LEDGER_RPC_URL"))?;
        let rpc_url = Url::parse(&rpc_url)
            .map_err(|e| ConfigError::InvalidUrl("LEDGER_RPC_URL".into(), e.to_string()))?;

        let contract_address = std::env::var("LEDGER_CONTRACT_ADDRESS")
            .map_err(|_| ConfigError::Missing("LEDGER_CONTRACT_ADDRESS"))?;
        let contract_address = parse_address("LEDGER_CONTRACT_ADDRESS", &contract_address)?;

        let private_key = std::env::var("LEDGER_PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(Zeroizing::new);

        Ok(Self {
            rpc_url,
            contract_address,
            private_key,
            chain_id: env_u64("LEDGER_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            log_window: env_u64("LEDGER_LOG_WINDOW", DEFAULT_LOG_WINDOW)?,
        })
    }

    /// Configuration for a local Hardhat node.
    pub fn local(contract_address: Address, private_key: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            rpc_url: Url::parse("http://127.0.0.1:8545")
                .map_err(|e| ConfigError::InvalidUrl("localhost".into(), e.to_string()))?,
            contract_address,
            private_key: private_key.map(|k| Zeroizing::new(k.to_string())),
            chain_id: DEFAULT_CHAIN_ID,
            log_window: DEFAULT_LOG_WINDOW,
        })
    }
}

fn parse_address(var: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| ConfigError::InvalidAddress(var.to_string(), e.to_string()))
}

fn env_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid address for {0}: {1}")]
    InvalidAddress(String, String),
    #[error("{0} must be an unsigned integer, got \"{1}\"")]
    InvalidNumber(&'static str, String),
}
