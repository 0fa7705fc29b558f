//! Protocol fee.
//!
//! Both credential kinds pay the same fee. The backend never accepts a fee
//! from the client; it compares the fee carried by the decoded on-chain
//! event against [`CANONICAL_FEE_WEI`].

use crate::error::ValidationError;

/// 0.001 ETH.
pub const CANONICAL_FEE_WEI: u128 = 1_000_000_000_000_000;

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Reject any fee other than the canonical one.
pub fn validate_fee(actual_wei: u128) -> Result<(), ValidationError> {
    if actual_wei != CANONICAL_FEE_WEI {
        return Err(ValidationError::FeeMismatch {
            expected: CANONICAL_FEE_WEI,
            actual: actual_wei,
        });
    }
    Ok(())
}

/// Render a wei amount as a decimal ETH string without trailing zeros.
pub fn format_eth(wei: u128) -> String {
    let whole = wei / WEI_PER_ETH;
    let frac = wei % WEI_PER_ETH;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:018}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
