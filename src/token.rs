//! Token model and amount rendering
//!
//! A token is a contract address plus display metadata (symbol, decimals).
//! ETH is modeled as a pseudo-token with the zero address so transfers and
//! balances go through one code path.

use alloy_primitives::{Address, U256};
use std::sync::{Arc, OnceLock};

/// Fungible token metadata. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Contract address (Address::ZERO for the native coin)
    pub address: Address,
    /// Display symbol, e.g. "USDX"
    pub symbol: String,
    /// Number of decimals the raw integer balance is scaled by
    pub decimals: u8,
}

static ETH_TOKEN: OnceLock<Arc<Token>> = OnceLock::new();

impl Token {
    /// The native coin as a pseudo-token. The zero address is reserved for it
    /// and is never probed on-chain.
    pub fn eth() -> Arc<Token> {
        ETH_TOKEN
            .get_or_init(|| {
                Arc::new(Token {
                    address: Address::ZERO,
                    symbol: "ETH".to_string(),
                    decimals: 18,
                })
            })
            .clone()
    }

    /// Whether this is the native coin.
    pub fn is_eth(&self) -> bool {
        self.address == Address::ZERO
    }

    /// Render a raw smallest-unit value as "<amount> <symbol>".
    pub fn render_value(&self, value: U256) -> String {
        format!("{} {}", render_amount(value, self.decimals), self.symbol)
    }
}

/// Render a raw integer amount scaled by 10^decimals as an exact decimal
/// string. Integer division and remainder, never floating point; trailing
/// zeros in the fraction are trimmed.
pub fn render_amount(value: U256, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / scale;
    let frac = value % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
