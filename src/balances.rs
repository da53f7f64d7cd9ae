//! Balance aggregation
//!
//! Queries the native balance and every tracked token balance of one owner
//! concurrently, joining on all of them before returning. A failing query
//! never suppresses the others; failures come back as a structured
//! aggregate alongside the partial snapshot.

use crate::registry::{fetch_balance, ChainReader};
use crate::token::Token;
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-query failures from one `update` call, keyed by token address.
#[derive(Debug)]
pub struct BalanceErrors {
    failures: Vec<(Address, anyhow::Error)>,
}

impl BalanceErrors {
    pub fn failures(&self) -> &[(Address, anyhow::Error)] {
        &self.failures
    }
}

impl fmt::Display for BalanceErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} balance queries failed:", self.failures.len())?;
        for (addr, err) in &self.failures {
            write!(f, " 0x{:x}: {:#};", addr, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BalanceErrors {}

/// Balance snapshot for one owner address, rebuilt on each `update`.
pub struct Balances {
    owner: Address,
    balances: RwLock<HashMap<Address, U256>>,
}

impl Balances {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            balances: RwLock::new(HashMap::new()),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Refresh the native balance plus one balance per token, concurrently.
    ///
    /// Returns only after every launched query has finished. Successful
    /// results land in the snapshot even when sibling queries fail; the
    /// error lists exactly the queries that failed.
    pub async fn update(
        &self,
        chain: &dyn ChainReader,
        tokens: &[Arc<Token>],
    ) -> Result<(), BalanceErrors> {
        let mut all: Vec<Arc<Token>> = Vec::with_capacity(tokens.len() + 1);
        all.push(Token::eth());
        all.extend(tokens.iter().cloned());

        let queries = all.iter().map(|token| {
            let token = token.clone();
            async move {
                match fetch_balance(chain, &token, self.owner).await {
                    Ok(balance) => {
                        // Lock guards only the write, not the query
                        self.balances.write().await.insert(token.address, balance);
                        None
                    }
                    Err(e) => Some((token.address, e)),
                }
            }
        });

        let failures: Vec<(Address, anyhow::Error)> =
            join_all(queries).await.into_iter().flatten().collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BalanceErrors { failures })
        }
    }

    /// Read a balance from the snapshot. None for addresses never queried
    /// (or whose every query so far has failed).
    pub async fn get_balance(&self, token_address: Address) -> Option<U256> {
        self.balances.read().await.get(&token_address).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{addr, MockChain};

    fn token(address: Address, symbol: &str, decimals: u8) -> Arc<Token> {
        Arc::new(Token {
            address,
            symbol: symbol.to_string(),
            decimals,
        })
    }

    #[tokio::test]
    async fn test_update_all_succeed() {
        let mut chain = MockChain::new();
        chain
            .balances
            .insert((Address::ZERO, addr(0xaa)), U256::from(5u64));
        chain
            .balances
            .insert((addr(0x11), addr(0xaa)), U256::from(100u64));

        let balances = Balances::new(addr(0xaa));
        balances
            .update(&chain, &[token(addr(0x11), "USDX", 6)])
            .await
            .unwrap();

        assert_eq!(
            balances.get_balance(Address::ZERO).await,
            Some(U256::from(5u64))
        );
        assert_eq!(
            balances.get_balance(addr(0x11)).await,
            Some(U256::from(100u64))
        );
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let mut chain = MockChain::new();
        chain
            .balances
            .insert((Address::ZERO, addr(0xaa)), U256::from(5u64));
        chain
            .balances
            .insert((addr(0x11), addr(0xaa)), U256::from(100u64));
        chain.failing.insert(addr(0x22));

        let balances = Balances::new(addr(0xaa));
        let err = balances
            .update(
                &chain,
                &[token(addr(0x11), "USDX", 6), token(addr(0x22), "BAD", 18)],
            )
            .await
            .unwrap_err();

        // The error reflects exactly the failed queries
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].0, addr(0x22));

        // Successful siblings are still in the snapshot
        assert_eq!(
            balances.get_balance(Address::ZERO).await,
            Some(U256::from(5u64))
        );
        assert_eq!(
            balances.get_balance(addr(0x11)).await,
            Some(U256::from(100u64))
        );
        assert_eq!(balances.get_balance(addr(0x22)).await, None);
    }

    #[tokio::test]
    async fn test_get_balance_unknown() {
        let balances = Balances::new(addr(0xaa));
        assert_eq!(balances.get_balance(addr(0x99)).await, None);
    }
}
