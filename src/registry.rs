//! Token registry
//!
//! Tiered cache resolving a contract address to token metadata: in-memory
//! map first, then the persistent store, then `symbol()`/`decimals()` calls
//! on the contract itself. Contracts that fail the probe are remembered as
//! non-tokens for the rest of the run, but never persisted, so a restart
//! re-probes them exactly once.
//!
//! The registry is owned by the watcher and mutated only through `&mut self`,
//! which makes the single-caller rule a compile-time property instead of a
//! convention.

use crate::store::TokenStore;
use crate::token::Token;
use alloy_primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only chain access the registry and balance code need.
///
/// Implemented by the RPC client; tests substitute a mock.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Call symbol() on a contract.
    async fn token_symbol(&self, token: Address) -> Result<String>;

    /// Call decimals() on a contract.
    async fn token_decimals(&self, token: Address) -> Result<u8>;

    /// Call balanceOf(owner) on a token contract.
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    /// Native coin balance including pending transactions.
    async fn pending_balance(&self, owner: Address) -> Result<U256>;
}

/// Typed "not a token" condition, carried inside `anyhow::Error` so callers
/// can downcast when they need to distinguish it from transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotAToken(pub Address);

impl fmt::Display for NotAToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x} is not an ERC20 token", self.0)
    }
}

impl std::error::Error for NotAToken {}

/// In-memory resolution result. Absent entries have not been probed yet.
enum CacheEntry {
    /// Probed and rejected; lives only in memory.
    NonToken,
    Known(Arc<Token>),
}

/// Tiered token metadata cache.
pub struct TokenRegistry {
    chain: Arc<dyn ChainReader>,
    store: TokenStore,
    tokens: HashMap<Address, CacheEntry>,
}

impl TokenRegistry {
    pub fn new(chain: Arc<dyn ChainReader>, store: TokenStore) -> Self {
        let mut tokens = HashMap::new();
        // ETH is preloaded so the zero address is never probed on-chain.
        let eth = Token::eth();
        tokens.insert(eth.address, CacheEntry::Known(eth));

        Self {
            chain,
            store,
            tokens,
        }
    }

    /// Resolve a contract address to its token metadata.
    ///
    /// At most one on-chain probe per contract per process lifetime: both
    /// positive and negative results are memoized, and positive results are
    /// persisted across restarts.
    pub async fn get_token(&mut self, contract: Address) -> Result<Arc<Token>> {
        if let Some(entry) = self.tokens.get(&contract) {
            return match entry {
                CacheEntry::Known(token) => Ok(token.clone()),
                CacheEntry::NonToken => Err(NotAToken(contract).into()),
            };
        }

        if let Some(token) = self.store.get_token(contract)? {
            debug!("Token store hit: {} for 0x{:x}", token.symbol, contract);
            let token = Arc::new(token);
            self.tokens
                .insert(contract, CacheEntry::Known(token.clone()));
            return Ok(token);
        }

        match self.probe(contract).await {
            Ok(token) => {
                info!("Detected new token: {} at 0x{:x}", token.symbol, contract);
                let token = Arc::new(token);
                self.store.put_token(&token)?;
                self.tokens
                    .insert(contract, CacheEntry::Known(token.clone()));
                Ok(token)
            }
            Err(e) => {
                debug!("Contract 0x{:x} rejected as non-token: {:#}", contract, e);
                self.tokens.insert(contract, CacheEntry::NonToken);
                Err(NotAToken(contract).into())
            }
        }
    }

    /// Probe a contract with symbol() and decimals() view calls.
    async fn probe(&self, contract: Address) -> Result<Token> {
        let symbol = self.chain.token_symbol(contract).await?;
        if symbol.is_empty() {
            anyhow::bail!("empty token symbol, ignoring as malformed token");
        }
        let decimals = self.chain.token_decimals(contract).await?;

        Ok(Token {
            address: contract,
            symbol,
            decimals,
        })
    }
}

/// Fetch the current balance of `owner` in `token` smallest units.
///
/// Errors are passed through untouched; callers decide whether a failed
/// refresh is fatal (it never is in the notification path).
pub async fn fetch_balance(
    chain: &dyn ChainReader,
    token: &Token,
    owner: Address,
) -> Result<U256> {
    if token.is_eth() {
        chain.pending_balance(owner).await
    } else {
        chain.token_balance(token.address, owner).await
    }
}
