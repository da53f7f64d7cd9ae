//! Persistent token store
//!
//! RocksDB-backed cache of resolved token metadata, so a restart does not
//! re-probe every contract. Keys are the raw 20-byte contract address;
//! values are postcard-serialized records. Only positive results are ever
//! written here.

use crate::token::Token;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use rocksdb::{Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Stored token metadata. The address is the key, so only the display
/// fields are serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TokenRecord {
    symbol: String,
    decimals: u8,
}

/// RocksDB-backed token metadata store.
pub struct TokenStore {
    db: DB,
}

impl TokenStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).context("Failed to open token store")?;
        Ok(Self { db })
    }

    /// Persist a resolved token.
    pub fn put_token(&self, token: &Token) -> Result<()> {
        let record = TokenRecord {
            symbol: token.symbol.clone(),
            decimals: token.decimals,
        };
        let value = postcard::to_allocvec(&record).context("Failed to serialize token record")?;
        self.db
            .put(token.address.as_slice(), value)
            .context("Failed to store token record")?;
        Ok(())
    }

    /// Look up a token by contract address. Returns None if it was never
    /// resolved in any previous run.
    pub fn get_token(&self, addr: Address) -> Result<Option<Token>> {
        let value = self
            .db
            .get(addr.as_slice())
            .context("Failed to read token record")?;

        match value {
            Some(bytes) => {
                let record: TokenRecord = postcard::from_bytes(&bytes)
                    .context("Failed to deserialize token record")?;
                Ok(Some(Token {
                    address: addr,
                    symbol: record.symbol,
                    decimals: record.decimals,
                }))
            }
            None => Ok(None),
        }
    }
}
