//! Main watcher loop
//!
//! Polls the chain head, fetches each new block in order, classifies native
//! and ERC20 transfers touching the tracked addresses, and pushes them onto
//! the bounded transfer queue. A full queue blocks the loop, deliberately
//! coupling scan throughput to notification throughput.

use crate::erc20;
use crate::registry::TokenRegistry;
use crate::rpc::RpcClient;
use crate::token::Token;
use crate::transfer::{Direction, Transfer};
use crate::types::{Block, Log};
use alloy_primitives::Address;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Transfer queue capacity. Small by design: a slow notifier applies
/// backpressure to the scan loop instead of buffering unboundedly.
pub const TRANSFER_QUEUE_CAPACITY: usize = 32;

/// How often to poll for a new chain head.
const POLL_INTERVAL: Duration = Duration::from_secs(12);

/// Watches new blocks and emits transfers touching tracked addresses.
pub struct Watcher {
    rpc: Arc<RpcClient>,
    registry: TokenRegistry,
    tracked: HashSet<Address>,
    tx: mpsc::Sender<Transfer>,
}

impl Watcher {
    pub fn new(
        rpc: Arc<RpcClient>,
        registry: TokenRegistry,
        tracked: HashSet<Address>,
        tx: mpsc::Sender<Transfer>,
    ) -> Self {
        Self {
            rpc,
            registry,
            tracked,
            tx,
        }
    }

    /// Run the watch loop until cancelled or the queue consumer goes away.
    ///
    /// Blocks are processed strictly in increasing height. A block that
    /// fails to fetch or scan is skipped, not retried.
    pub async fn run(mut self) -> Result<()> {
        let mut last_seen = self.rpc.get_block_number("latest").await?;
        info!("Watching for transfers from block {}", last_seen);

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let head = match self.rpc.get_block_number("latest").await {
                Ok(head) => head,
                Err(e) => {
                    warn!("Failed to poll chain head: {:#}", e);
                    continue;
                }
            };

            while last_seen < head {
                last_seen += 1;
                if let Err(e) = self.process_block(last_seen).await {
                    if self.tx.is_closed() {
                        return Err(e);
                    }
                    warn!("Skipping block {}: {:#}", last_seen, e);
                }
            }
        }
    }

    /// Scan one block for native and ERC20 transfers and enqueue them.
    async fn process_block(&mut self, number: u64) -> Result<()> {
        let block = self.rpc.get_block_by_number(number).await?;
        debug!(
            "Processing block {} ({} transactions)",
            number,
            block.transactions.len()
        );

        let mut transfers = native_transfers(&block, &self.tracked);

        let logs = self.rpc.get_transfer_logs(number).await?;
        transfers.extend(erc20_transfers(&logs, &mut self.registry, &self.tracked).await);

        for transfer in transfers {
            self.tx
                .send(transfer)
                .await
                .map_err(|_| anyhow::anyhow!("transfer queue closed"))?;
        }

        Ok(())
    }
}

/// Extract native coin transfers touching tracked addresses, in
/// transaction order. A transaction with both ends tracked yields one
/// Sent and one Received event; zero-value transactions are ignored.
fn native_transfers(block: &Block, tracked: &HashSet<Address>) -> Vec<Transfer> {
    let mut transfers = Vec::new();

    for tx in &block.transactions {
        // Contract creations carry no recipient
        let to = match tx.to {
            Some(to) => to,
            None => continue,
        };
        if tx.value.is_zero() {
            continue;
        }

        if tracked.contains(&tx.from) {
            transfers.push(Transfer {
                direction: Direction::Sent,
                from: tx.from,
                to,
                value: tx.value,
                token: Token::eth(),
            });
        }
        if tracked.contains(&to) {
            transfers.push(Transfer {
                direction: Direction::Received,
                from: tx.from,
                to,
                value: tx.value,
                token: Token::eth(),
            });
        }
    }

    transfers
}

/// Extract ERC20 transfers touching tracked addresses from one block's
/// Transfer logs, in log order. Logs from contracts the registry rejects
/// and logs that fail to decode are skipped individually.
async fn erc20_transfers(
    logs: &[Log],
    registry: &mut TokenRegistry,
    tracked: &HashSet<Address>,
) -> Vec<Transfer> {
    let mut transfers = Vec::new();

    for log in logs {
        if !erc20::is_transfer_log(log) {
            continue;
        }

        let token = match registry.get_token(log.address).await {
            Ok(token) => token,
            Err(e) => {
                debug!("Skipping log for non-ERC20 contract: {:#}", e);
                continue;
            }
        };

        let (from, to, value) = match erc20::parse_transfer_log(log) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Failed to decode Transfer log: {:#}", e);
                continue;
            }
        };

        if tracked.contains(&from) {
            transfers.push(Transfer {
                direction: Direction::Sent,
                from,
                to,
                value,
                token: token.clone(),
            });
        }
        if tracked.contains(&to) {
            transfers.push(Transfer {
                direction: Direction::Received,
                from,
                to,
                value,
                token,
            });
        }
    }

    transfers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{addr, MockChain};
    use crate::store::TokenStore;
    use crate::types::Transaction;
    use alloy_primitives::{B256, U256};
    use tempfile::TempDir;

    fn tx(from: Address, to: Option<Address>, value: u64) -> Transaction {
        Transaction {
            hash: B256::ZERO,
            from,
            to,
            value: U256::from(value),
        }
    }

    fn tracked(addrs: &[Address]) -> HashSet<Address> {
        addrs.iter().copied().collect()
    }

    const ONE_ETH: u64 = 1_000_000_000_000_000_000;

    #[test]
    fn test_native_sent_to_untracked() {
        let block = Block {
            number: 1,
            transactions: vec![tx(addr(0xaa), Some(addr(0xbb)), ONE_ETH)],
        };
        let transfers = native_transfers(&block, &tracked(&[addr(0xaa)]));

        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].direction, Direction::Sent);
        assert_eq!(transfers[0].from, addr(0xaa));
        assert_eq!(transfers[0].to, addr(0xbb));
        assert_eq!(transfers[0].value, U256::from(ONE_ETH));
        assert!(transfers[0].token.is_eth());
    }

    #[test]
    fn test_native_both_tracked_yields_two() {
        let block = Block {
            number: 1,
            transactions: vec![tx(addr(0xaa), Some(addr(0xbb)), ONE_ETH)],
        };
        let transfers = native_transfers(&block, &tracked(&[addr(0xaa), addr(0xbb)]));

        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].direction, Direction::Sent);
        assert_eq!(transfers[1].direction, Direction::Received);
    }

    #[test]
    fn test_native_zero_value_ignored() {
        let block = Block {
            number: 1,
            transactions: vec![tx(addr(0xaa), Some(addr(0xbb)), 0)],
        };
        assert!(native_transfers(&block, &tracked(&[addr(0xaa)])).is_empty());
    }

    #[test]
    fn test_native_contract_creation_ignored() {
        let block = Block {
            number: 1,
            transactions: vec![tx(addr(0xaa), None, ONE_ETH)],
        };
        assert!(native_transfers(&block, &tracked(&[addr(0xaa)])).is_empty());
    }

    #[test]
    fn test_native_untracked_ignored() {
        let block = Block {
            number: 1,
            transactions: vec![tx(addr(0xdd), Some(addr(0xee)), ONE_ETH)],
        };
        assert!(native_transfers(&block, &tracked(&[addr(0xaa)])).is_empty());
    }

    fn transfer_log(contract: Address, from: Address, to: Address, value: u64) -> Log {
        let mut data = vec![0u8; 32];
        data[24..32].copy_from_slice(&value.to_be_bytes());
        Log {
            address: contract,
            topics: vec![
                erc20::TRANSFER_TOPIC_HEX.to_string(),
                format!("0x000000000000000000000000{}", hex::encode(from)),
                format!("0x000000000000000000000000{}", hex::encode(to)),
            ],
            data,
        }
    }

    fn registry(chain: MockChain) -> TokenRegistry {
        // Leak the TempDir so the store outlives the test body
        let dir = Box::leak(Box::new(TempDir::new().unwrap()));
        let store = TokenStore::open(dir.path()).unwrap();
        TokenRegistry::new(Arc::new(chain), store)
    }

    #[tokio::test]
    async fn test_erc20_received_by_tracked() {
        let mut registry = registry(MockChain::new().with_token(addr(0x11), "USDX", 6));
        let logs = vec![transfer_log(addr(0x11), addr(0xdd), addr(0xcc), 2_500_000)];

        let transfers = erc20_transfers(&logs, &mut registry, &tracked(&[addr(0xcc)])).await;

        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].direction, Direction::Received);
        assert_eq!(transfers[0].from, addr(0xdd));
        assert_eq!(transfers[0].to, addr(0xcc));
        assert_eq!(transfers[0].value, U256::from(2_500_000u64));
        assert_eq!(transfers[0].token.symbol, "USDX");
        assert_eq!(
            transfers[0].token.render_value(transfers[0].value),
            "2.5 USDX"
        );
    }

    #[tokio::test]
    async fn test_erc20_both_tracked_yields_two() {
        let mut registry = registry(MockChain::new().with_token(addr(0x11), "USDX", 6));
        let logs = vec![transfer_log(addr(0x11), addr(0xcc), addr(0xdd), 100)];

        let transfers =
            erc20_transfers(&logs, &mut registry, &tracked(&[addr(0xcc), addr(0xdd)])).await;

        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].direction, Direction::Sent);
        assert_eq!(transfers[1].direction, Direction::Received);
    }

    #[tokio::test]
    async fn test_erc20_non_token_contract_skipped_and_remembered() {
        // No tokens configured: every probe fails
        let mut registry = registry(MockChain::new());
        let logs = vec![
            transfer_log(addr(0x66), addr(0xdd), addr(0xcc), 100),
            transfer_log(addr(0x66), addr(0xdd), addr(0xcc), 200),
        ];

        let transfers = erc20_transfers(&logs, &mut registry, &tracked(&[addr(0xcc)])).await;
        assert!(transfers.is_empty());

        // The rejected contract must answer from the negative cache now
        let err = registry.get_token(addr(0x66)).await.unwrap_err();
        assert!(err
            .downcast_ref::<crate::registry::NotAToken>()
            .is_some());
    }

    #[tokio::test]
    async fn test_erc20_ineligible_log_skipped() {
        let mut registry = registry(MockChain::new().with_token(addr(0x11), "USDX", 6));
        // Only two topics: missing an indexed address
        let logs = vec![Log {
            address: addr(0x11),
            topics: vec![
                erc20::TRANSFER_TOPIC_HEX.to_string(),
                format!("0x000000000000000000000000{}", hex::encode(addr(0xcc))),
            ],
            data: vec![0u8; 32],
        }];

        let transfers = erc20_transfers(&logs, &mut registry, &tracked(&[addr(0xcc)])).await;
        assert!(transfers.is_empty());
    }

    #[tokio::test]
    async fn test_erc20_untracked_ignored() {
        let mut registry = registry(MockChain::new().with_token(addr(0x11), "USDX", 6));
        let logs = vec![transfer_log(addr(0x11), addr(0xdd), addr(0xee), 100)];

        let transfers = erc20_transfers(&logs, &mut registry, &tracked(&[addr(0xcc)])).await;
        assert!(transfers.is_empty());
    }
}
