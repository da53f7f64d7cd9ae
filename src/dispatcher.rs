//! Notification dispatcher
//!
//! Single consumer of the transfer queue. For each transfer it renders the
//! amount, resolves endpoint aliases, refreshes the affected endpoint's
//! balance best-effort, and pushes the composed message to the notifier.
//! A failed balance refresh degrades the message to "N/A"; it never drops
//! the notification.

use crate::accounts::AddressBook;
use crate::registry::{fetch_balance, ChainReader};
use crate::telegram::Notifier;
use crate::transfer::{Direction, Transfer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Compose the notification text for one transfer.
pub fn render_message(transfer: &Transfer, book: &AddressBook, balance: &str) -> String {
    let value = transfer.token.render_value(transfer.value);
    match transfer.direction {
        Direction::Sent => format!(
            "{} sent {} to {}, new balance: {}",
            book.lookup(transfer.from),
            value,
            book.lookup(transfer.to),
            balance
        ),
        Direction::Received => format!(
            "{} received {} from {}, new balance: {}",
            book.lookup(transfer.to),
            value,
            book.lookup(transfer.from),
            balance
        ),
    }
}

/// Consume transfers until the queue closes.
pub async fn run(
    mut rx: mpsc::Receiver<Transfer>,
    chain: Arc<dyn ChainReader>,
    book: AddressBook,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(transfer) = rx.recv().await {
        let endpoint = transfer.endpoint();

        let balance = match fetch_balance(chain.as_ref(), &transfer.token, endpoint).await {
            Ok(balance) => transfer.token.render_value(balance),
            Err(e) => {
                warn!(
                    "Failed to fetch balance for {}: {:#}",
                    transfer.token.symbol, e
                );
                "N/A".to_string()
            }
        };

        let message = render_message(&transfer, &book, &balance);
        info!("{}", message);
        notifier.notify(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountConfig;
    use crate::registry::tests::{addr, MockChain};
    use crate::token::Token;
    use alloy_primitives::{Address, U256};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn book() -> AddressBook {
        AddressBook::new(&[
            AccountConfig {
                address: addr(0xaa),
                alias: Some("A".to_string()),
            },
            AccountConfig {
                address: addr(0xcc),
                alias: Some("C".to_string()),
            },
        ])
    }

    fn usdx() -> Arc<Token> {
        Arc::new(Token {
            address: addr(0x11),
            symbol: "USDX".to_string(),
            decimals: 6,
        })
    }

    #[test]
    fn test_render_sent() {
        let transfer = Transfer {
            direction: Direction::Sent,
            from: addr(0xaa),
            to: addr(0xbb),
            value: U256::from(1_000_000_000_000_000_000u64),
            token: Token::eth(),
        };
        let message = render_message(&transfer, &book(), "2 ETH");
        assert_eq!(
            message,
            format!(
                "A sent 1 ETH to 0x{:x}, new balance: 2 ETH",
                addr(0xbb)
            )
        );
    }

    #[test]
    fn test_render_received() {
        let transfer = Transfer {
            direction: Direction::Received,
            from: addr(0xdd),
            to: addr(0xcc),
            value: U256::from(2_500_000u64),
            token: usdx(),
        };
        let message = render_message(&transfer, &book(), "10 USDX");
        assert_eq!(
            message,
            format!(
                "C received 2.5 USDX from 0x{:x}, new balance: 10 USDX",
                addr(0xdd)
            )
        );
    }

    #[tokio::test]
    async fn test_run_degrades_to_na_on_balance_failure() {
        // Mock chain with no balances configured: every refresh fails
        let chain: Arc<dyn ChainReader> = Arc::new(MockChain::new());
        let notifier = Arc::new(RecordingNotifier {
            messages: Mutex::new(Vec::new()),
        });

        let (tx, rx) = mpsc::channel(4);
        tx.send(Transfer {
            direction: Direction::Sent,
            from: addr(0xaa),
            to: addr(0xbb),
            value: U256::from(1_000_000_000_000_000_000u64),
            token: Token::eth(),
        })
        .await
        .unwrap();
        drop(tx);

        run(rx, chain, book(), notifier.clone()).await;

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with("new balance: N/A"));
        assert!(messages[0].starts_with("A sent 1 ETH to"));
    }

    #[tokio::test]
    async fn test_run_renders_refreshed_balance() {
        let mut mock = MockChain::new();
        mock.balances
            .insert((Address::ZERO, addr(0xaa)), U256::from(3_000_000_000_000_000_000u64));
        let chain: Arc<dyn ChainReader> = Arc::new(mock);
        let notifier = Arc::new(RecordingNotifier {
            messages: Mutex::new(Vec::new()),
        });

        let (tx, rx) = mpsc::channel(4);
        tx.send(Transfer {
            direction: Direction::Sent,
            from: addr(0xaa),
            to: addr(0xbb),
            value: U256::from(1_000_000_000_000_000_000u64),
            token: Token::eth(),
        })
        .await
        .unwrap();
        drop(tx);

        run(rx, chain, book(), notifier.clone()).await;

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with("new balance: 3 ETH"));
    }
}
