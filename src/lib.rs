//! ethwatch - Ethereum transfer notification pipeline
//!
//! Watches a chain for native coin and ERC20 token transfers touching a
//! configured set of addresses, resolves token metadata through a tiered
//! cache, and turns matching transfers into human-readable notifications
//! delivered over Telegram.

pub mod accounts;
pub mod balances;
pub mod config;
pub mod dispatcher;
pub mod erc20;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod telegram;
pub mod token;
pub mod transfer;
pub mod types;
pub mod watcher;

// Re-export the main types for convenience
pub use accounts::AddressBook;
pub use balances::{BalanceErrors, Balances};
pub use config::Config;
pub use registry::{ChainReader, NotAToken, TokenRegistry};
pub use rpc::RpcClient;
pub use store::TokenStore;
pub use telegram::{NoopNotifier, Notifier, SubscriptionState, TelegramBot};
pub use token::Token;
pub use transfer::{Direction, Transfer};
pub use watcher::{Watcher, TRANSFER_QUEUE_CAPACITY};
