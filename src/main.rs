//! Ethereum transfer watcher binary
//!
//! Loads the configuration, wires the pipeline together, reports starting
//! balances, and runs the watch loop until Ctrl+C.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use ethwatch::balances::Balances;
use ethwatch::config::Config;
use ethwatch::registry::{ChainReader, TokenRegistry};
use ethwatch::rpc::RpcClient;
use ethwatch::store::TokenStore;
use ethwatch::telegram::{NoopNotifier, Notifier, TelegramBot};
use ethwatch::token::Token;
use ethwatch::watcher::{Watcher, TRANSFER_QUEUE_CAPACITY};
use ethwatch::{dispatcher, AddressBook};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ethereum transfer watcher
#[derive(Parser)]
#[command(name = "ethwatch")]
#[command(about = "Watch tracked addresses for transfers and push notifications")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the RocksDB token metadata directory
    #[arg(short, long, default_value = "./tokens_db")]
    db_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting Ethereum transfer watcher");

    let config = Config::load(&args.config)?;
    info!("Watching {} accounts on {}", config.accounts.len(), config.eth_url);

    let book = AddressBook::new(&config.accounts);
    let tracked = book.tracked();

    let rpc = Arc::new(RpcClient::new(config.eth_url.clone()));

    let store = TokenStore::open(&args.db_path)
        .with_context(|| format!("Failed to open token store at {:?}", args.db_path))?;
    let mut registry = TokenRegistry::new(rpc.clone(), store);

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => {
            let bot = Arc::new(TelegramBot::new(&telegram.token, telegram.username.clone()));
            tokio::spawn(bot.clone().run_updates_loop());
            info!("Telegram bot started, waiting for /subscribe");
            bot
        }
        None => {
            info!("Telegram is not configured, notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    // Resolve configured token contracts up front so the first matching
    // block does not pay the probe latency.
    let mut tokens = Vec::new();
    for contract in &config.tokens {
        match registry.get_token(*contract).await {
            Ok(token) => tokens.push(token),
            Err(e) => warn!("Failed to resolve configured token 0x{:x}: {:#}", contract, e),
        }
    }

    // Starting balance report for every tracked account
    for account in &config.accounts {
        let balances = Balances::new(account.address);
        if let Err(e) = balances.update(rpc.as_ref(), &tokens).await {
            warn!(
                "Balance report for {} is incomplete: {}",
                book.lookup(account.address),
                e
            );
        }

        info!("ADDRESS: {}", book.lookup(account.address));
        match balances.get_balance(Address::ZERO).await {
            Some(wei) => info!("- balance: {}", Token::eth().render_value(wei)),
            None => info!("- balance: unknown"),
        }
        for token in &tokens {
            match balances.get_balance(token.address).await {
                Some(raw) => info!("- balance: {}", token.render_value(raw)),
                None => info!("- balance: unknown {}", token.symbol),
            }
        }
    }

    let (tx, rx) = mpsc::channel(TRANSFER_QUEUE_CAPACITY);

    let chain: Arc<dyn ChainReader> = rpc.clone();
    let _dispatcher = tokio::spawn(dispatcher::run(rx, chain, book.clone(), notifier));

    let watcher = Watcher::new(rpc, registry, tracked, tx);

    // Transfers still queued at shutdown are dropped, best effort
    tokio::select! {
        result = watcher.run() => {
            result.context("Watcher error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    info!("Watcher stopped");
    Ok(())
}
