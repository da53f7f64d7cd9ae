//! Configuration loading
//!
//! Loads the JSON configuration file: provider endpoint, tracked accounts
//! with optional aliases, token contracts to resolve proactively, and
//! optional Telegram credentials. Missing mandatory fields are a fatal
//! startup error.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// One tracked account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub address: Address,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Telegram bot credentials. Absent section selects the no-op notifier.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    /// If set, commands from any other username are ignored.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "eth-url")]
    pub eth_url: String,

    pub accounts: Vec<AccountConfig>,

    /// Token contracts to resolve at startup (may be empty).
    #[serde(default)]
    pub tokens: Vec<Address>,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;

        if config.eth_url.is_empty() {
            anyhow::bail!("Config is missing eth-url");
        }
        if config.accounts.is_empty() {
            anyhow::bail!("Config is missing accounts");
        }

        Ok(config)
    }
}
