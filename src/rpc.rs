//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to Ethereum JSON-RPC endpoints.
//! Handles hex string parsing and error handling.

use crate::erc20;
use crate::registry::ChainReader;
use crate::types::{Block, Log};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send RPC request")?;

        let json: Value = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        // Extract result
        json.get("result")
            .cloned()
            .context("RPC response missing 'result' field")
    }

    /// Get the number of the block at the given tag ("latest", "pending", ...).
    pub async fn get_block_number(&self, block: &str) -> Result<u64> {
        let params = json!([block, false]);
        let result = self.call("eth_getBlockByNumber", params).await?;

        let number_str = result
            .get("number")
            .and_then(|v| v.as_str())
            .context("Block missing 'number' field")?;

        let number_str = number_str.strip_prefix("0x").unwrap_or(number_str);
        if number_str.is_empty() {
            anyhow::bail!("Block number is empty");
        }
        u64::from_str_radix(number_str, 16).context("Failed to parse block number")
    }

    /// Get a block by number with full transaction details.
    pub async fn get_block_by_number(&self, block: u64) -> Result<Block> {
        let params = json!([format!("0x{:x}", block), true]);
        let result = self.call("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            anyhow::bail!("Block {} not found", block);
        }
        serde_json::from_value(result).context("Failed to deserialize block")
    }

    /// Get ERC20 Transfer logs for exactly one block, in emission order.
    pub async fn get_transfer_logs(&self, block: u64) -> Result<Vec<Log>> {
        let block_str = format!("0x{:x}", block);
        let params = json!([{
            "fromBlock": block_str,
            "toBlock": block_str,
            "topics": [erc20::TRANSFER_TOPIC_HEX],
        }]);
        let result = self.call("eth_getLogs", params).await?;
        serde_json::from_value(result).context("Failed to deserialize logs")
    }

    /// Get the balance of an address at a specific block tag.
    pub async fn get_balance(&self, address: Address, block: &str) -> Result<U256> {
        let addr_str = format!("0x{:x}", address);
        let params = json!([addr_str, block]);
        let result = self.call("eth_getBalance", params).await?;

        let balance_str = result
            .as_str()
            .context("Balance response is not a string")?;

        let balance_str = balance_str.strip_prefix("0x").unwrap_or(balance_str);
        if balance_str.is_empty() {
            return Ok(U256::ZERO);
        }

        // Handle odd-length hex strings by padding with a leading zero
        let balance_str = if balance_str.len() % 2 == 1 {
            format!("0{}", balance_str)
        } else {
            balance_str.to_string()
        };

        let bytes = hex::decode(&balance_str).context("Failed to decode balance hex")?;
        Ok(U256::from_be_slice(&bytes))
    }

    /// Execute a read-only contract call against the latest state.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let params = json!([{
            "to": format!("0x{:x}", to),
            "data": format!("0x{}", hex::encode(data)),
        }, "latest"]);
        let result = self.call("eth_call", params).await?;

        let data_str = result.as_str().context("Call response is not a string")?;
        let data_str = data_str.strip_prefix("0x").unwrap_or(data_str);
        if data_str.is_empty() {
            return Ok(Vec::new());
        }
        hex::decode(data_str).context("Failed to decode call result hex")
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn token_symbol(&self, token: Address) -> Result<String> {
        let data = self.eth_call(token, &erc20::symbol_calldata()).await?;
        erc20::decode_string(&data).context("Failed to decode symbol()")
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let data = self.eth_call(token, &erc20::decimals_calldata()).await?;
        erc20::decode_u8(&data).context("Failed to decode decimals()")
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let data = self
            .eth_call(token, &erc20::balance_of_calldata(owner))
            .await?;
        erc20::decode_uint(&data).context("Failed to decode balanceOf()")
    }

    async fn pending_balance(&self, owner: Address) -> Result<U256> {
        self.get_balance(owner, "pending").await
    }
}
