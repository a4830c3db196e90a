//! LCD / Tendermint RPC client for account queries and transaction broadcast

use super::{AccountInfo, BroadcastResult, ChainClient};
use crate::config::ChainConfig;
use crate::error::{BotError, BotResult};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const INCLUSION_TIMEOUT: Duration = Duration::from_secs(30);
const INCLUSION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// HTTP client over the node's LCD (REST) and Tendermint RPC endpoints
pub struct LcdClient {
    config: ChainConfig,
    http: reqwest::Client,
}

impl LcdClient {
    /// Create a new client for the configured chain
    pub fn new(config: ChainConfig) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { config, http })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> BotResult<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::ChainQuery {
                endpoint: url.to_string(),
                message: format!("status {}: {}", status, body),
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// Poll `/tx` until the transaction is included or the wait times out
    async fn wait_for_inclusion(&self, tx_hash: &str) -> BotResult<BroadcastResult> {
        let url = format!("{}/tx?hash=0x{}", self.config.rpc_url, tx_hash);
        let deadline = Instant::now() + INCLUSION_TIMEOUT;

        loop {
            match self.get_json::<Value>(&url).await {
                Ok(body) if body.get("result").is_some() => {
                    let result = &body["result"];
                    return Ok(BroadcastResult {
                        tx_hash: tx_hash.to_string(),
                        height: parse_u64(&result["height"]).unwrap_or_default(),
                        code: parse_code(&result["tx_result"]["code"], &url)?,
                        raw_log: result["tx_result"]["log"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
                Ok(_) => debug!("Transaction {} not yet included", tx_hash),
                Err(e) => debug!("Transaction {} lookup failed: {}", tx_hash, e),
            }

            if Instant::now() >= deadline {
                warn!("Timed out waiting for transaction {} inclusion", tx_hash);
                return Err(BotError::ChainQuery {
                    endpoint: url,
                    message: "timed out waiting for transaction inclusion".to_string(),
                });
            }
            sleep(INCLUSION_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl ChainClient for LcdClient {
    async fn account_info(&self, address: &str) -> BotResult<AccountInfo> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/accounts/{}",
            self.config.lcd_url, address
        );
        let body: Value = self.get_json(&url).await?;
        parse_account(&body).ok_or_else(|| BotError::ChainQuery {
            endpoint: url,
            message: "missing account_number or sequence".to_string(),
        })
    }

    async fn balance(&self, address: &str, denom: &str) -> BotResult<Option<u128>> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            self.config.lcd_url, address, denom
        );
        let body: Value = self.get_json(&url).await?;
        Ok(body["balance"]["amount"]
            .as_str()
            .and_then(|amount| amount.parse::<u128>().ok()))
    }

    async fn broadcast(&self, tx_bytes: Vec<u8>) -> BotResult<BroadcastResult> {
        let url = format!(
            "{}/broadcast_tx_sync?tx=0x{}",
            self.config.rpc_url,
            hex::encode(&tx_bytes)
        );
        let body: Value = self.get_json(&url).await?;

        if let Some(error) = body.get("error") {
            return Err(BotError::ChainQuery {
                endpoint: "broadcast_tx_sync".to_string(),
                message: error.to_string(),
            });
        }

        let result = &body["result"];
        let tx_hash = result["hash"].as_str().unwrap_or_default().to_string();
        let code = parse_code(&result["code"], "broadcast_tx_sync")?;
        if code != 0 {
            return Err(BotError::BroadcastRejected {
                tx_hash,
                code,
                raw_log: result["log"].as_str().unwrap_or_default().to_string(),
            });
        }

        let included = self.wait_for_inclusion(&tx_hash).await?;
        if included.code != 0 {
            return Err(BotError::BroadcastRejected {
                tx_hash: included.tx_hash,
                code: included.code,
                raw_log: included.raw_log,
            });
        }
        Ok(included)
    }

    fn chain_id(&self) -> String {
        self.config.chain_id.clone()
    }
}

/// Extract account number and sequence, unwrapping vesting/module account nesting
fn parse_account(body: &Value) -> Option<AccountInfo> {
    let mut account = &body["account"];
    if account.get("account_number").is_none() {
        account = &account["base_account"];
    }

    Some(AccountInfo {
        account_number: parse_u64(&account["account_number"])?,
        // A fresh account may omit its sequence
        sequence: parse_u64(&account["sequence"]).unwrap_or(0),
    })
}

/// ABCI result code; a missing or out-of-range code is a malformed response
fn parse_code(value: &Value, endpoint: &str) -> BotResult<u32> {
    parse_u64(value)
        .and_then(|code| u32::try_from(code).ok())
        .ok_or_else(|| BotError::ChainQuery {
            endpoint: endpoint.to_string(),
            message: format!("missing or invalid result code: {}", value),
        })
}

/// Cosmos REST encodes 64-bit integers as decimal strings
fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
