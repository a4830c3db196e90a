//! Chain module - handles the L2 node connection
//!
//! This module provides:
//! - LCD queries for account state and balances, and transaction broadcast
//! - A polled height feed tracking the latest observed block
//! - The invalid-block probe checked before a monitor starts

pub mod client;
pub mod feed;
pub mod probe;

pub use client::LcdClient;
pub use feed::{HeightFeed, RpcHeightFeed};
pub use probe::{HaltProbe, HttpHaltProbe};

#[cfg(test)]
pub use feed::MockHeightFeed;
#[cfg(test)]
pub use probe::MockHaltProbe;

use crate::error::BotResult;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Account number and sequence as reported by the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Outcome of a broadcast accepted by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub tx_hash: String,
    pub height: u64,
    pub code: u32,
    pub raw_log: String,
}

/// Query and broadcast surface of the chain consumed by wallets
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account number and current sequence for `address`
    async fn account_info(&self, address: &str) -> BotResult<AccountInfo>;

    /// Balance of `denom` held by `address`, `None` if the node reports no balance entry
    async fn balance(&self, address: &str, denom: &str) -> BotResult<Option<u128>>;

    /// Broadcast signed transaction bytes
    async fn broadcast(&self, tx_bytes: Vec<u8>) -> BotResult<BroadcastResult>;

    /// Chain id used in sign docs
    fn chain_id(&self) -> String;
}
