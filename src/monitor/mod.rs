//! Per-role chain monitors
//!
//! A monitor advances a durable per-role height cursor in step with the chain:
//! 1. Loads (or creates) the role's sync state and starts its height feed
//! 2. Refuses to start when the node reports an invalid block
//! 3. Processes one height per iteration through the role's hooks
//! 4. Persists the height only after both hooks succeeded

pub mod engine;
pub mod role;

pub use engine::{ChainMonitor, MonitorHandle, MonitorState, Tick};
pub use role::RoleMonitor;

use crate::error::BotResult;
use crate::role::{DisplayColor, Role};
use crate::state::SyncStore;
use crate::tx::{TxWallet, WalletRegistry};

use async_trait::async_trait;
use std::sync::Arc;

/// Shared collaborators handed to monitor hooks
#[derive(Clone)]
pub struct MonitorContext {
    store: Arc<dyn SyncStore>,
    wallets: Arc<WalletRegistry>,
}

impl MonitorContext {
    pub fn new(store: Arc<dyn SyncStore>, wallets: Arc<WalletRegistry>) -> Self {
        Self { store, wallets }
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn wallet(&self, role: Role) -> BotResult<Arc<TxWallet>> {
        self.wallets.get(role)
    }

    /// Canonical L1 struct tag of an L2 denom
    pub async fn coin_struct_tag(&self, l2_denom: &str) -> BotResult<String> {
        self.store.coin_struct_tag(l2_denom).await
    }

    /// Latest challenger output index, `None` when no output was recorded yet
    pub async fn last_output_index(&self) -> BotResult<Option<u64>> {
        self.store.last_output_index().await
    }
}

/// Role-specific hooks driven by [`ChainMonitor`]
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Stable unique name, used as the persistence key
    fn name(&self) -> &str;

    fn color(&self) -> DisplayColor {
        DisplayColor::Plain
    }

    /// Extract and validate events for `height`
    async fn handle_events(&mut self, _ctx: &MonitorContext, _height: u64) -> BotResult<()> {
        Ok(())
    }

    /// Side effects for `height`, run after its events were handled
    async fn handle_block(&mut self, _ctx: &MonitorContext, _height: u64) -> BotResult<()> {
        Ok(())
    }
}
