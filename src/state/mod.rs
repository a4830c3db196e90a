//! Sync state persistence with PostgreSQL
//!
//! Handles:
//! - Per-role synced height cursors for restart recovery
//! - L2 denom to L1 coin mapping lookups
//! - The latest output recorded by the challenger

mod manager;

pub use manager::{StateManager, SyncState};

use crate::error::BotResult;
use async_trait::async_trait;

/// Durable mapping from a role name to its last synced height
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Load the persisted height for `name`, `None` if the row does not exist
    async fn load_height(&self, name: &str) -> BotResult<Option<u64>>;

    /// Create the row for `name` at `height`
    async fn create_state(&self, name: &str, height: u64) -> BotResult<()>;

    /// Overwrite the persisted height for `name`
    async fn update_height(&self, name: &str, height: u64) -> BotResult<()>;

    /// Resolve an L2 denom to its canonical L1 struct tag
    async fn coin_struct_tag(&self, l2_denom: &str) -> BotResult<String>;

    /// Highest recorded challenger output index, `None` before the first output
    async fn last_output_index(&self) -> BotResult<Option<u64>>;
}
