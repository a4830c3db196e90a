//! Rollup bots - chain monitors and transaction submission for
//! challenger, executor, batch submitter and output submitter roles.
//!
//! Role implementations build on two pieces:
//! - [`monitor::ChainMonitor`] drives a [`monitor::Monitor`] one height at a time
//!   against a durable per-role cursor
//! - [`tx::TxWallet`] submits transactions with a cached account sequence

pub mod alert;
pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod role;
pub mod state;
pub mod tx;

pub use error::{BotError, BotResult};
pub use role::Role;
