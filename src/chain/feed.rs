//! Latest-height feed backed by polling the node's RPC `/status` endpoint

use crate::error::{BotError, BotResult};

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Continuously updated source of the chain's latest observed height
#[cfg_attr(test, mockall::automock)]
pub trait HeightFeed: Send + Sync {
    /// Begin delivering height updates
    fn initialize(&self);

    /// Latest observed height, `None` until the first update arrives
    fn latest_height(&self) -> Option<u64>;

    /// Halt delivery
    fn stop(&self);
}

/// Height feed polling Tendermint RPC in a background task
pub struct RpcHeightFeed {
    rpc_url: String,
    interval: Duration,
    http: reqwest::Client,
    /// Zero means no height observed yet; chain heights start at 1
    latest: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcHeightFeed {
    pub fn new(rpc_url: impl Into<String>, interval: Duration) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            interval,
            http,
            latest: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        })
    }

    async fn fetch_height(http: &reqwest::Client, rpc_url: &str) -> BotResult<u64> {
        let url = format!("{}/status", rpc_url);
        let body: Value = http.get(&url).send().await?.json().await?;
        parse_latest_height(&body).ok_or_else(|| BotError::ChainQuery {
            endpoint: url,
            message: "missing sync_info.latest_block_height".to_string(),
        })
    }
}

impl HeightFeed for RpcHeightFeed {
    fn initialize(&self) {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let http = self.http.clone();
        let rpc_url = self.rpc_url.clone();
        let latest = self.latest.clone();
        let interval = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match Self::fetch_height(&http, &rpc_url).await {
                    Ok(height) => {
                        // Never move backwards if a lagging node answers
                        let previous = latest.fetch_max(height, Ordering::Relaxed);
                        if height > previous {
                            debug!("Observed new height {}", height);
                        }
                    }
                    Err(e) => warn!("Failed to poll latest height: {}", e),
                }
            }
        }));
        info!("Height feed started for {}", self.rpc_url);
    }

    fn latest_height(&self) -> Option<u64> {
        match self.latest.load(Ordering::Relaxed) {
            0 => None,
            height => Some(height),
        }
    }

    fn stop(&self) {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = task.take() {
            handle.abort();
            info!("Height feed stopped for {}", self.rpc_url);
        }
    }
}

fn parse_latest_height(body: &Value) -> Option<u64> {
    body["result"]["sync_info"]["latest_block_height"]
        .as_str()?
        .parse()
        .ok()
}
