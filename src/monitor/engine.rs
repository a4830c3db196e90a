//! Polling loop driving a [`Monitor`] one height at a time

use super::{Monitor, MonitorContext};
use crate::chain::{HaltProbe, HeightFeed};
use crate::error::{BotError, BotResult};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const PROBE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Initializing,
    Running,
}

/// Outcome of a single loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing new observed by the feed
    Idle,
    /// Height fully processed and persisted
    Processed(u64),
    /// Processing of this height failed; it will be retried
    Failed(u64),
}

/// Stops a running monitor from another task
#[derive(Clone)]
pub struct MonitorHandle {
    name: String,
    shutdown: Arc<RwLock<bool>>,
    feed: Arc<dyn HeightFeed>,
}

impl MonitorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request the loop to stop after its current step. Idempotent.
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        self.feed.stop();
        info!("{} monitor stop requested", self.name);
    }
}

/// Drives one role's monitor against the height feed and its durable cursor
pub struct ChainMonitor<M: Monitor> {
    monitor: M,
    ctx: MonitorContext,
    feed: Arc<dyn HeightFeed>,
    probe: Arc<dyn HaltProbe>,
    poll_interval: Duration,
    log_every: u64,
    synced_height: u64,
    state: MonitorState,
    shutdown: Arc<RwLock<bool>>,
}

impl<M: Monitor> ChainMonitor<M> {
    pub fn new(
        monitor: M,
        ctx: MonitorContext,
        feed: Arc<dyn HeightFeed>,
        probe: Arc<dyn HaltProbe>,
        poll_interval: Duration,
        log_every: u64,
    ) -> Self {
        Self {
            monitor,
            ctx,
            feed,
            probe,
            poll_interval,
            log_every,
            synced_height: 0,
            state: MonitorState::Stopped,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            name: self.monitor.name().to_string(),
            shutdown: self.shutdown.clone(),
            feed: self.feed.clone(),
        }
    }

    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    pub fn synced_height(&self) -> u64 {
        self.synced_height
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Initialize, then loop until stopped.
    ///
    /// Returns [`BotError::InvalidBlock`] without processing anything when the
    /// node reports an invalid block; callers must treat that as fatal.
    pub async fn run(&mut self) -> BotResult<()> {
        if let Err(e) = self.initialize().await {
            self.feed.stop();
            self.state = MonitorState::Stopped;
            return Err(e);
        }

        self.state = MonitorState::Running;
        info!(
            "{} monitor running from height {}",
            self.monitor.name(),
            self.synced_height
        );

        while !*self.shutdown.read().await {
            self.tick().await;
            sleep(self.poll_interval).await;
        }

        self.feed.stop();
        self.state = MonitorState::Stopped;
        info!(
            "{} monitor stopped at height {}",
            self.monitor.name(),
            self.synced_height
        );
        Ok(())
    }

    /// Load or create the durable cursor, start the feed and run the pre-flight check
    pub async fn initialize(&mut self) -> BotResult<()> {
        self.state = MonitorState::Initializing;
        let name = self.monitor.name().to_string();

        self.synced_height = match self.ctx.store().load_height(&name).await? {
            Some(height) => height,
            None => {
                self.ctx.store().create_state(&name, 0).await?;
                info!("{} created sync state at height 0", name);
                0
            }
        };
        crate::metrics::record_synced_height(&name, self.synced_height);

        self.feed.initialize();
        self.preflight().await
    }

    /// Fail with [`BotError::InvalidBlock`] if the node reports an invalid block.
    /// Probe transport errors are retried until the monitor is stopped.
    async fn preflight(&self) -> BotResult<()> {
        loop {
            match self.probe.is_invalid_block().await {
                Ok(true) => {
                    error!("App hash is invalid. Please check the app hash");
                    return Err(BotError::InvalidBlock);
                }
                Ok(false) => return Ok(()),
                Err(e) => {
                    warn!(
                        "{} invalid block probe failed, retrying: {}",
                        self.monitor.name(),
                        e
                    );
                    if *self.shutdown.read().await {
                        return Ok(());
                    }
                    sleep(PROBE_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Process at most one height. Errors are logged and contained here.
    pub async fn tick(&mut self) -> Tick {
        let Some(latest) = self.feed.latest_height() else {
            return Tick::Idle;
        };
        if self.synced_height >= latest {
            return Tick::Idle;
        }

        let next = self.synced_height + 1;
        match self.process(next).await {
            Ok(()) => {
                // Only advance in memory once the height is durable
                self.synced_height = next;
                crate::metrics::record_synced_height(self.monitor.name(), next);
                Tick::Processed(next)
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    "{} monitor runs error at height {}, will retry: {}",
                    self.monitor.name(),
                    next,
                    e
                );
                crate::metrics::record_monitor_error(self.monitor.name());
                Tick::Failed(next)
            }
            Err(e) => {
                error!(
                    "{} monitor runs error at height {}: {}",
                    self.monitor.name(),
                    next,
                    e
                );
                crate::metrics::record_monitor_error(self.monitor.name());
                Tick::Failed(next)
            }
        }
    }

    async fn process(&mut self, height: u64) -> BotResult<()> {
        if progress_due(height, self.log_every) {
            let line = format!("{} height {}", self.monitor.name(), height);
            info!("{}", self.monitor.color().paint(&line));
        }

        self.monitor.handle_events(&self.ctx, height).await?;
        self.monitor.handle_block(&self.ctx, height).await?;

        self.ctx
            .store()
            .update_height(self.monitor.name(), height)
            .await?;
        debug!("{} synced height {}", self.monitor.name(), height);
        Ok(())
    }
}

/// Whether `height` gets a progress log line; `log_every == 0` disables them
fn progress_due(height: u64, log_every: u64) -> bool {
    log_every > 0 && height % log_every == 0
}
