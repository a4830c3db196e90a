//! Rollup bots binary: runs one monitor per enabled role

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use rollup_bots::alert::{Alerter, LogAlerter, SlackAlerter};
use rollup_bots::api;
use rollup_bots::chain::{ChainClient, HaltProbe, HttpHaltProbe, LcdClient, RpcHeightFeed};
use rollup_bots::config::Settings;
use rollup_bots::metrics::MetricsServer;
use rollup_bots::monitor::{ChainMonitor, MonitorContext, RoleMonitor};
use rollup_bots::state::{StateManager, SyncStore};
use rollup_bots::tx::{FeeConfig, GasPrices, WalletRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting rollup bots v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!("Loaded configuration for roles {:?}", settings.bots.roles);

    // Initialize database connection
    let state_manager = Arc::new(StateManager::new(&settings.database).await?);
    info!("Database connection established");

    state_manager.run_migrations().await?;

    let chain_client: Arc<dyn ChainClient> = Arc::new(LcdClient::new(settings.l2.clone())?);

    let alerter: Arc<dyn Alerter> = match &settings.alerts.slack_webhook_url {
        Some(url) => Arc::new(SlackAlerter::new(url.clone())?),
        None => Arc::new(LogAlerter),
    };

    // One wallet per enabled role
    let fees = FeeConfig::new(
        GasPrices::parse(&settings.l2.gas_prices)?,
        settings.l2.gas_limit,
    )?;
    let wallets = Arc::new(WalletRegistry::new(settings.wallet.clone(), fees, alerter));
    for role in &settings.bots.roles {
        wallets.initialize(*role, chain_client.clone())?;
    }

    // Start monitors
    let store: Arc<dyn SyncStore> = state_manager.clone();
    let ctx = MonitorContext::new(store, wallets.clone());
    let probe: Arc<dyn HaltProbe> = Arc::new(HttpHaltProbe::new(settings.l2.rpc_url.clone())?);

    let mut monitor_handles = Vec::new();
    let mut monitor_tasks = Vec::new();
    for role in &settings.bots.roles {
        let feed = Arc::new(RpcHeightFeed::new(
            settings.l2.rpc_url.clone(),
            settings.bots.feed_interval(),
        )?);
        let mut monitor = ChainMonitor::new(
            RoleMonitor::new(*role),
            ctx.clone(),
            feed,
            probe.clone(),
            settings.bots.poll_interval(),
            settings.bots.log_every,
        );
        monitor_handles.push(monitor.handle());

        let role = *role;
        monitor_tasks.push(tokio::spawn(async move {
            match monitor.run().await {
                Ok(()) => info!("{} monitor exited", role),
                Err(e) if e.is_fatal() => {
                    error!("{} monitor hit a fatal error: {}", role, e);
                    std::process::exit(1);
                }
                Err(e) => error!("{} monitor failed to start: {}", role, e),
            }
        }));
    }

    // Start API server
    let api_handle = tokio::spawn({
        let settings = settings.clone();
        let state_manager = state_manager.clone();
        let wallets = wallets.clone();
        async move {
            if let Err(e) = api::run_server(settings.api, state_manager, wallets).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Rollup bots are running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Let each loop finish its current step
    for handle in &monitor_handles {
        info!("Stopping {} monitor", handle.name());
        handle.stop().await;
    }
    futures::future::join_all(monitor_tasks).await;

    api_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Rollup bots stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rollup_bots=debug,sqlx=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
