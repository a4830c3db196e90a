//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Synced height per monitor
//! - Monitor iteration errors
//! - Transaction submissions and failures per role
//! - Low balance alerts

use crate::error::{BotError, BotResult};
use crate::role::Role;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref SYNCED_HEIGHT: GaugeVec = register_gauge_vec!(
        "rollup_bots_synced_height",
        "Last fully processed height per monitor",
        &["monitor"]
    ).unwrap();

    pub static ref MONITOR_ERRORS: CounterVec = register_counter_vec!(
        "rollup_bots_monitor_errors_total",
        "Total failed monitor iterations",
        &["monitor"]
    ).unwrap();

    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "rollup_bots_transactions_submitted_total",
        "Total transactions included on chain",
        &["role"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "rollup_bots_transactions_failed_total",
        "Total transactions that failed to build or broadcast",
        &["role"]
    ).unwrap();

    pub static ref LOW_BALANCE_ALERTS: CounterVec = register_counter_vec!(
        "rollup_bots_low_balance_alerts_total",
        "Total low balance alerts raised",
        &["role"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> BotResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BotError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BotError::Internal(format!("metrics server: {}", e)))
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_synced_height(monitor: &str, height: u64) {
    SYNCED_HEIGHT
        .with_label_values(&[monitor])
        .set(height as f64);
}

pub fn record_monitor_error(monitor: &str) {
    MONITOR_ERRORS.with_label_values(&[monitor]).inc();
}

pub fn record_tx_submitted(role: Role) {
    TX_SUBMITTED.with_label_values(&[role.name()]).inc();
}

pub fn record_tx_failed(role: Role) {
    TX_FAILED.with_label_values(&[role.name()]).inc();
}

pub fn record_low_balance_alert(role: Role) {
    LOW_BALANCE_ALERTS.with_label_values(&[role.name()]).inc();
}
