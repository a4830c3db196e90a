//! Outbound alerting
//!
//! Alerts are fire-and-forget: delivery failures are logged by the caller and
//! never affect transaction submission.

use crate::error::{BotError, BotResult};
use crate::role::Role;

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Alert payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    LowBalance {
        role: Role,
        address: String,
        balance: u128,
        threshold: u128,
        denom: String,
    },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::LowBalance {
                role,
                address,
                balance,
                threshold,
                denom,
            } => write!(
                f,
                "[{}] not enough balance in {}: {}{} (threshold {}{}, short by {}{})",
                role,
                address,
                balance,
                denom,
                threshold,
                denom,
                threshold.saturating_sub(*balance),
                denom
            ),
        }
    }
}

/// Outbound notification sink
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn notify(&self, alert: Alert) -> BotResult<()>;
}

/// Posts alerts to a Slack incoming webhook
pub struct SlackAlerter {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackAlerter {
    pub fn new(webhook_url: impl Into<String>) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            http,
        })
    }
}

#[async_trait]
impl Alerter for SlackAlerter {
    async fn notify(&self, alert: Alert) -> BotResult<()> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "text": alert.to_string() }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Alert(format!(
                "slack webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Fallback sink used when no webhook is configured
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn notify(&self, alert: Alert) -> BotResult<()> {
        warn!("ALERT {}", alert);
        Ok(())
    }
}
