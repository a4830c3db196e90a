//! Invalid-block probe

use crate::error::BotResult;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// External signal reporting whether the rollup halted on an invalid block
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HaltProbe: Send + Sync {
    async fn is_invalid_block(&self) -> BotResult<bool>;
}

/// Probe querying the node's `/invalid_block` RPC route
pub struct HttpHaltProbe {
    rpc_url: String,
    http: reqwest::Client,
}

impl HttpHaltProbe {
    pub fn new(rpc_url: impl Into<String>) -> BotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            http,
        })
    }
}

#[async_trait]
impl HaltProbe for HttpHaltProbe {
    async fn is_invalid_block(&self) -> BotResult<bool> {
        let url = format!("{}/invalid_block", self.rpc_url);
        let body: Value = self.http.get(&url).send().await?.json().await?;
        Ok(reports_invalid_block(&body))
    }
}

/// The node reports height "0" once it has recorded an invalid block
fn reports_invalid_block(body: &Value) -> bool {
    body["result"]["height"].as_str() == Some("0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reports_invalid_block() {
        assert!(reports_invalid_block(&json!({ "result": { "height": "0" } })));
        assert!(!reports_invalid_block(&json!({ "result": { "height": "1520" } })));
        assert!(!reports_invalid_block(&json!({ "result": { "height": 0 } })));
        assert!(!reports_invalid_block(&json!({})));
    }
}
