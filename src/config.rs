//! Configuration management for the rollup bots
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::role::Role;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bots: BotsConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub l2: ChainConfig,
    pub wallet: WalletConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotsConfig {
    pub roles: Vec<Role>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_log_every")]
    pub log_every: u64,
    #[serde(default = "default_feed_interval_ms")]
    pub feed_interval_ms: u64,
}

impl BotsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(self.feed_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub lcd_url: String,
    pub rpc_url: String,
    pub gas_prices: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub challenger_mnemonic: Option<String>,
    pub executor_mnemonic: Option<String>,
    pub batch_submitter_mnemonic: Option<String>,
    pub output_submitter_mnemonic: Option<String>,
    #[serde(default = "default_derivation_path")]
    pub derivation_path: String,
    /// Bech32 human-readable part of account addresses
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
    #[serde(default = "default_low_balance_threshold")]
    pub low_balance_threshold: u128,
    /// Minimum seconds between two low-balance alerts for one wallet; 0 alerts every time
    #[serde(default)]
    pub alert_cooldown_secs: u64,
}

impl WalletConfig {
    /// Configured mnemonic for a role, ignoring blanks left by unset env vars
    pub fn mnemonic(&self, role: Role) -> Option<&str> {
        let mnemonic = match role {
            Role::Challenger => self.challenger_mnemonic.as_deref(),
            Role::Executor => self.executor_mnemonic.as_deref(),
            Role::BatchSubmitter => self.batch_submitter_mnemonic.as_deref(),
            Role::OutputSubmitter => self.output_submitter_mnemonic.as_deref(),
        };
        mnemonic.map(str::trim).filter(|m| !m.is_empty())
    }

    pub fn alert_cooldown(&self) -> Option<Duration> {
        (self.alert_cooldown_secs > 0).then(|| Duration::from_secs(self.alert_cooldown_secs))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsConfig {
    pub slack_webhook_url: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_log_every() -> u64 {
    10
}

fn default_feed_interval_ms() -> u64 {
    500
}

fn default_gas_limit() -> u64 {
    200_000
}

fn default_derivation_path() -> String {
    "m/44'/118'/0'/0/0".to_string()
}

fn default_address_prefix() -> String {
    "init".to_string()
}

fn default_low_balance_threshold() -> u128 {
    1_000_000_000
}

impl Settings {
    /// Load settings from the file named by `ROLLUP_BOTS_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("ROLLUP_BOTS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.bots.roles.is_empty() {
            anyhow::bail!("At least one role must be enabled");
        }

        if self.bots.poll_interval_ms == 0 {
            anyhow::bail!("bots.poll_interval_ms must be greater than zero");
        }

        if self.l2.gas_prices.trim().is_empty() {
            anyhow::bail!("l2.gas_prices must not be empty");
        }

        for role in &self.bots.roles {
            if self.wallet.mnemonic(*role).is_none() {
                anyhow::bail!("Role {} is enabled but has no mnemonic configured", role);
            }
        }

        if self.alerts.slack_webhook_url.is_none() {
            tracing::warn!("No slack webhook configured - alerts will only be logged");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures<'_>| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[bots]
roles = ["challenger", "outputSubmitter"]

[database]
url = "postgres://localhost/bots"
max_connections = 5
min_connections = 1

[api]
host = "127.0.0.1"
port = 8080

[metrics]
enabled = false
port = 9090

[l2]
chain_id = "minitia-1"
lcd_url = "http://localhost:1317"
rpc_url = "http://localhost:26657"
gas_prices = "0.15umin"

[wallet]
challenger_mnemonic = "${ROLLUP_BOTS_TEST_CHALLENGER}"
output_submitter_mnemonic = "test test test test test test test test test test test junk"
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("ROLLUP_BOTS_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${ROLLUP_BOTS_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        env::set_var("ROLLUP_BOTS_TEST_CHALLENGER", "abandon abandon about");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.bots.roles, vec![Role::Challenger, Role::OutputSubmitter]);
        assert_eq!(settings.bots.poll_interval_ms, 100);
        assert_eq!(settings.bots.log_every, 10);
        assert_eq!(settings.l2.gas_limit, 200_000);
        assert_eq!(settings.wallet.low_balance_threshold, 1_000_000_000);
        assert_eq!(settings.wallet.address_prefix, "init");
        assert_eq!(settings.wallet.alert_cooldown(), None);
        assert_eq!(
            settings.wallet.mnemonic(Role::Challenger),
            Some("abandon abandon about")
        );
        assert_eq!(settings.wallet.mnemonic(Role::Executor), None);
    }

    #[test]
    fn test_enabled_role_without_mnemonic_is_rejected() {
        let config = SAMPLE.replace(
            "roles = [\"challenger\", \"outputSubmitter\"]",
            "roles = [\"executor\"]",
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.as_bytes()).unwrap();

        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("executor"));
    }
}
