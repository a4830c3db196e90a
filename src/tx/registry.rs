//! Process-wide registry holding one wallet per role

use super::address::account_address;
use super::sign::FeeConfig;
use super::wallet::{FundingPolicy, TxWallet};
use crate::alert::Alerter;
use crate::chain::ChainClient;
use crate::config::WalletConfig;
use crate::error::{BotError, BotResult};
use crate::role::Role;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::signers::{coins_bip39::English, LocalWallet, MnemonicBuilder};
use std::sync::Arc;
use tracing::info;

/// Holds the single [`TxWallet`] of each role for the process lifetime
pub struct WalletRegistry {
    config: WalletConfig,
    fees: FeeConfig,
    alerter: Arc<dyn Alerter>,
    wallets: DashMap<Role, Arc<TxWallet>>,
}

impl WalletRegistry {
    pub fn new(config: WalletConfig, fees: FeeConfig, alerter: Arc<dyn Alerter>) -> Self {
        Self {
            config,
            fees,
            alerter,
            wallets: DashMap::new(),
        }
    }

    /// Create the wallet for `role` unless it already exists
    pub fn initialize(&self, role: Role, client: Arc<dyn ChainClient>) -> BotResult<()> {
        let Entry::Vacant(slot) = self.wallets.entry(role) else {
            return Ok(());
        };

        let mnemonic = self
            .config
            .mnemonic(role)
            .ok_or_else(|| BotError::Config(format!("no mnemonic configured for {}", role)))?;
        let signer = derive_signer(mnemonic, &self.config.derivation_path)?;
        let address = account_address(&signer, &self.config.address_prefix)?;

        let wallet = TxWallet::new(
            role,
            client,
            signer,
            address,
            self.fees.clone(),
            self.alerter.clone(),
            FundingPolicy {
                threshold: self.config.low_balance_threshold,
                cooldown: self.config.alert_cooldown(),
            },
        );
        info!("Initialized {} wallet {}", role, wallet.address());
        slot.insert(Arc::new(wallet));
        Ok(())
    }

    /// Wallet for `role`; fails if [`initialize`](Self::initialize) was never called
    pub fn get(&self, role: Role) -> BotResult<Arc<TxWallet>> {
        self.wallets
            .get(&role)
            .map(|w| w.clone())
            .ok_or(BotError::WalletNotInitialized(role))
    }

    /// Addresses of every initialized wallet, in role order
    pub fn addresses(&self) -> Vec<(Role, String)> {
        Role::ALL
            .into_iter()
            .filter_map(|role| {
                self.wallets
                    .get(&role)
                    .map(|w| (role, w.address().to_string()))
            })
            .collect()
    }
}

fn derive_signer(mnemonic: &str, derivation_path: &str) -> BotResult<LocalWallet> {
    MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .derivation_path(derivation_path)
        .map_err(|e| BotError::Signing(format!("invalid derivation path: {}", e)))?
        .build()
        .map_err(|e| BotError::Signing(format!("key derivation failed: {}", e)))
}
