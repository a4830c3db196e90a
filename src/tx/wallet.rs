//! Transaction wallet with a cached account number / sequence pair
//!
//! The cache lets one account submit transactions back to back without querying
//! the chain each time. Any failure while building or broadcasting clears the
//! cache so the next call starts from the chain's view of the account.

use super::sign::{FeeConfig, Msg, SignDoc};
use crate::alert::{Alert, Alerter};
use crate::chain::{AccountInfo, BroadcastResult, ChainClient};
use crate::error::{BotError, BotResult};
use crate::role::Role;

use ethers::signers::LocalWallet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Low-balance alert policy for a wallet
#[derive(Debug, Clone)]
pub struct FundingPolicy {
    pub threshold: u128,
    /// Minimum gap between two alerts, `None` alerts on every evaluation
    pub cooldown: Option<Duration>,
}

/// Wallet submitting transactions for one role
pub struct TxWallet {
    role: Role,
    client: Arc<dyn ChainClient>,
    signer: LocalWallet,
    address: String,
    fees: FeeConfig,
    alerter: Arc<dyn Alerter>,
    funding: FundingPolicy,
    last_alert: std::sync::Mutex<Option<Instant>>,
    /// Cached account number and next sequence; held for the whole submission
    account: Mutex<Option<AccountInfo>>,
}

impl fmt::Debug for TxWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxWallet")
            .field("role", &self.role)
            .field("address", &self.address)
            .field("funding", &self.funding)
            .finish_non_exhaustive()
    }
}

impl TxWallet {
    /// `address` is the bech32 account address of `signer`
    pub fn new(
        role: Role,
        client: Arc<dyn ChainClient>,
        signer: LocalWallet,
        address: String,
        fees: FeeConfig,
        alerter: Arc<dyn Alerter>,
        funding: FundingPolicy,
    ) -> Self {
        Self {
            role,
            client,
            signer,
            address,
            fees,
            alerter,
            funding,
            last_alert: std::sync::Mutex::new(None),
            account: Mutex::new(None),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Currently cached account state, if any
    pub async fn cached_account(&self) -> Option<AccountInfo> {
        *self.account.lock().await
    }

    /// Sign and broadcast `msgs`, advancing the cached sequence on success
    pub async fn transaction(&self, msgs: Vec<Msg>) -> BotResult<BroadcastResult> {
        if msgs.is_empty() {
            return Err(BotError::EmptyTransaction);
        }

        // Concurrent callers queue here rather than racing for the same sequence
        let mut cached = self.account.lock().await;
        let account = match *cached {
            Some(account) => account,
            None => {
                let account = self.client.account_info(&self.address).await?;
                debug!(
                    "{} loaded account number {} sequence {}",
                    self.role, account.account_number, account.sequence
                );
                *cached = Some(account);
                account
            }
        };

        self.check_enough_balance().await;

        match self.send(msgs, account).await {
            Ok(result) => {
                *cached = Some(AccountInfo {
                    sequence: account.sequence + 1,
                    ..account
                });
                info!(
                    "{} transaction {} included at height {}",
                    self.role, result.tx_hash, result.height
                );
                crate::metrics::record_tx_submitted(self.role);
                Ok(result)
            }
            Err(e) => {
                *cached = None;
                warn!(
                    "{} transaction failed with sequence {}, cache cleared: {}",
                    self.role, account.sequence, e
                );
                crate::metrics::record_tx_failed(self.role);
                Err(e)
            }
        }
    }

    async fn send(&self, msgs: Vec<Msg>, account: AccountInfo) -> BotResult<BroadcastResult> {
        let tx = SignDoc::new(self.client.chain_id(), account, self.fees.fee(), msgs)
            .sign(&self.signer, &self.address)?;
        let result = self.client.broadcast(tx.to_bytes()?).await?;

        if result.code != 0 {
            return Err(BotError::BroadcastRejected {
                tx_hash: result.tx_hash,
                code: result.code,
                raw_log: result.raw_log,
            });
        }
        Ok(result)
    }

    /// Alert when the fee balance is below the threshold. Never fails the caller.
    async fn check_enough_balance(&self) {
        let denom = self.fees.primary_denom();
        let balance = match self.client.balance(&self.address, denom).await {
            Ok(Some(balance)) => balance,
            Ok(None) => return,
            Err(e) => {
                warn!("{} failed to query {} balance: {}", self.role, denom, e);
                return;
            }
        };

        if balance >= self.funding.threshold || !self.alert_due() {
            return;
        }

        crate::metrics::record_low_balance_alert(self.role);
        let alert = Alert::LowBalance {
            role: self.role,
            address: self.address.clone(),
            balance,
            threshold: self.funding.threshold,
            denom: denom.to_string(),
        };
        if let Err(e) = self.alerter.notify(alert).await {
            warn!("{} failed to send low balance alert: {}", self.role, e);
        }
    }

    fn alert_due(&self) -> bool {
        let mut last = match self.last_alert.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let due = match (self.funding.cooldown, *last) {
            (Some(cooldown), Some(at)) => now.duration_since(at) >= cooldown,
            _ => true,
        };
        if due {
            *last = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MockAlerter;
    use crate::chain::MockChainClient;
    use crate::tx::address::account_address;
    use crate::tx::sign::{GasPrices, SignedTx};
    use ethers::signers::{coins_bip39::English, MnemonicBuilder};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn signer() -> LocalWallet {
        MnemonicBuilder::<English>::default()
            .phrase(MNEMONIC)
            .build()
            .unwrap()
    }

    fn fees() -> FeeConfig {
        FeeConfig::new(GasPrices::parse("0.15umin").unwrap(), 200_000).unwrap()
    }

    fn msgs() -> Vec<Msg> {
        vec![Msg::new(
            "/opinit.opchild.v1.MsgFinalizeTokenDeposit",
            json!({ "sequence": "1" }),
        )]
    }

    fn ok_result(hash: &str) -> BroadcastResult {
        BroadcastResult {
            tx_hash: hash.to_string(),
            height: 10,
            code: 0,
            raw_log: String::new(),
        }
    }

    fn decoded_sequence(bytes: &[u8]) -> u64 {
        serde_json::from_slice::<SignedTx>(bytes).unwrap().doc.sequence
    }

    fn wallet(client: MockChainClient, alerter: MockAlerter, funding: FundingPolicy) -> TxWallet {
        let signer = signer();
        let address = account_address(&signer, "init").unwrap();
        TxWallet::new(
            Role::Executor,
            Arc::new(client),
            signer,
            address,
            fees(),
            Arc::new(alerter),
            funding,
        )
    }

    fn funding() -> FundingPolicy {
        FundingPolicy {
            threshold: 1_000_000_000,
            cooldown: None,
        }
    }

    fn funded_client() -> MockChainClient {
        let mut client = MockChainClient::new();
        client
            .expect_balance()
            .returning(|_, _| Ok(Some(5_000_000_000)));
        client
            .expect_chain_id()
            .returning(|| "minitia-1".to_string());
        client
    }

    #[tokio::test]
    async fn test_consecutive_transactions_use_incrementing_sequence() {
        let mut client = funded_client();
        client.expect_account_info().times(1).returning(|_| {
            Ok(AccountInfo {
                account_number: 7,
                sequence: 41,
            })
        });

        let sequences = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = sequences.clone();
        client.expect_broadcast().times(2).returning(move |bytes| {
            seen.lock().unwrap().push(decoded_sequence(&bytes));
            Ok(ok_result("AA"))
        });

        let wallet = wallet(client, MockAlerter::new(), funding());
        wallet.transaction(msgs()).await.unwrap();
        wallet.transaction(msgs()).await.unwrap();

        assert_eq!(*sequences.lock().unwrap(), vec![41, 42]);
        assert_eq!(
            wallet.cached_account().await,
            Some(AccountInfo {
                account_number: 7,
                sequence: 43
            })
        );
    }

    #[tokio::test]
    async fn test_overlapping_transactions_get_distinct_sequences() {
        let mut client = funded_client();
        client.expect_account_info().times(1).returning(|_| {
            Ok(AccountInfo {
                account_number: 7,
                sequence: 41,
            })
        });

        let sequences = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = sequences.clone();
        client.expect_broadcast().times(2).returning(move |bytes| {
            seen.lock().unwrap().push(decoded_sequence(&bytes));
            Ok(ok_result("AB"))
        });

        let wallet = wallet(client, MockAlerter::new(), funding());
        let (first, second) = tokio::join!(wallet.transaction(msgs()), wallet.transaction(msgs()));
        first.unwrap();
        second.unwrap();

        let mut sequences = sequences.lock().unwrap().clone();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![41, 42]);
        assert_eq!(wallet.cached_account().await.map(|a| a.sequence), Some(43));
    }

    #[tokio::test]
    async fn test_addresses_are_bech32_and_sent_to_the_chain() {
        let mut client = funded_client();
        client
            .expect_account_info()
            .withf(|address| address.starts_with("init1"))
            .times(1)
            .returning(|_| {
                Ok(AccountInfo {
                    account_number: 2,
                    sequence: 0,
                })
            });
        client
            .expect_broadcast()
            .returning(|bytes| {
                let tx = serde_json::from_slice::<SignedTx>(&bytes).unwrap();
                assert!(tx.signer.starts_with("init1"));
                Ok(ok_result("AC"))
            });

        let wallet = wallet(client, MockAlerter::new(), funding());
        assert!(wallet.address().starts_with("init1"));
        assert!(format!("{:?}", wallet).contains(wallet.address()));
        wallet.transaction(msgs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_clears_cache_and_requeries() {
        let mut client = funded_client();
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = queries.clone();
        client.expect_account_info().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(AccountInfo {
                account_number: 7,
                sequence: 3,
            })
        });

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempt = attempts.clone();
        client.expect_broadcast().returning(move |_| {
            if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BotError::ChainQuery {
                    endpoint: "broadcast_tx_sync".to_string(),
                    message: "connection reset".to_string(),
                })
            } else {
                Ok(ok_result("BB"))
            }
        });

        let wallet = wallet(client, MockAlerter::new(), funding());

        let err = wallet.transaction(msgs()).await.unwrap_err();
        assert!(matches!(err, BotError::ChainQuery { .. }));
        assert_eq!(wallet.cached_account().await, None);

        wallet.transaction(msgs()).await.unwrap();
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_code_is_an_error_and_clears_cache() {
        let mut client = funded_client();
        client.expect_account_info().returning(|_| {
            Ok(AccountInfo {
                account_number: 1,
                sequence: 5,
            })
        });
        client.expect_broadcast().returning(|_| {
            Ok(BroadcastResult {
                tx_hash: "CC".to_string(),
                height: 0,
                code: 32,
                raw_log: "account sequence mismatch, expected 6, got 5".to_string(),
            })
        });

        let wallet = wallet(client, MockAlerter::new(), funding());
        let err = wallet.transaction(msgs()).await.unwrap_err();

        assert!(matches!(err, BotError::BroadcastRejected { code: 32, .. }));
        assert_eq!(wallet.cached_account().await, None);
    }

    #[tokio::test]
    async fn test_low_balance_alerts_once_and_still_broadcasts() {
        let mut client = MockChainClient::new();
        client
            .expect_chain_id()
            .returning(|| "minitia-1".to_string());
        client
            .expect_balance()
            .withf(|_, denom| denom == "umin")
            .returning(|_, _| Ok(Some(10)));
        client.expect_account_info().returning(|_| {
            Ok(AccountInfo {
                account_number: 1,
                sequence: 0,
            })
        });
        client
            .expect_broadcast()
            .times(1)
            .returning(|_| Ok(ok_result("DD")));

        let mut alerter = MockAlerter::new();
        alerter
            .expect_notify()
            .withf(|alert| {
                matches!(alert, Alert::LowBalance { balance: 10, threshold: 1_000_000_000, denom, .. } if denom == "umin")
            })
            .times(1)
            .returning(|_| Err(BotError::Alert("webhook down".to_string())));

        let wallet = wallet(client, alerter, funding());
        tokio_test::assert_ok!(wallet.transaction(msgs()).await);
    }

    #[tokio::test]
    async fn test_alert_cooldown_suppresses_repeat_alerts() {
        let mut client = MockChainClient::new();
        client
            .expect_chain_id()
            .returning(|| "minitia-1".to_string());
        client.expect_balance().returning(|_, _| Ok(Some(1)));
        client.expect_account_info().returning(|_| {
            Ok(AccountInfo {
                account_number: 1,
                sequence: 0,
            })
        });
        client
            .expect_broadcast()
            .times(2)
            .returning(|_| Ok(ok_result("EE")));

        let mut alerter = MockAlerter::new();
        alerter.expect_notify().times(1).returning(|_| Ok(()));

        let policy = FundingPolicy {
            threshold: 100,
            cooldown: Some(Duration::from_secs(3600)),
        };
        let wallet = wallet(client, alerter, policy);
        wallet.transaction(msgs()).await.unwrap();
        wallet.transaction(msgs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_balance_query_failure_does_not_block_submission() {
        let mut client = MockChainClient::new();
        client
            .expect_chain_id()
            .returning(|| "minitia-1".to_string());
        client.expect_balance().returning(|_, _| {
            Err(BotError::ChainQuery {
                endpoint: "balances".to_string(),
                message: "503".to_string(),
            })
        });
        client.expect_account_info().returning(|_| {
            Ok(AccountInfo {
                account_number: 1,
                sequence: 0,
            })
        });
        client
            .expect_broadcast()
            .times(1)
            .returning(|_| Ok(ok_result("FF")));

        let wallet = wallet(client, MockAlerter::new(), funding());
        wallet.transaction(msgs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_messages_rejected_without_chain_calls() {
        let wallet = wallet(MockChainClient::new(), MockAlerter::new(), funding());
        let err = wallet.transaction(Vec::new()).await.unwrap_err();
        assert!(matches!(err, BotError::EmptyTransaction));
    }
}
