//! Transaction submission with cached account sequence management

mod address;
mod registry;
mod sign;
mod wallet;

pub use registry::WalletRegistry;
pub use address::account_address;
pub use sign::{FeeConfig, GasPrices, Msg};
pub use wallet::{FundingPolicy, TxWallet};
