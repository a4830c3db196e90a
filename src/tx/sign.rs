//! Fee calculation and sign-doc construction

use super::address;
use crate::chain::AccountInfo;
use crate::error::{BotError, BotResult};

use ethers::signers::LocalWallet;
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};

/// A single chain operation inside a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub value: Value,
}

impl Msg {
    pub fn new(type_url: impl Into<String>, value: Value) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// Gas price for one denom, kept as an exact decimal `units / divisor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    pub denom: String,
    units: u128,
    divisor: u128,
}

impl GasPrice {
    /// Fee for `gas_limit`, rounded up to a whole unit. `None` on overflow.
    pub fn fee_for(&self, gas_limit: u64) -> Option<u128> {
        u128::from(gas_limit)
            .checked_mul(self.units)
            .map(|total| total.div_ceil(self.divisor))
    }
}

/// Parsed `gas_prices` setting such as `"0.15umin,0.01uusdc"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrices(Vec<GasPrice>);

impl GasPrices {
    pub fn parse(input: &str) -> BotResult<Self> {
        let prices = input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_gas_price)
            .collect::<BotResult<Vec<_>>>()?;

        if prices.is_empty() {
            return Err(BotError::Config("gas prices must not be empty".to_string()));
        }
        Ok(Self(prices))
    }

    /// The fee denomination used for signing and funding checks
    pub fn primary(&self) -> &GasPrice {
        &self.0[0]
    }
}

fn parse_gas_price(entry: &str) -> BotResult<GasPrice> {
    let invalid = || BotError::Config(format!("invalid gas price: {}", entry));

    let split = entry
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(invalid)?;
    let (amount, denom) = entry.split_at(split);
    if amount.is_empty() {
        return Err(invalid());
    }

    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let digits = format!("{}{}", whole, fraction);
    let units = digits.parse::<u128>().map_err(|_| invalid())?;
    let divisor = u32::try_from(fraction.len())
        .ok()
        .and_then(|scale| 10u128.checked_pow(scale))
        .ok_or_else(invalid)?;

    Ok(GasPrice {
        denom: denom.to_string(),
        units,
        divisor,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

/// Fee settings shared by every wallet on one chain
#[derive(Debug, Clone)]
pub struct FeeConfig {
    gas_prices: GasPrices,
    fee: Fee,
}

impl FeeConfig {
    /// Fails when the fee for `gas_limit` does not fit in a `u128`
    pub fn new(gas_prices: GasPrices, gas_limit: u64) -> BotResult<Self> {
        let price = gas_prices.primary();
        let amount = price.fee_for(gas_limit).ok_or_else(|| {
            BotError::Config(format!(
                "fee for gas limit {} at {} {} overflows",
                gas_limit, price.units, price.denom
            ))
        })?;

        let fee = Fee {
            amount: vec![Coin {
                denom: price.denom.clone(),
                amount: amount.to_string(),
            }],
            gas_limit,
        };
        Ok(Self { gas_prices, fee })
    }

    pub fn fee(&self) -> Fee {
        self.fee.clone()
    }

    pub fn primary_denom(&self) -> &str {
        &self.gas_prices.primary().denom
    }
}

/// Document covered by the signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignDoc {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub fee: Fee,
    pub messages: Vec<Msg>,
}

impl SignDoc {
    pub fn new(chain_id: String, account: AccountInfo, fee: Fee, messages: Vec<Msg>) -> Self {
        Self {
            chain_id,
            account_number: account.account_number,
            sequence: account.sequence,
            fee,
            messages,
        }
    }

    fn digest(&self) -> BotResult<H256> {
        let bytes = serde_json::to_vec(self)?;
        Ok(H256::from_slice(&Keccak256::digest(&bytes)))
    }

    /// Sign with `signer`, whose account address is `address`
    pub fn sign(self, signer: &LocalWallet, address: &str) -> BotResult<SignedTx> {
        let signature = signer
            .sign_hash(self.digest()?)
            .map_err(|e| BotError::Signing(e.to_string()))?;

        Ok(SignedTx {
            signer: address.to_string(),
            pub_key: hex::encode(address::public_key(signer)),
            signature: hex::encode(signature.to_vec()),
            doc: self,
        })
    }
}

/// Signed transaction as broadcast to the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTx {
    pub doc: SignDoc,
    pub signer: String,
    pub pub_key: String,
    pub signature: String,
}

impl SignedTx {
    pub fn to_bytes(&self) -> BotResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{coins_bip39::English, MnemonicBuilder};
    use serde_json::json;

    const MNEMONIC: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_parse_gas_prices() {
        let prices = GasPrices::parse("0.15umin, 0.01uusdc").unwrap();
        assert_eq!(prices.primary().denom, "umin");
        assert_eq!(prices.primary().fee_for(200_000), Some(30_000));
        assert_eq!(prices.0.len(), 2);
    }

    #[test]
    fn test_fee_rounds_up() {
        let prices = GasPrices::parse("0.015uinit").unwrap();
        // 333 * 0.015 = 4.995
        assert_eq!(prices.primary().fee_for(333), Some(5));

        let whole = GasPrices::parse("2uinit").unwrap();
        assert_eq!(whole.primary().fee_for(10), Some(20));
    }

    #[test]
    fn test_oversized_gas_prices_are_config_errors() {
        let too_precise = GasPrices::parse("0.0000000000000000000000000000000000000001umin");
        assert!(matches!(too_precise, Err(BotError::Config(_))));

        let huge = GasPrices::parse("100000000000000000000000000000000000umin").unwrap();
        assert_eq!(huge.primary().fee_for(200_000), None);
        assert!(matches!(
            FeeConfig::new(huge, 200_000),
            Err(BotError::Config(_))
        ));

        let fees = FeeConfig::new(GasPrices::parse("0.15umin").unwrap(), 200_000).unwrap();
        assert_eq!(fees.fee().amount[0].amount, "30000");
        assert_eq!(fees.primary_denom(), "umin");
    }

    #[test]
    fn test_parse_gas_prices_rejects_garbage() {
        assert!(GasPrices::parse("").is_err());
        assert!(GasPrices::parse("umin").is_err());
        assert!(GasPrices::parse("0.15").is_err());
        assert!(GasPrices::parse("1.2.3umin").is_err());
    }

    #[test]
    fn test_sign_doc_is_deterministic() {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(MNEMONIC)
            .build()
            .unwrap();
        let fee_config = FeeConfig::new(GasPrices::parse("0.15umin").unwrap(), 100_000).unwrap();
        let doc = SignDoc::new(
            "minitia-1".to_string(),
            AccountInfo {
                account_number: 4,
                sequence: 9,
            },
            fee_config.fee(),
            vec![Msg::new("/opinit.ophost.v1.MsgProposeOutput", json!({ "index": 1 }))],
        );

        let address = address::account_address(&signer, "init").unwrap();
        let first = doc.clone().sign(&signer, &address).unwrap();
        let second = doc.sign(&signer, &address).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.doc.fee.amount[0].amount, "15000");
        assert_eq!(first.signer, address);
        assert_eq!(first.pub_key.len(), 66);
        assert!(!first.to_bytes().unwrap().is_empty());
    }
}
