//! Bech32 account addresses for secp256k1 keys

use crate::error::{BotError, BotResult};

use bech32::{ToBase32, Variant};
use ethers::signers::LocalWallet;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compressed SEC1 public key of `signer`
pub fn public_key(signer: &LocalWallet) -> Vec<u8> {
    signer
        .signer()
        .verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .to_vec()
}

/// Account address of `signer`: `ripemd160(sha256(pubkey))` encoded under `prefix`
pub fn account_address(signer: &LocalWallet, prefix: &str) -> BotResult<String> {
    let hash = Ripemd160::digest(Sha256::digest(public_key(signer)));
    bech32::encode(prefix, hash.to_base32(), Variant::Bech32)
        .map_err(|e| BotError::Config(format!("invalid address prefix {:?}: {}", prefix, e)))
}
