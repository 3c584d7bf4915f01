//! Local private-key wallet

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use super::{UnsignedTransaction, Wallet};
use crate::core::{LpError, LpResult};

/// Wallet holding a secp256k1 key in memory
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    /// Build from a hex private key, with or without `0x`
    pub fn from_private_key(private_key: &str) -> LpResult<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|_| LpError::Configuration("Private key is not a valid secp256k1 key".into()))?;
        Ok(Self { signer })
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .finish()
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> LpResult<Bytes> {
        let mut legacy = TxLegacy {
            chain_id: Some(tx.chain_id),
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: TxKind::Call(tx.to),
            value: U256::ZERO,
            input: tx.data.clone(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut legacy)
            .map_err(|e| LpError::chain_write("sign transaction", e))?;

        let envelope = TxEnvelope::from(legacy.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Well-known development key (anvil account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derivation() {
        let wallet = LocalWallet::from_private_key(DEV_KEY).unwrap();
        assert_eq!(
            wallet.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );

        let without_prefix = LocalWallet::from_private_key(&DEV_KEY[2..]).unwrap();
        assert_eq!(without_prefix.address(), wallet.address());
    }

    #[test]
    fn test_invalid_key_is_configuration_error() {
        let err = LocalWallet::from_private_key("not-a-key").unwrap_err();
        assert!(matches!(err, LpError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_signed_transaction_is_legacy_encoded() {
        let wallet = LocalWallet::from_private_key(DEV_KEY).unwrap();
        let raw = wallet
            .sign_transaction(&UnsignedTransaction {
                chain_id: 8453,
                nonce: 7,
                gas_price: 1_000_000,
                gas_limit: 100_000,
                to: Address::repeat_byte(0x11),
                data: Bytes::from_static(&[0xde, 0xad]),
            })
            .await
            .unwrap();

        // Legacy transactions are bare RLP lists
        assert!(raw[0] >= 0xc0);
    }
}
