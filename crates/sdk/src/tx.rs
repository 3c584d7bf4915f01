//! Transaction submission
//!
//! Every state-changing call goes through [`TransactionSender`]: estimate gas,
//! price it, take the wallet's next nonce immediately before signing, sign,
//! broadcast, and optionally block until the receipt arrives. Calls must be
//! awaited one at a time per wallet; the sender performs no nonce reservation
//! of its own.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, ContractCall, TransactionReceipt, UnsignedTransaction, Wallet};
use crate::core::{LpError, LpResult};

/// Default time to wait for a receipt
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(1000);

/// Default delay between receipt polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default headroom added to gas estimates, basis points
pub const DEFAULT_GAS_LIMIT_BUFFER_BPS: u32 = 2_000;

/// Submission tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    pub gas_limit_buffer_bps: u32,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            gas_limit_buffer_bps: DEFAULT_GAS_LIMIT_BUFFER_BPS,
        }
    }
}

/// Signs and broadcasts contract calls for one wallet
#[derive(Clone)]
pub struct TransactionSender {
    client: Arc<dyn ChainClient>,
    wallet: Arc<dyn Wallet>,
    settings: TxSettings,
}

impl TransactionSender {
    pub fn new(client: Arc<dyn ChainClient>, wallet: Arc<dyn Wallet>, settings: TxSettings) -> Self {
        Self {
            client,
            wallet,
            settings,
        }
    }

    /// Address transactions are sent from
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn settings(&self) -> &TxSettings {
        &self.settings
    }

    /// Sign and broadcast `call`, returning as soon as the node accepts it
    pub async fn submit(&self, call: ContractCall, context: &str) -> LpResult<TxHash> {
        let from = self.address();

        let chain_id = self.client.chain_id().await?;
        let estimate = self
            .client
            .estimate_gas(from, &call)
            .await
            .map_err(|e| LpError::chain_write(context, e))?;
        let gas_limit = apply_buffer(estimate, self.settings.gas_limit_buffer_bps);
        let gas_price = self.client.gas_price().await?;

        // Nonce last, right before signing
        let nonce = self.client.nonce(from).await?;

        let tx = UnsignedTransaction {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to: call.to,
            data: call.data,
        };

        let raw = self.wallet.sign_transaction(&tx).await?;
        let tx_hash = self
            .client
            .send_raw_transaction(raw)
            .await
            .map_err(|e| LpError::chain_write(context, e))?;

        info!(%tx_hash, nonce, gas_limit, gas_price, context, "Submitted transaction");
        Ok(tx_hash)
    }

    /// Poll for the receipt of `tx_hash` until it arrives or the timeout
    /// expires. Lookup errors are logged and retried.
    pub async fn wait_for_receipt(&self, tx_hash: TxHash) -> LpResult<TransactionReceipt> {
        let timeout = self.settings.receipt_timeout;

        match tokio::time::timeout(timeout, self.poll_receipt(tx_hash)).await {
            Ok(receipt) => Ok(receipt),
            Err(_) => {
                warn!(%tx_hash, ?timeout, "Gave up waiting for receipt");
                Err(LpError::ReceiptTimeout {
                    tx_hash,
                    waited: timeout,
                })
            }
        }
    }

    /// Only the timeout ends the wait: the transaction is already broadcast,
    /// so a failed lookup must not be mistaken for a failed transaction.
    async fn poll_receipt(&self, tx_hash: TxHash) -> TransactionReceipt {
        loop {
            match self.client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => debug!(%tx_hash, "Receipt not available yet"),
                Err(e) => warn!(%tx_hash, error = %e, "Receipt lookup failed, polling again"),
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Submit `call`, wait for its receipt and require success
    pub async fn execute(&self, call: ContractCall, context: &str) -> LpResult<TransactionReceipt> {
        let tx_hash = self.submit(call, context).await?;
        let receipt = self.wait_for_receipt(tx_hash).await?;

        if !receipt.status {
            return Err(LpError::Reverted {
                context: context.to_string(),
                tx_hash,
            });
        }

        debug!(%tx_hash, gas_used = receipt.gas_used, context, "Transaction confirmed");
        Ok(receipt)
    }
}

fn apply_buffer(estimate: u64, buffer_bps: u32) -> u64 {
    let buffered = u128::from(estimate) * (10_000 + u128::from(buffer_bps)) / 10_000;
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChain, MockWallet};

    fn sender(chain: Arc<MockChain>, settings: TxSettings) -> TransactionSender {
        TransactionSender::new(chain, Arc::new(MockWallet::new(Address::repeat_byte(0xaa))), settings)
    }

    #[test]
    fn test_gas_buffer() {
        assert_eq!(apply_buffer(100_000, 2_000), 120_000);
        assert_eq!(apply_buffer(100_000, 0), 100_000);
        assert_eq!(apply_buffer(u64::MAX, 10_000), u64::MAX);
    }

    #[tokio::test]
    async fn test_submit_assigns_fresh_nonce() {
        let chain = Arc::new(MockChain::new());
        let sender = sender(chain.clone(), TxSettings::default());
        let call = ContractCall {
            to: Address::repeat_byte(0x01),
            data: vec![1, 2, 3].into(),
        };

        sender.submit(call.clone(), "first").await.unwrap();
        sender.submit(call, "second").await.unwrap();

        let sent = chain.sent_transactions();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].nonce + 1, sent[1].nonce);
        assert_eq!(sent[0].gas_limit, 120_000);
    }

    #[tokio::test]
    async fn test_execute_reports_revert() {
        let chain = Arc::new(MockChain::new());
        chain.revert_calls_to(Address::repeat_byte(0x02));
        let sender = sender(chain.clone(), TxSettings::default());

        let err = sender
            .execute(
                ContractCall {
                    to: Address::repeat_byte(0x02),
                    data: Default::default(),
                },
                "approve",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LpError::Reverted { ref context, .. } if context == "approve"));
    }

    #[tokio::test]
    async fn test_wait_times_out_when_never_mined() {
        let chain = Arc::new(MockChain::new());
        chain.withhold_receipts();
        let settings = TxSettings {
            receipt_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(5),
            ..TxSettings::default()
        };
        let sender = sender(chain.clone(), settings);

        let tx_hash = sender
            .submit(
                ContractCall {
                    to: Address::repeat_byte(0x03),
                    data: Default::default(),
                },
                "burn",
            )
            .await
            .unwrap();
        let err = sender.wait_for_receipt(tx_hash).await.unwrap_err();

        assert!(matches!(err, LpError::ReceiptTimeout { tx_hash: hash, .. } if hash == tx_hash));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_wait_outlasts_failed_lookups() {
        let chain = Arc::new(MockChain::new());
        chain.fail_receipt_lookups(2);
        let settings = TxSettings {
            poll_interval: Duration::from_millis(1),
            ..TxSettings::default()
        };
        let sender = sender(chain.clone(), settings);

        let receipt = sender
            .execute(
                ContractCall {
                    to: Address::repeat_byte(0x04),
                    data: Default::default(),
                },
                "collect",
            )
            .await
            .unwrap();

        assert!(receipt.status);
        assert_eq!(receipt.transaction_hash, chain.sent_transactions()[0].hash);
    }
}
