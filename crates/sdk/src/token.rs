//! ERC-20 reads and approvals

use std::sync::Arc;

use aero_math::to_human_units;
use alloy::primitives::{Address, TxHash, U256};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::abi::IERC20;
use crate::chain::{read_contract, ChainClient, ContractCall};
use crate::core::{LpResult, TokenDescriptor};
use crate::tx::TransactionSender;

/// Read-only ERC-20 access
#[derive(Clone)]
pub struct TokenReader {
    client: Arc<dyn ChainClient>,
}

impl TokenReader {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub async fn decimals(&self, token: Address) -> LpResult<u8> {
        read_contract(self.client.as_ref(), token, &IERC20::decimalsCall {}, "decimals").await
    }

    /// Raw balance in base units
    pub async fn balance_of(&self, token: Address, owner: Address) -> LpResult<U256> {
        read_contract(
            self.client.as_ref(),
            token,
            &IERC20::balanceOfCall { account: owner },
            "balanceOf",
        )
        .await
    }

    /// Balance in human units
    pub async fn balance(&self, token: &TokenDescriptor, owner: Address) -> LpResult<Decimal> {
        let raw = self.balance_of(token.address, owner).await?;
        Ok(to_human_units(raw, token.decimals)?)
    }

    pub async fn allowance(&self, token: Address, owner: Address, spender: Address) -> LpResult<U256> {
        read_contract(
            self.client.as_ref(),
            token,
            &IERC20::allowanceCall { owner, spender },
            "allowance",
        )
        .await
    }

    /// Approve `spender` for exactly `amount` unless the current allowance
    /// already covers it. Returns the approval hash when one was sent.
    pub async fn ensure_allowance(
        &self,
        sender: &TransactionSender,
        token: &TokenDescriptor,
        spender: Address,
        amount: U256,
    ) -> LpResult<Option<TxHash>> {
        let current = self.allowance(token.address, sender.address(), spender).await?;
        if current >= amount {
            debug!(token = %token.symbol, %current, %amount, "Allowance sufficient, skipping approve");
            return Ok(None);
        }

        let call = ContractCall::new(token.address, &IERC20::approveCall { spender, amount });
        let receipt = sender.execute(call, "approve").await?;

        info!(token = %token.symbol, %amount, tx_hash = %receipt.transaction_hash, "Approved spender");
        Ok(Some(receipt.transaction_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockChain, MockWallet};
    use crate::tx::TxSettings;

    fn usdc() -> TokenDescriptor {
        TokenDescriptor {
            symbol: "USDC".into(),
            address: Address::repeat_byte(0x0c),
            decimals: 6,
        }
    }

    #[tokio::test]
    async fn test_balance_in_human_units() {
        let chain = Arc::new(MockChain::new());
        let owner = Address::repeat_byte(0xaa);
        chain.set_balance(usdc().address, owner, U256::from(2_500_000u64));

        let reader = TokenReader::new(chain);
        let balance = reader.balance(&usdc(), owner).await.unwrap();
        assert_eq!(balance, Decimal::new(25, 1));
    }

    #[tokio::test]
    async fn test_approve_only_when_needed() {
        let chain = Arc::new(MockChain::new());
        let owner = Address::repeat_byte(0xaa);
        let spender = Address::repeat_byte(0xbb);
        let sender = TransactionSender::new(
            chain.clone(),
            Arc::new(MockWallet::new(owner)),
            TxSettings::default(),
        );
        let reader = TokenReader::new(chain.clone());

        chain.set_allowance(usdc().address, owner, spender, U256::from(1_000u64));

        let skipped = reader
            .ensure_allowance(&sender, &usdc(), spender, U256::from(1_000u64))
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert!(chain.sent_transactions().is_empty());

        let sent = reader
            .ensure_allowance(&sender, &usdc(), spender, U256::from(1_001u64))
            .await
            .unwrap();
        assert!(sent.is_some());
        assert_eq!(chain.sent_transactions().len(), 1);
    }
}
