//! Pool state reads and range computation

use std::sync::Arc;

use aero_math::{compute_range, sqrt_price_x96_to_price, tick_to_price};
use alloy::primitives::aliases::I24;
use alloy::primitives::U256;
use tracing::{debug, warn};

use crate::abi::IClPool;
use crate::chain::{read_contract, ChainClient};
use crate::core::{LpError, LpResult, PoolDescriptor, PoolStatus, RangeParams};

/// Price and tick as reported by `slot0()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Read-only pool queries
#[derive(Clone)]
pub struct PoolStateReader {
    client: Arc<dyn ChainClient>,
}

impl PoolStateReader {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    pub async fn slot0(&self, pool: &PoolDescriptor) -> LpResult<Slot0> {
        let slot0 = read_contract(self.client.as_ref(), pool.pool, &IClPool::slot0Call {}, "slot0").await?;

        Ok(Slot0 {
            sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
            tick: int24_to_i32(slot0.tick, "slot0")?,
        })
    }

    pub async fn tick_spacing(&self, pool: &PoolDescriptor) -> LpResult<i32> {
        let spacing = read_contract(
            self.client.as_ref(),
            pool.pool,
            &IClPool::tickSpacingCall {},
            "tickSpacing",
        )
        .await?;

        int24_to_i32(spacing, "tickSpacing")
    }

    /// Current price plus the range `range` would place around it.
    ///
    /// The on-chain tick spacing is authoritative; a registry disagreement is
    /// only logged.
    pub async fn pool_status(&self, pool: &PoolDescriptor, range: &RangeParams) -> LpResult<PoolStatus> {
        let slot0 = self.slot0(pool).await?;
        let tick_spacing = self.tick_spacing(pool).await?;

        if tick_spacing != pool.tick_spacing {
            warn!(
                pool = %pool.name,
                configured = pool.tick_spacing,
                on_chain = tick_spacing,
                "Tick spacing differs from registry, using on-chain value"
            );
        }

        let decimals_diff = pool.decimals_diff();
        let bounds = compute_range(slot0.tick, tick_spacing, range.lower_range, range.upper_range)?;

        let status = PoolStatus {
            sqrt_price_x96: slot0.sqrt_price_x96,
            tick_spacing,
            current_tick: slot0.tick,
            current_price: sqrt_price_x96_to_price(slot0.sqrt_price_x96, decimals_diff),
            lower_tick: bounds.lower,
            upper_tick: bounds.upper,
            lower_price: tick_to_price(bounds.lower, decimals_diff),
            upper_price: tick_to_price(bounds.upper, decimals_diff),
        };

        debug!(
            pool = %pool.name,
            current_tick = status.current_tick,
            lower_tick = status.lower_tick,
            upper_tick = status.upper_tick,
            current_price = status.current_price,
            "Pool status"
        );

        Ok(status)
    }
}

fn int24_to_i32(value: I24, context: &str) -> LpResult<i32> {
    i32::try_from(value).map_err(|e| LpError::chain_read(context, format!("int24 out of range: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TokenDescriptor;
    use crate::testing::MockChain;
    use alloy::primitives::Address;
    use alloy::sol_types::SolCall;

    fn weth_usdc(tick_spacing: i32) -> PoolDescriptor {
        PoolDescriptor {
            name: "WETH/USDC".into(),
            pool: Address::repeat_byte(0x50),
            nft_manager: Address::repeat_byte(0x4e),
            token0: TokenDescriptor {
                symbol: "WETH".into(),
                address: Address::repeat_byte(0x0e),
                decimals: 18,
            },
            token1: TokenDescriptor {
                symbol: "USDC".into(),
                address: Address::repeat_byte(0x0c),
                decimals: 6,
            },
            tick_spacing,
        }
    }

    #[tokio::test]
    async fn test_pool_status_brackets_current_tick() {
        let chain = Arc::new(MockChain::new());
        let pool = weth_usdc(100);
        chain.set_slot0(pool.pool, U256::from(1u128 << 96), 250);
        chain.set_tick_spacing(pool.pool, 100);

        let reader = PoolStateReader::new(chain);
        let status = reader
            .pool_status(&pool, &RangeParams::range_only(3, 3))
            .await
            .unwrap();

        assert_eq!(status.current_tick, 250);
        assert_eq!(status.lower_tick, -100);
        assert_eq!(status.upper_tick, 600);
        assert!(status.lower_price < status.upper_price);
        assert!((status.current_price - 1e12).abs() / 1e12 < 1e-9);
    }

    #[tokio::test]
    async fn test_on_chain_spacing_wins() {
        let chain = Arc::new(MockChain::new());
        let pool = weth_usdc(100);
        chain.set_slot0(pool.pool, U256::from(1u128 << 96), -5);
        chain.set_tick_spacing(pool.pool, 10);

        let reader = PoolStateReader::new(chain);
        let status = reader
            .pool_status(&pool, &RangeParams::range_only(0, 0))
            .await
            .unwrap();

        assert_eq!(status.tick_spacing, 10);
        assert_eq!((status.lower_tick, status.upper_tick), (-10, 0));
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let chain = Arc::new(MockChain::new());
        let pool = weth_usdc(100);
        chain.fail_reads(IClPool::slot0Call::SELECTOR);

        let err = PoolStateReader::new(chain)
            .pool_status(&pool, &RangeParams::range_only(1, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, LpError::ChainRead { .. }));
    }
}
