//! Descriptors, parameters and results shared across the SDK

use std::fmt;

use aero_math::decimals_diff;
use alloy::primitives::{Address, TxHash, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Descriptors
// ============================================================================

/// ERC-20 token identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// Immutable description of a pool and the NFT manager that mints its positions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolDescriptor {
    /// Registry key, e.g. `WETH/USDC`
    pub name: String,

    /// Pool contract
    pub pool: Address,

    /// Non-fungible position manager contract
    pub nft_manager: Address,

    pub token0: TokenDescriptor,
    pub token1: TokenDescriptor,

    /// Tick spacing the pool was deployed with
    pub tick_spacing: i32,
}

impl PoolDescriptor {
    /// `token0.decimals - token1.decimals`, used by every price conversion
    pub fn decimals_diff(&self) -> i32 {
        decimals_diff(self.token0.decimals, self.token1.decimals)
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Caller-supplied parameters for opening a position.
///
/// `lower_range` and `upper_range` count tick spacings added below and above
/// the spacing interval that contains the current tick. They are not
/// percentages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeParams {
    /// Maximum token0 to deposit, human units
    pub token0_max: Decimal,

    /// Maximum token1 to deposit, human units
    pub token1_max: Decimal,

    pub lower_range: u32,
    pub upper_range: u32,
}

impl RangeParams {
    /// Range-only parameters, for status queries that deposit nothing
    pub fn range_only(lower_range: u32, upper_range: u32) -> Self {
        Self {
            token0_max: Decimal::ZERO,
            token1_max: Decimal::ZERO,
            lower_range,
            upper_range,
        }
    }
}

/// Minimum token outputs accepted when removing liquidity, base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlippageGuard {
    pub amount0_min: U256,
    pub amount1_min: U256,
}

/// Maximum amounts requested from `collect`, base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCollection {
    pub amount0_max: u128,
    pub amount1_max: u128,
}

impl Default for FeeCollection {
    /// Collect everything owed
    fn default() -> Self {
        Self {
            amount0_max: u128::MAX,
            amount1_max: u128::MAX,
        }
    }
}

// ============================================================================
// Pool Status
// ============================================================================

/// Snapshot of a pool's price and the range computed around it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStatus {
    pub sqrt_price_x96: U256,
    pub tick_spacing: i32,
    pub current_tick: i32,
    /// token1 per token0
    pub current_price: f64,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub lower_price: f64,
    pub upper_price: f64,
}

// ============================================================================
// Lifecycle Steps
// ============================================================================

/// Transactions submitted while opening a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenStep {
    ApproveToken0,
    ApproveToken1,
    Mint,
}

impl fmt::Display for OpenStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenStep::ApproveToken0 => write!(f, "approve-token0"),
            OpenStep::ApproveToken1 => write!(f, "approve-token1"),
            OpenStep::Mint => write!(f, "mint"),
        }
    }
}

/// Transactions submitted while closing a position, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseStep {
    DecreaseLiquidity,
    Collect,
    Burn,
}

impl fmt::Display for CloseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseStep::DecreaseLiquidity => write!(f, "decrease-liquidity"),
            CloseStep::Collect => write!(f, "collect"),
            CloseStep::Burn => write!(f, "burn"),
        }
    }
}

/// Outcome of a fully closed position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSummary {
    pub decrease_tx: TxHash,
    pub collect_tx: TxHash,
    pub burn_tx: TxHash,

    /// Liquidity removed by the decrease step
    pub liquidity_removed: u128,

    /// Tokens returned by the collect step, human units
    pub collected0: Decimal,
    pub collected1: Decimal,
}
