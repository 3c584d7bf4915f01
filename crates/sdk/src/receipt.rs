//! Receipt log parsing
//!
//! Token amounts are taken from logs emitted by the token contracts
//! themselves. When a token emits more than one log in the same receipt the
//! last one wins; logs are matched by address only, not by event signature.

use aero_math::to_human_units;
use alloy::primitives::U256;
use rust_decimal::Decimal;
use tracing::debug;

use crate::chain::{LogEntry, TransactionReceipt};
use crate::core::{LpError, LpResult, PoolDescriptor};

/// Position id and deposited amounts recovered from a mint receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutcome {
    pub nft_token_id: U256,
    pub amount0: Decimal,
    pub amount1: Decimal,
}

/// Amounts paid out by a collect transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CollectOutcome {
    pub amount0: Decimal,
    pub amount1: Decimal,
}

/// Recover the minted position from `receipt`.
///
/// The position id comes from the NFT manager log carrying exactly two
/// topics, read from the second topic. A receipt without such a log is
/// rejected. A token with no log yields a zero amount.
pub fn parse_mint_receipt(receipt: &TransactionReceipt, pool: &PoolDescriptor) -> LpResult<MintOutcome> {
    let (amount0, amount1) = token_amounts(receipt, pool)?;

    let nft_token_id = receipt
        .logs
        .iter()
        .rev()
        .find(|log| log.address == pool.nft_manager && log.topics.len() == 2)
        .map(|log| U256::from_be_bytes(log.topics[1].0))
        .ok_or_else(|| {
            LpError::MalformedReceipt(format!(
                "no two-topic log from position manager {} in {}",
                pool.nft_manager, receipt.transaction_hash
            ))
        })?;

    debug!(%nft_token_id, %amount0, %amount1, tx_hash = %receipt.transaction_hash, "Parsed mint receipt");

    Ok(MintOutcome {
        nft_token_id,
        amount0,
        amount1,
    })
}

/// Recover collected token amounts from a collect receipt
pub fn parse_collect_receipt(receipt: &TransactionReceipt, pool: &PoolDescriptor) -> LpResult<CollectOutcome> {
    let (amount0, amount1) = token_amounts(receipt, pool)?;
    debug!(%amount0, %amount1, tx_hash = %receipt.transaction_hash, "Parsed collect receipt");
    Ok(CollectOutcome { amount0, amount1 })
}

fn token_amounts(receipt: &TransactionReceipt, pool: &PoolDescriptor) -> LpResult<(Decimal, Decimal)> {
    let mut amount0 = Decimal::ZERO;
    let mut amount1 = Decimal::ZERO;

    for log in &receipt.logs {
        if log.address == pool.token0.address {
            amount0 = to_human_units(log_value(log)?, pool.token0.decimals)?;
        }
        if log.address == pool.token1.address {
            amount1 = to_human_units(log_value(log)?, pool.token1.decimals)?;
        }
    }

    Ok((amount0, amount1))
}

fn log_value(log: &LogEntry) -> LpResult<U256> {
    U256::try_from_be_slice(&log.data).ok_or_else(|| {
        LpError::MalformedReceipt(format!(
            "log data from {} is {} bytes, expected at most 32",
            log.address,
            log.data.len()
        ))
    })
}
