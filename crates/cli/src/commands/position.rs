// Position open and close commands

use anyhow::{Context, Result};
use clap::Args;
use rust_decimal::Decimal;

use aero_math::to_base_units;
use aero_sdk::{FeeCollection, LpError, RangeParams, Registry, SlippageGuard};
use alloy_primitives::U256;

use super::utils::{connect, info, print_status, success, warn, ConnectionArgs};

#[derive(Args)]
pub struct OpenCmd {
    /// Pool name from the registry
    pool: String,

    /// Maximum token0 to deposit, human units
    #[arg(long)]
    amount0: Decimal,

    /// Maximum token1 to deposit, human units
    #[arg(long)]
    amount1: Decimal,

    /// Tick spacings added below the current interval
    #[arg(long, default_value = "1")]
    lower: u32,

    /// Tick spacings added above the current interval
    #[arg(long, default_value = "1")]
    upper: u32,
}

#[derive(Args)]
pub struct CloseCmd {
    /// Pool name from the registry
    pool: String,

    /// Position NFT id
    token_id: String,

    /// Minimum token0 returned by decreasing liquidity, human units
    #[arg(long, default_value = "0")]
    amount0_min: Decimal,

    /// Minimum token1 returned by decreasing liquidity, human units
    #[arg(long, default_value = "0")]
    amount1_min: Decimal,
}

pub async fn open(cmd: OpenCmd, registry: Registry, args: &ConnectionArgs) -> Result<()> {
    let range = RangeParams {
        token0_max: cmd.amount0,
        token1_max: cmd.amount1,
        lower_range: cmd.lower,
        upper_range: cmd.upper,
    };

    let connector = connect(registry, args, true).await?;
    let mut manager = connector.position_manager(&cmd.pool)?;

    info(&format!("Opening position in {}...", cmd.pool));
    let position = manager.open(&range).await.map_err(|e| report(&cmd.pool, e))?;

    if let Some(status) = position.start_pool_status() {
        print_status(&cmd.pool, status);
    }
    let token_id = position
        .nft_token_id()
        .context("Opened position has no token id")?;
    success(&format!(
        "Opened position {} depositing {} {} and {} {}",
        token_id,
        position.amount0().normalize(),
        position.pool().token0.symbol,
        position.amount1().normalize(),
        position.pool().token1.symbol,
    ));
    if let Some(tx) = position.mint_tx() {
        info(&format!("Mint transaction: {}", tx));
    }

    Ok(())
}

pub async fn close(cmd: CloseCmd, registry: Registry, args: &ConnectionArgs) -> Result<()> {
    let token_id: U256 = cmd
        .token_id
        .trim()
        .parse()
        .with_context(|| format!("Invalid token id: {}", cmd.token_id))?;

    let pool = registry.pool(&cmd.pool)?.clone();
    let min_amounts = SlippageGuard {
        amount0_min: to_base_units(cmd.amount0_min, pool.token0.decimals)?,
        amount1_min: to_base_units(cmd.amount1_min, pool.token1.decimals)?,
    };

    let connector = connect(registry, args, true).await?;
    let mut manager = connector.resume_position(&cmd.pool, token_id)?;

    info(&format!("Closing position {} in {}...", token_id, cmd.pool));
    let summary = manager
        .close(min_amounts, FeeCollection::default())
        .await
        .map_err(|e| report(&cmd.pool, e))?;

    success(&format!(
        "Closed position {}: removed liquidity {}, collected {} {} and {} {}",
        token_id,
        summary.liquidity_removed,
        summary.collected0.normalize(),
        pool.token0.symbol,
        summary.collected1.normalize(),
        pool.token1.symbol,
    ));
    info(&format!("Decrease: {}", summary.decrease_tx));
    info(&format!("Collect:  {}", summary.collect_tx));
    info(&format!("Burn:     {}", summary.burn_tx));

    Ok(())
}

/// Print what reached the chain before the failure, then hand the error back
fn report(pool: &str, err: LpError) -> anyhow::Error {
    if let LpError::CloseFailed { completed, .. } = &err {
        for (step, tx) in completed {
            warn(&format!("{} already completed in {}: {}", step, pool, tx));
        }
    }

    match err.pending_tx_hash() {
        Some(tx_hash) => warn(&format!(
            "Transaction {} was broadcast; check it on the explorer before running this command again",
            tx_hash
        )),
        None if err.is_retryable() => warn("Read failed before this step was broadcast; the step can be retried"),
        None => {}
    }
    anyhow::Error::new(err)
}
