//! Position lifecycle
//!
//! A [`PositionManager`] owns exactly one [`LiquidityPosition`] and drives it
//! through `Unopened -> Open -> Closing -> Closed`. Every transaction is
//! awaited to its receipt before the next one is built, so a manager never
//! has more than one transaction in flight.
//!
//! Opening is approve, approve, mint, parse. Closing is decrease, collect,
//! burn. Steps that already reached the chain are never rolled back: a failure
//! part way through is reported with the step that failed and the steps that
//! completed, and the individual step methods let an operator finish the job.

use aero_math::{to_base_units, MathError, MAX_TICK, MIN_TICK};
use alloy::primitives::aliases::{I24, U160};
use alloy::primitives::{Address, TxHash, U256};
use rust_decimal::Decimal;
use tracing::{field, info, info_span, warn, Instrument, Span};

use crate::abi::INonfungiblePositionManager as Npm;
use crate::chain::{read_contract, ContractCall, TransactionReceipt};
use crate::core::{
    CloseStep, CloseSummary, FeeCollection, LpError, LpResult, OpenStep, PoolDescriptor, PoolStatus,
    RangeParams, SlippageGuard,
};
use crate::pool::PoolStateReader;
use crate::receipt::{parse_collect_receipt, parse_mint_receipt, CollectOutcome};
use crate::token::TokenReader;
use crate::tx::TransactionSender;

/// Seconds added to the latest block timestamp to form transaction deadlines
pub const DEADLINE_GRACE_SECS: u64 = 180;

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    /// Nothing minted yet
    Unopened,
    /// Minted and holding liquidity
    Open,
    /// At least one close step was submitted
    Closing,
    /// Liquidity removed, fees collected, NFT burned
    Closed,
}

/// A concentrated liquidity position and what is known about it
#[derive(Debug, Clone)]
pub struct LiquidityPosition {
    pool: PoolDescriptor,
    state: PositionState,
    nft_token_id: Option<U256>,
    amount0: Decimal,
    amount1: Decimal,
    start_pool_status: Option<PoolStatus>,
    mint_tx: Option<TxHash>,
}

impl LiquidityPosition {
    fn unopened(pool: PoolDescriptor) -> Self {
        Self {
            pool,
            state: PositionState::Unopened,
            nft_token_id: None,
            amount0: Decimal::ZERO,
            amount1: Decimal::ZERO,
            start_pool_status: None,
            mint_tx: None,
        }
    }

    pub fn pool(&self) -> &PoolDescriptor {
        &self.pool
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn nft_token_id(&self) -> Option<U256> {
        self.nft_token_id
    }

    /// token0 deposited at mint, human units
    pub fn amount0(&self) -> Decimal {
        self.amount0
    }

    /// token1 deposited at mint, human units
    pub fn amount1(&self) -> Decimal {
        self.amount1
    }

    /// Pool status captured when the position was opened
    pub fn start_pool_status(&self) -> Option<&PoolStatus> {
        self.start_pool_status.as_ref()
    }

    pub fn mint_tx(&self) -> Option<TxHash> {
        self.mint_tx
    }
}

/// Drives one position through its lifecycle.
///
/// Methods take `&mut self`; run separate managers for separate positions.
pub struct PositionManager {
    sender: TransactionSender,
    pools: PoolStateReader,
    tokens: TokenReader,
    position: LiquidityPosition,
    span: Span,
}

impl PositionManager {
    /// Manager for a position not yet opened in `pool`
    pub fn new(pool: PoolDescriptor, sender: TransactionSender) -> Self {
        let span = info_span!("position", pool = %pool.name, token_id = field::Empty);
        let client = sender.client().clone();

        Self {
            pools: PoolStateReader::new(client.clone()),
            tokens: TokenReader::new(client),
            sender,
            position: LiquidityPosition::unopened(pool),
            span,
        }
    }

    /// Manager for a position minted elsewhere, e.g. recovered after a crash.
    ///
    /// Deposited amounts and the start status are unknown and left empty.
    pub fn resume(pool: PoolDescriptor, sender: TransactionSender, token_id: U256) -> Self {
        let mut manager = Self::new(pool, sender);
        manager.position.state = PositionState::Open;
        manager.position.nft_token_id = Some(token_id);
        manager.span.record("token_id", field::display(token_id));
        manager
    }

    pub fn position(&self) -> &LiquidityPosition {
        &self.position
    }

    pub fn pool(&self) -> &PoolDescriptor {
        &self.position.pool
    }

    /// Approve what is needed, mint, and record the minted position.
    ///
    /// Approvals that succeeded before a later failure stay on-chain. A mint
    /// that reverts yields [`LpError::MintFailed`]; a mint that succeeds but
    /// cannot be parsed yields [`LpError::UnrecordedMint`] and leaves the
    /// position unopened.
    pub async fn open(&mut self, range: &RangeParams) -> LpResult<&LiquidityPosition> {
        if self.position.state != PositionState::Unopened {
            return Err(LpError::Validation(format!(
                "position in {} is already {:?}",
                self.position.pool.name, self.position.state
            )));
        }

        let span = self.span.clone();
        self.open_steps(range).instrument(span).await?;
        Ok(&self.position)
    }

    async fn open_steps(&mut self, range: &RangeParams) -> LpResult<()> {
        let pool = self.position.pool.clone();

        let status = self.pools.pool_status(&pool, range).await?;
        let amount0 = to_base_units(range.token0_max, pool.token0.decimals)?;
        let amount1 = to_base_units(range.token1_max, pool.token1.decimals)?;

        info!(
            lower_tick = status.lower_tick,
            upper_tick = status.upper_tick,
            current_tick = status.current_tick,
            %amount0,
            %amount1,
            "Opening position"
        );

        self.tokens
            .ensure_allowance(&self.sender, &pool.token0, pool.nft_manager, amount0)
            .await
            .map_err(|e| open_failed(OpenStep::ApproveToken0, e))?;
        self.tokens
            .ensure_allowance(&self.sender, &pool.token1, pool.nft_manager, amount1)
            .await
            .map_err(|e| open_failed(OpenStep::ApproveToken1, e))?;

        let call = self
            .mint_call(&pool, &status, amount0, amount1)
            .await
            .map_err(|e| open_failed(OpenStep::Mint, e))?;
        let tx_hash = self
            .sender
            .submit(call, "mint")
            .await
            .map_err(|e| open_failed(OpenStep::Mint, e))?;
        let receipt = self
            .sender
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|e| open_failed(OpenStep::Mint, e))?;

        if !receipt.status {
            warn!(%tx_hash, "Mint reverted");
            return Err(LpError::MintFailed { tx_hash });
        }

        let minted = parse_mint_receipt(&receipt, &pool).map_err(|e| LpError::UnrecordedMint {
            tx_hash,
            source: Box::new(e),
        })?;

        self.span.record("token_id", field::display(minted.nft_token_id));
        info!(
            %tx_hash,
            token_id = %minted.nft_token_id,
            amount0 = %minted.amount0,
            amount1 = %minted.amount1,
            "Position opened"
        );

        let position = &mut self.position;
        position.state = PositionState::Open;
        position.nft_token_id = Some(minted.nft_token_id);
        position.amount0 = minted.amount0;
        position.amount1 = minted.amount1;
        position.start_pool_status = Some(status);
        position.mint_tx = Some(tx_hash);

        Ok(())
    }

    async fn mint_call(
        &self,
        pool: &PoolDescriptor,
        status: &PoolStatus,
        amount0: U256,
        amount1: U256,
    ) -> LpResult<ContractCall> {
        let params = Npm::MintParams {
            token0: pool.token0.address,
            token1: pool.token1.address,
            tickSpacing: int24(status.tick_spacing)?,
            tickLower: int24(status.lower_tick)?,
            tickUpper: int24(status.upper_tick)?,
            amount0Desired: amount0,
            amount1Desired: amount1,
            amount0Min: U256::ZERO,
            amount1Min: U256::ZERO,
            recipient: self.sender.address(),
            deadline: self.deadline().await?,
            // Zero: the pool already exists
            sqrtPriceX96: U160::ZERO,
        };

        Ok(ContractCall::new(pool.nft_manager, &Npm::mintCall { params }))
    }

    /// Remove all liquidity, collect everything owed up to `max_fees`, and
    /// burn the NFT.
    ///
    /// Fails with [`LpError::Validation`] before any transaction when the
    /// position has no token id. Otherwise a failing step yields
    /// [`LpError::CloseFailed`] naming it and the steps already on-chain. The
    /// position stays `Open` until the first close transaction is accepted
    /// and `Closing` from then until the burn succeeds.
    pub async fn close(&mut self, min_amounts: SlippageGuard, max_fees: FeeCollection) -> LpResult<CloseSummary> {
        self.closable_token_id()?;

        let span = self.span.clone();
        self.close_steps(min_amounts, max_fees).instrument(span).await
    }

    async fn close_steps(&mut self, min_amounts: SlippageGuard, max_fees: FeeCollection) -> LpResult<CloseSummary> {
        let mut completed = Vec::with_capacity(3);

        let (decrease_tx, liquidity_removed) = self
            .decrease_liquidity(min_amounts)
            .await
            .map_err(|e| close_failed(CloseStep::DecreaseLiquidity, &completed, e))?;
        completed.push((CloseStep::DecreaseLiquidity, decrease_tx));

        let (collect_tx, collected) = match self.collect_fees(max_fees).await {
            Ok(collected) => collected,
            Err(e) => {
                // Mined even though unparsed
                if let LpError::UnrecordedCollect { tx_hash, .. } = &e {
                    completed.push((CloseStep::Collect, *tx_hash));
                }
                return Err(close_failed(CloseStep::Collect, &completed, e));
            }
        };
        completed.push((CloseStep::Collect, collect_tx));

        let burn_tx = self
            .burn()
            .await
            .map_err(|e| close_failed(CloseStep::Burn, &completed, e))?;

        info!(%decrease_tx, %collect_tx, %burn_tx, "Position closed");

        Ok(CloseSummary {
            decrease_tx,
            collect_tx,
            burn_tx,
            liquidity_removed,
            collected0: collected.amount0,
            collected1: collected.amount1,
        })
    }

    /// Remove the position's entire on-chain liquidity
    pub async fn decrease_liquidity(&mut self, min_amounts: SlippageGuard) -> LpResult<(TxHash, u128)> {
        let token_id = self.closable_token_id()?;
        let liquidity = self.current_liquidity().await?;
        let deadline = self.deadline().await?;

        let call = ContractCall::new(
            self.position.pool.nft_manager,
            &Npm::decreaseLiquidityCall {
                params: Npm::DecreaseLiquidityParams {
                    tokenId: token_id,
                    liquidity,
                    amount0Min: min_amounts.amount0_min,
                    amount1Min: min_amounts.amount1_min,
                    deadline,
                },
            },
        );

        let receipt = self.close_step(call, "decreaseLiquidity").await?;

        info!(%liquidity, tx_hash = %receipt.transaction_hash, "Liquidity removed");
        Ok((receipt.transaction_hash, liquidity))
    }

    /// Collect tokens owed to the position into the wallet.
    ///
    /// A mined collect whose receipt cannot be parsed yields
    /// [`LpError::UnrecordedCollect`]; the tokens are already in the wallet.
    pub async fn collect_fees(&mut self, max_fees: FeeCollection) -> LpResult<(TxHash, CollectOutcome)> {
        let token_id = self.closable_token_id()?;

        let call = ContractCall::new(
            self.position.pool.nft_manager,
            &Npm::collectCall {
                params: Npm::CollectParams {
                    tokenId: token_id,
                    recipient: self.sender.address(),
                    amount0Max: max_fees.amount0_max,
                    amount1Max: max_fees.amount1_max,
                },
            },
        );

        let receipt = self.close_step(call, "collect").await?;
        let collected =
            parse_collect_receipt(&receipt, &self.position.pool).map_err(|e| LpError::UnrecordedCollect {
                tx_hash: receipt.transaction_hash,
                source: Box::new(e),
            })?;

        info!(
            amount0 = %collected.amount0,
            amount1 = %collected.amount1,
            tx_hash = %receipt.transaction_hash,
            "Collected"
        );
        Ok((receipt.transaction_hash, collected))
    }

    /// Burn the position NFT. The position must hold no liquidity or owed tokens.
    pub async fn burn(&mut self) -> LpResult<TxHash> {
        let token_id = self.closable_token_id()?;
        let call = ContractCall::new(self.position.pool.nft_manager, &Npm::burnCall { tokenId: token_id });

        let receipt = self.close_step(call, "burn").await?;
        self.position.state = PositionState::Closed;

        info!(tx_hash = %receipt.transaction_hash, "Position NFT burned");
        Ok(receipt.transaction_hash)
    }

    /// Liquidity currently held by the position, from `positions(tokenId)`
    pub async fn current_liquidity(&self) -> LpResult<u128> {
        let token_id = self.require_token_id()?;
        let position = read_contract(
            self.sender.client().as_ref(),
            self.position.pool.nft_manager,
            &Npm::positionsCall { tokenId: token_id },
            "positions",
        )
        .await?;

        Ok(position.liquidity)
    }

    /// Wallet that owns the position
    pub fn owner(&self) -> Address {
        self.sender.address()
    }

    /// Submit a close-phase transaction. The position counts as closing from
    /// the moment the node accepts it.
    async fn close_step(&mut self, call: ContractCall, context: &str) -> LpResult<TransactionReceipt> {
        let tx_hash = self.sender.submit(call, context).await?;
        self.position.state = PositionState::Closing;

        let receipt = self.sender.wait_for_receipt(tx_hash).await?;
        if !receipt.status {
            return Err(LpError::Reverted {
                context: context.to_string(),
                tx_hash,
            });
        }
        Ok(receipt)
    }

    fn require_token_id(&self) -> LpResult<U256> {
        self.position.nft_token_id.ok_or_else(|| {
            LpError::Validation(format!(
                "position in {} has no token id; open it or resume it first",
                self.position.pool.name
            ))
        })
    }

    fn closable_token_id(&self) -> LpResult<U256> {
        let token_id = self.require_token_id()?;
        if self.position.state == PositionState::Closed {
            return Err(LpError::Validation(format!("position {} is already closed", token_id)));
        }
        Ok(token_id)
    }

    async fn deadline(&self) -> LpResult<U256> {
        let now = self.sender.client().latest_block_timestamp().await?;
        Ok(U256::from(now.saturating_add(DEADLINE_GRACE_SECS)))
    }
}

fn int24(tick: i32) -> LpResult<I24> {
    I24::try_from(tick).map_err(|_| {
        LpError::Math(MathError::TickOutOfBounds {
            tick: i64::from(tick),
            min: MIN_TICK,
            max: MAX_TICK,
        })
    })
}

fn open_failed(step: OpenStep, source: LpError) -> LpError {
    warn!(%step, error = %source, "Open step failed");
    LpError::OpenFailed {
        step,
        source: Box::new(source),
    }
}

fn close_failed(step: CloseStep, completed: &[(CloseStep, TxHash)], source: LpError) -> LpError {
    warn!(%step, completed = completed.len(), error = %source, "Close step failed, position left partially closed");
    LpError::CloseFailed {
        step,
        completed: completed.to_vec(),
        source: Box::new(source),
    }
}
