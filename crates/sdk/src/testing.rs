//! Testing utilities
//!
//! [`MockChain`] is an in-memory [`ChainClient`] that answers the contract
//! reads the lifecycle performs from scripted state, mines every broadcast
//! transaction immediately, and records what was sent. [`MockWallet`] pairs
//! with it: its "signature" is a plain encoding the chain can decode.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::aliases::{I24, U160, U96};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::abi::{IClPool, INonfungiblePositionManager as Npm, IERC20};
use crate::chain::{ChainClient, ContractCall, LogEntry, TransactionReceipt, UnsignedTransaction, Wallet};
use crate::core::{LpError, LpResult};

/// Function selector
pub type Selector = [u8; 4];

const MOCK_CHAIN_ID: u64 = 8453;
const MOCK_GAS_ESTIMATE: u64 = 100_000;
const MOCK_GAS_PRICE: u128 = 1_000_000;

/// A transaction as the mock chain received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub data: Bytes,
}

impl SentTransaction {
    pub fn selector(&self) -> Option<Selector> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Default)]
struct MockState {
    block_number: u64,
    block_timestamp: u64,
    nonces: HashMap<Address, u64>,
    native_balances: HashMap<Address, U256>,
    slot0: HashMap<Address, (U256, i32)>,
    tick_spacing: HashMap<Address, i32>,
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    liquidity: HashMap<(Address, U256), u128>,
    scripted_logs: HashMap<Selector, Vec<LogEntry>>,
    failing_reads: HashSet<Selector>,
    failing_submissions: HashSet<Selector>,
    reverting_selectors: HashSet<Selector>,
    reverting_targets: HashSet<Address>,
    withhold_receipts: bool,
    failing_receipt_lookups: u32,
    receipts: HashMap<TxHash, TransactionReceipt>,
    sent: Vec<SentTransaction>,
}

/// Scripted in-memory chain
pub struct MockChain {
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                block_number: 1,
                block_timestamp: 1_700_000_000,
                ..MockState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic in another test thread must not cascade
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------

    pub fn set_block_timestamp(&self, timestamp: u64) {
        self.state().block_timestamp = timestamp;
    }

    pub fn set_native_balance(&self, owner: Address, wei: U256) {
        self.state().native_balances.insert(owner, wei);
    }

    pub fn set_slot0(&self, pool: Address, sqrt_price_x96: U256, tick: i32) {
        self.state().slot0.insert(pool, (sqrt_price_x96, tick));
    }

    pub fn set_tick_spacing(&self, pool: Address, tick_spacing: i32) {
        self.state().tick_spacing.insert(pool, tick_spacing);
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.state().decimals.insert(token, decimals);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((token, owner, spender), amount);
    }

    pub fn set_liquidity(&self, nft_manager: Address, token_id: U256, liquidity: u128) {
        self.state().liquidity.insert((nft_manager, token_id), liquidity);
    }

    /// Logs attached to the receipt of every transaction calling `selector`
    pub fn script_logs(&self, selector: Selector, logs: Vec<LogEntry>) {
        self.state().scripted_logs.insert(selector, logs);
    }

    /// Make read calls to `selector` fail
    pub fn fail_reads(&self, selector: Selector) {
        self.state().failing_reads.insert(selector);
    }

    /// Make gas estimation for `selector` fail, so the transaction is never sent
    pub fn fail_submissions(&self, selector: Selector) {
        self.state().failing_submissions.insert(selector);
    }

    /// Mine transactions calling `selector` with a failing status
    pub fn revert_selector(&self, selector: Selector) {
        self.state().reverting_selectors.insert(selector);
    }

    /// Mine every transaction sent to `target` with a failing status
    pub fn revert_calls_to(&self, target: Address) {
        self.state().reverting_targets.insert(target);
    }

    /// Accept transactions but never report a receipt
    pub fn withhold_receipts(&self) {
        self.state().withhold_receipts = true;
    }

    /// Fail the next `count` receipt lookups with a transport error
    pub fn fail_receipt_lookups(&self, count: u32) {
        self.state().failing_receipt_lookups = count;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state().sent.clone()
    }

    pub fn sent_selectors(&self) -> Vec<Selector> {
        self.state().sent.iter().filter_map(SentTransaction::selector).collect()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn liquidity(&self, nft_manager: Address, token_id: U256) -> Option<u128> {
        self.state().liquidity.get(&(nft_manager, token_id)).copied()
    }
}

fn selector_of(data: &[u8]) -> Option<Selector> {
    data.get(..4).and_then(|s| s.try_into().ok())
}

fn reverted(context: &str) -> LpError {
    LpError::chain_read(context, "execution reverted")
}

fn int24(value: i32) -> LpResult<I24> {
    I24::try_from(value).map_err(|_| reverted("int24"))
}

impl MockState {
    fn answer(&self, call: &ContractCall) -> LpResult<Vec<u8>> {
        let selector = selector_of(&call.data).ok_or_else(|| reverted("eth_call"))?;
        if self.failing_reads.contains(&selector) {
            return Err(LpError::chain_read("eth_call", "connection reset"));
        }

        let data = call.data.as_ref();
        match selector {
            IClPool::slot0Call::SELECTOR => {
                let (sqrt_price_x96, tick) =
                    self.slot0.get(&call.to).copied().ok_or_else(|| reverted("slot0"))?;
                Ok(IClPool::slot0Call::abi_encode_returns(&IClPool::slot0Return {
                    sqrtPriceX96: U160::saturating_from(sqrt_price_x96),
                    tick: int24(tick)?,
                    observationIndex: 0,
                    observationCardinality: 1,
                    observationCardinalityNext: 1,
                    unlocked: true,
                }))
            }
            IClPool::tickSpacingCall::SELECTOR => {
                let spacing = self
                    .tick_spacing
                    .get(&call.to)
                    .copied()
                    .ok_or_else(|| reverted("tickSpacing"))?;
                Ok(IClPool::tickSpacingCall::abi_encode_returns(&int24(spacing)?))
            }
            IERC20::decimalsCall::SELECTOR => {
                let decimals = self.decimals.get(&call.to).copied().ok_or_else(|| reverted("decimals"))?;
                Ok(IERC20::decimalsCall::abi_encode_returns(&decimals))
            }
            IERC20::balanceOfCall::SELECTOR => {
                let args = IERC20::balanceOfCall::abi_decode(data).map_err(|_| reverted("balanceOf"))?;
                let balance = self.balances.get(&(call.to, args.account)).copied().unwrap_or_default();
                Ok(IERC20::balanceOfCall::abi_encode_returns(&balance))
            }
            IERC20::allowanceCall::SELECTOR => {
                let args = IERC20::allowanceCall::abi_decode(data).map_err(|_| reverted("allowance"))?;
                let allowance = self
                    .allowances
                    .get(&(call.to, args.owner, args.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(IERC20::allowanceCall::abi_encode_returns(&allowance))
            }
            Npm::positionsCall::SELECTOR => {
                let args = Npm::positionsCall::abi_decode(data).map_err(|_| reverted("positions"))?;
                let liquidity = self
                    .liquidity
                    .get(&(call.to, args.tokenId))
                    .copied()
                    .ok_or_else(|| reverted("positions"))?;
                Ok(Npm::positionsCall::abi_encode_returns(&Npm::positionsReturn {
                    nonce: U96::ZERO,
                    operator: Address::ZERO,
                    token0: Address::ZERO,
                    token1: Address::ZERO,
                    tickSpacing: I24::ZERO,
                    tickLower: I24::ZERO,
                    tickUpper: I24::ZERO,
                    liquidity,
                    feeGrowthInside0LastX128: U256::ZERO,
                    feeGrowthInside1LastX128: U256::ZERO,
                    tokensOwed0: 0,
                    tokensOwed1: 0,
                }))
            }
            _ => Err(reverted("eth_call")),
        }
    }

    /// State changes of a successfully mined transaction
    fn apply(&mut self, tx: &SentTransaction) {
        let data = tx.data.as_ref();
        match tx.selector() {
            Some(IERC20::approveCall::SELECTOR) => {
                if let Ok(args) = IERC20::approveCall::abi_decode(data) {
                    self.allowances.insert((tx.to, tx.from, args.spender), args.amount);
                }
            }
            Some(Npm::decreaseLiquidityCall::SELECTOR) => {
                if let Ok(args) = Npm::decreaseLiquidityCall::abi_decode(data) {
                    if let Some(held) = self.liquidity.get_mut(&(tx.to, args.params.tokenId)) {
                        *held = held.saturating_sub(args.params.liquidity);
                    }
                }
            }
            Some(Npm::burnCall::SELECTOR) => {
                if let Ok(args) = Npm::burnCall::abi_decode(data) {
                    self.liquidity.remove(&(tx.to, args.tokenId));
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> LpResult<u64> {
        Ok(MOCK_CHAIN_ID)
    }

    async fn latest_block_number(&self) -> LpResult<u64> {
        Ok(self.state().block_number)
    }

    async fn latest_block_timestamp(&self) -> LpResult<u64> {
        Ok(self.state().block_timestamp)
    }

    async fn gas_price(&self) -> LpResult<u128> {
        Ok(MOCK_GAS_PRICE)
    }

    async fn nonce(&self, address: Address) -> LpResult<u64> {
        Ok(self.state().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn native_balance(&self, address: Address) -> LpResult<U256> {
        Ok(self.state().native_balances.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _from: Address, call: &ContractCall) -> LpResult<u64> {
        let failing = selector_of(&call.data).is_some_and(|s| self.state().failing_submissions.contains(&s));
        if failing {
            return Err(LpError::chain_write("eth_estimateGas", "execution reverted"));
        }
        Ok(MOCK_GAS_ESTIMATE)
    }

    async fn call(&self, call: &ContractCall) -> LpResult<Bytes> {
        self.state().answer(call).map(Bytes::from)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LpResult<TxHash> {
        let mut tx = MockWallet::decode(&raw)
            .ok_or_else(|| LpError::chain_write("eth_sendRawTransaction", "undecodable transaction"))?;
        tx.hash = keccak256(&raw);

        let mut state = self.state();
        let expected = state.nonces.get(&tx.from).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(LpError::chain_write(
                "eth_sendRawTransaction",
                format!("nonce {} but account is at {}", tx.nonce, expected),
            ));
        }
        state.nonces.insert(tx.from, expected + 1);

        let selector = tx.selector();
        let status = !state.reverting_targets.contains(&tx.to)
            && !selector.is_some_and(|s| state.reverting_selectors.contains(&s));
        if status {
            state.apply(&tx);
        }

        state.block_number += 1;
        let logs = selector
            .and_then(|s| state.scripted_logs.get(&s).cloned())
            .unwrap_or_default();
        let receipt = TransactionReceipt {
            transaction_hash: tx.hash,
            block_number: Some(state.block_number),
            status,
            gas_used: MOCK_GAS_ESTIMATE / 2,
            logs,
        };

        let hash = tx.hash;
        state.receipts.insert(hash, receipt);
        state.sent.push(tx);
        Ok(hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> LpResult<Option<TransactionReceipt>> {
        let mut state = self.state();
        if state.failing_receipt_lookups > 0 {
            state.failing_receipt_lookups -= 1;
            return Err(LpError::chain_read("eth_getTransactionReceipt", "502 bad gateway"));
        }
        if state.withhold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }
}

/// Wallet double for [`MockChain`]
#[derive(Debug, Clone)]
pub struct MockWallet {
    address: Address,
}

impl MockWallet {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    // from (20) | nonce (8) | gas limit (8) | to (20) | calldata
    fn encode(&self, tx: &UnsignedTransaction) -> Bytes {
        let mut raw = Vec::with_capacity(56 + tx.data.len());
        raw.extend_from_slice(self.address.as_slice());
        raw.extend_from_slice(&tx.nonce.to_be_bytes());
        raw.extend_from_slice(&tx.gas_limit.to_be_bytes());
        raw.extend_from_slice(tx.to.as_slice());
        raw.extend_from_slice(&tx.data);
        raw.into()
    }

    fn decode(raw: &[u8]) -> Option<SentTransaction> {
        if raw.len() < 56 {
            return None;
        }
        Some(SentTransaction {
            hash: TxHash::ZERO,
            from: Address::from_slice(&raw[..20]),
            nonce: u64::from_be_bytes(raw[20..28].try_into().ok()?),
            gas_limit: u64::from_be_bytes(raw[28..36].try_into().ok()?),
            to: Address::from_slice(&raw[36..56]),
            data: Bytes::copy_from_slice(&raw[56..]),
        })
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> LpResult<Bytes> {
        Ok(self.encode(tx))
    }
}
