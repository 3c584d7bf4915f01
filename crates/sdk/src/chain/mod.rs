//! Chain access ports
//!
//! The lifecycle never talks to a transport directly. It consumes a
//! [`ChainClient`] for reads and raw broadcasts and a [`Wallet`] for the
//! signing address and signatures. [`rpc::RpcChainClient`] and
//! [`wallet::LocalWallet`] are the alloy-backed implementations;
//! [`crate::testing`] provides scripted doubles.

pub mod rpc;
pub mod wallet;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::core::{LpError, LpResult};

pub use rpc::RpcChainClient;
pub use wallet::LocalWallet;

// ============================================================================
// Transport-neutral transaction types
// ============================================================================

/// A contract method invocation, before nonce and gas are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
}

impl ContractCall {
    /// Encode `call` against the contract at `to`
    pub fn new<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            data: call.abi_encode().into(),
        }
    }
}

/// Fully priced legacy transaction, ready for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub data: Bytes,
}

/// One event log from a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Emitting contract
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Mined transaction outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    /// `true` when the transaction succeeded
    pub status: bool,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
}

// ============================================================================
// Ports
// ============================================================================

/// RPC operations consumed by the lifecycle
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> LpResult<u64>;

    async fn latest_block_number(&self) -> LpResult<u64>;

    /// Timestamp of the latest block, seconds
    async fn latest_block_timestamp(&self) -> LpResult<u64>;

    async fn gas_price(&self) -> LpResult<u128>;

    /// Next nonce for `address`, counting pending transactions
    async fn nonce(&self, address: Address) -> LpResult<u64>;

    /// Native (ETH) balance in wei
    async fn native_balance(&self, address: Address) -> LpResult<U256>;

    async fn estimate_gas(&self, from: Address, call: &ContractCall) -> LpResult<u64>;

    /// Read-only `eth_call` against the latest block
    async fn call(&self, call: &ContractCall) -> LpResult<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> LpResult<TxHash>;

    /// Receipt for `tx_hash`, `None` while unmined
    async fn transaction_receipt(&self, tx_hash: TxHash) -> LpResult<Option<TransactionReceipt>>;
}

/// Signing identity
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `tx` and return its raw EIP-2718 encoding
    async fn sign_transaction(&self, tx: &UnsignedTransaction) -> LpResult<Bytes>;
}

/// Run a read-only contract call and decode its return value
pub async fn read_contract<C: SolCall>(
    client: &dyn ChainClient,
    to: Address,
    call: &C,
    context: &str,
) -> LpResult<C::Return> {
    let output = client.call(&ContractCall::new(to, call)).await?;
    C::abi_decode_returns(&output)
        .map_err(|e| LpError::chain_read(context, format!("undecodable return data: {}", e)))
}
