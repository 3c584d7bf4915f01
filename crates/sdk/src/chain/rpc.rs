//! JSON-RPC chain client backed by an alloy HTTP provider

use alloy::eips::BlockNumberOrTag;
use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt as RpcReceipt, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ChainClient, ContractCall, LogEntry, TransactionReceipt};
use crate::core::{LpError, LpResult};

/// Chain client over an HTTP JSON-RPC endpoint
pub struct RpcChainClient {
    provider: DynProvider,
    url: Url,
}

impl RpcChainClient {
    /// Connect to `rpc_url` and verify the endpoint answers
    pub async fn connect(rpc_url: &str) -> LpResult<Self> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| LpError::Configuration(format!("Invalid RPC url: {}", e)))?;

        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(url.clone())
            .erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| LpError::chain_read("connect", e))?;

        // Never log the full url: provider keys live in the path
        info!(chain_id, host = url.host_str().unwrap_or_default(), "Connected to RPC endpoint");

        Ok(Self { provider, url })
    }

    /// Host of the connected endpoint
    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }

    fn request(call: &ContractCall) -> TransactionRequest {
        TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.data.clone())
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> LpResult<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| LpError::chain_read("eth_chainId", e))
    }

    async fn latest_block_number(&self) -> LpResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| LpError::chain_read("eth_blockNumber", e))
    }

    async fn latest_block_timestamp(&self) -> LpResult<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| LpError::chain_read("eth_getBlockByNumber", e))?
            .ok_or_else(|| LpError::chain_read("eth_getBlockByNumber", "latest block not available"))?;

        Ok(block.header.timestamp)
    }

    async fn gas_price(&self) -> LpResult<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| LpError::chain_read("eth_gasPrice", e))
    }

    async fn nonce(&self, address: Address) -> LpResult<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| LpError::chain_read("eth_getTransactionCount", e))
    }

    async fn native_balance(&self, address: Address) -> LpResult<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| LpError::chain_read("eth_getBalance", e))
    }

    async fn estimate_gas(&self, from: Address, call: &ContractCall) -> LpResult<u64> {
        let request = Self::request(call).with_from(from);
        self.provider
            .estimate_gas(request)
            .await
            .map_err(|e| LpError::chain_write("eth_estimateGas", e))
    }

    async fn call(&self, call: &ContractCall) -> LpResult<Bytes> {
        self.provider
            .call(Self::request(call))
            .await
            .map_err(|e| LpError::chain_read("eth_call", e))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> LpResult<TxHash> {
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| LpError::chain_write("eth_sendRawTransaction", e))?;

        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "Broadcast raw transaction");
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> LpResult<Option<TransactionReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| LpError::chain_read("eth_getTransactionReceipt", e))?;

        Ok(receipt.map(convert_receipt))
    }
}

fn convert_receipt(receipt: RpcReceipt) -> TransactionReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| LogEntry {
            address: log.inner.address,
            topics: log.inner.data.topics().to_vec(),
            data: log.inner.data.data.clone(),
        })
        .collect();

    TransactionReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        status: receipt.status(),
        gas_used: receipt.gas_used,
        logs,
    }
}
