//! Entry point for operators
//!
//! [`ConnectorBuilder`] gathers the registry, provider selection and
//! credentials, validates them, and connects. The resulting [`Connector`] is
//! immutable and hands out readers and position managers that share its
//! client and wallet.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::info;

use crate::chain::{ChainClient, LocalWallet, RpcChainClient, Wallet};
use crate::config::{ProviderKind, Registry};
use crate::core::{LpError, LpResult, PoolStatus, RangeParams};
use crate::pool::PoolStateReader;
use crate::position::PositionManager;
use crate::token::TokenReader;
use crate::tx::{TransactionSender, TxSettings};

/// Staged construction of a [`Connector`]
#[derive(Default)]
pub struct ConnectorBuilder {
    registry: Registry,
    provider: Option<ProviderKind>,
    project_id: Option<String>,
    rpc_url: Option<String>,
    private_key: Option<String>,
    settings: Option<TxSettings>,
    client: Option<Arc<dyn ChainClient>>,
    wallet: Option<Arc<dyn Wallet>>,
}

impl ConnectorBuilder {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Override the provider named in the registry's network section
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Infura or Alchemy project id
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Explicit endpoint; takes precedence over provider selection
    pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// Signing key. Without one the connector is read-only.
    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    pub fn tx_settings(mut self, settings: TxSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Use an existing client instead of connecting
    pub fn client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use an existing wallet instead of a private key
    pub fn wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Validate credentials, then connect
    pub async fn build(self) -> LpResult<Connector> {
        let network = self.registry.network().clone();
        let settings = self.settings.unwrap_or_else(|| network.tx_settings());

        // Credentials first so a bad key fails before any network traffic
        let wallet: Option<Arc<dyn Wallet>> = match (self.wallet, self.private_key) {
            (Some(wallet), _) => Some(wallet),
            (None, Some(key)) => Some(Arc::new(LocalWallet::from_private_key(&key)?)),
            (None, None) => None,
        };

        let (client, endpoint_host): (Arc<dyn ChainClient>, Option<String>) = match self.client {
            Some(client) => (client, None),
            None => {
                let endpoint = match self.rpc_url {
                    Some(url) => url,
                    None => {
                        let provider = self.provider.unwrap_or(network.provider);
                        network.endpoint(provider, self.project_id.as_deref())?
                    }
                };
                let rpc = RpcChainClient::connect(&endpoint).await?;
                let host = rpc.host();
                (Arc::new(rpc), Some(host))
            }
        };

        info!(
            pools = self.registry.pools().count(),
            wallet = ?wallet.as_ref().map(|w| w.address()),
            "Connector ready"
        );

        Ok(Connector {
            client,
            wallet,
            registry: Arc::new(self.registry),
            settings,
            endpoint_host,
        })
    }
}

/// Connected, validated access to the registry's pools
#[derive(Clone)]
pub struct Connector {
    client: Arc<dyn ChainClient>,
    wallet: Option<Arc<dyn Wallet>>,
    registry: Arc<Registry>,
    settings: TxSettings,
    endpoint_host: Option<String>,
}

impl Connector {
    /// Assemble from already-built parts
    pub fn from_parts(
        registry: Registry,
        client: Arc<dyn ChainClient>,
        wallet: Option<Arc<dyn Wallet>>,
        settings: TxSettings,
    ) -> Self {
        Self {
            client,
            wallet,
            registry: Arc::new(registry),
            settings,
            endpoint_host: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Host of the RPC endpoint, when connected over RPC
    pub fn endpoint_host(&self) -> Option<&str> {
        self.endpoint_host.as_deref()
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(|wallet| wallet.address())
    }

    pub async fn latest_block_number(&self) -> LpResult<u64> {
        self.client.latest_block_number().await
    }

    /// Native balance in wei
    pub async fn native_balance(&self, address: Address) -> LpResult<U256> {
        self.client.native_balance(address).await
    }

    /// Balance of a registry token, human units
    pub async fn token_balance(&self, symbol: &str, owner: Address) -> LpResult<Decimal> {
        let token = self.registry.token(symbol)?;
        TokenReader::new(self.client.clone()).balance(token, owner).await
    }

    pub async fn pool_status(&self, pool_name: &str, range: &RangeParams) -> LpResult<PoolStatus> {
        let pool = self.registry.pool(pool_name)?;
        PoolStateReader::new(self.client.clone()).pool_status(pool, range).await
    }

    /// Manager for a new position in `pool_name`
    pub fn position_manager(&self, pool_name: &str) -> LpResult<PositionManager> {
        let pool = self.registry.pool(pool_name)?.clone();
        Ok(PositionManager::new(pool, self.sender()?))
    }

    /// Manager for an existing position NFT in `pool_name`
    pub fn resume_position(&self, pool_name: &str, token_id: U256) -> LpResult<PositionManager> {
        let pool = self.registry.pool(pool_name)?.clone();
        Ok(PositionManager::resume(pool, self.sender()?, token_id))
    }

    fn sender(&self) -> LpResult<TransactionSender> {
        let wallet = self
            .wallet
            .clone()
            .ok_or_else(|| LpError::Configuration("a private key is required to send transactions".into()))?;
        Ok(TransactionSender::new(self.client.clone(), wallet, self.settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LpConfig;
    use crate::testing::{MockChain, MockWallet};

    fn registry() -> Registry {
        let config = LpConfig::from_toml_str(
            r#"
[[tokens]]
symbol = "WETH"
address = "0x4200000000000000000000000000000000000006"
decimals = 18

[[tokens]]
symbol = "USDC"
address = "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
decimals = 6

[[pools]]
name = "WETH/USDC"
pool = "0xb2cc224c1c9fee385f8ad6a55b4d94e92359dc59"
nft_manager = "0x827922686190790b37229fd06084350e74485b72"
token0 = "WETH"
token1 = "USDC"
tick_spacing = 100
"#,
        )
        .unwrap();
        Registry::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_read_only_connector_refuses_writes() {
        let chain = Arc::new(MockChain::new());
        let connector = ConnectorBuilder::new(registry())
            .client(chain)
            .build()
            .await
            .unwrap();

        assert!(connector.wallet_address().is_none());
        assert!(connector.endpoint_host().is_none());
        assert!(matches!(connector.position_manager("WETH/USDC"), Err(LpError::Configuration(_))));
        assert!(matches!(connector.position_manager("WETH/DAI"), Err(LpError::Validation(_))));
    }

    #[tokio::test]
    async fn test_bad_private_key_fails_before_connecting() {
        let result = ConnectorBuilder::new(Registry::default())
            .private_key("0xnot-a-key")
            .rpc_url("http://127.0.0.1:1")
            .build()
            .await;

        assert!(matches!(result, Err(LpError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_project_id_is_configuration_error() {
        let result = ConnectorBuilder::new(Registry::default())
            .provider(ProviderKind::Alchemy)
            .build()
            .await;

        assert!(matches!(result, Err(LpError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_native_balance_and_block() {
        let chain = Arc::new(MockChain::new());
        let owner = Address::repeat_byte(0xaa);
        chain.set_native_balance(owner, U256::from(42u8));

        let connector = Connector::from_parts(
            Registry::default(),
            chain,
            Some(Arc::new(MockWallet::new(owner))),
            TxSettings::default(),
        );

        assert_eq!(connector.wallet_address(), Some(owner));
        assert_eq!(connector.native_balance(owner).await.unwrap(), U256::from(42u8));
        assert_eq!(connector.latest_block_number().await.unwrap(), 1);
    }
}
