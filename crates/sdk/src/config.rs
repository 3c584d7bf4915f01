//! Operator configuration and the pool/token registry
//!
//! Loaded from a TOML file, validated once, then shared read-only:
//!
//! ```toml
//! log_filter = "info,aero_sdk::receipt=debug"
//!
//! [network]
//! provider = "infura"
//!
//! [[tokens]]
//! symbol = "WETH"
//! address = "0x4200000000000000000000000000000000000006"
//! decimals = 18
//!
//! [[pools]]
//! name = "WETH/USDC"
//! pool = "0xb2cc224c1c9fee385f8ad6a55b4d94e92359dc59"
//! nft_manager = "0x827922686190790b37229fd06084350e74485b72"
//! token0 = "WETH"
//! token1 = "USDC"
//! tick_spacing = 100
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use aero_math::MAX_DECIMALS;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::core::{LpError, LpResult, PoolDescriptor, TokenDescriptor};
use crate::tx::{TxSettings, DEFAULT_GAS_LIMIT_BUFFER_BPS};

const INFURA_BASE_URL: &str = "https://base-mainnet.infura.io/v3";
const ALCHEMY_BASE_URL: &str = "https://base-mainnet.g.alchemy.com/v2";

/// RPC provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Infura,
    Alchemy,
    /// Explicit `rpc_url`
    Custom,
}

impl FromStr for ProviderKind {
    type Err = LpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "infura" => Ok(ProviderKind::Infura),
            "alchemy" => Ok(ProviderKind::Alchemy),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(LpError::Configuration(format!("Unsupported provider: {}", other))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Infura => write!(f, "infura"),
            ProviderKind::Alchemy => write!(f, "alchemy"),
            ProviderKind::Custom => write!(f, "custom"),
        }
    }
}

/// RPC endpoint and transaction submission settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Endpoint for the `custom` provider
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Seconds to wait for a receipt
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Headroom added to gas estimates, basis points
    #[serde(default = "default_gas_limit_buffer_bps")]
    pub gas_limit_buffer_bps: u32,
}

fn default_receipt_timeout_secs() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_gas_limit_buffer_bps() -> u32 {
    DEFAULT_GAS_LIMIT_BUFFER_BPS
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            rpc_url: None,
            receipt_timeout_secs: default_receipt_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            gas_limit_buffer_bps: default_gas_limit_buffer_bps(),
        }
    }
}

impl NetworkConfig {
    /// Resolve the endpoint for `provider`. Provider keys come from the
    /// environment, never from the file.
    pub fn endpoint(&self, provider: ProviderKind, project_id: Option<&str>) -> LpResult<String> {
        let require_id = |name: &str| {
            project_id
                .filter(|id| !id.trim().is_empty())
                .map(|id| id.trim().to_string())
                .ok_or_else(|| LpError::Configuration(format!("{} requires a project id", name)))
        };

        match provider {
            ProviderKind::Infura => Ok(format!("{}/{}", INFURA_BASE_URL, require_id("infura")?)),
            ProviderKind::Alchemy => Ok(format!("{}/{}", ALCHEMY_BASE_URL, require_id("alchemy")?)),
            ProviderKind::Custom => self
                .rpc_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .ok_or_else(|| LpError::Configuration("custom provider requires network.rpc_url".into())),
        }
    }

    pub fn tx_settings(&self) -> TxSettings {
        TxSettings {
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            gas_limit_buffer_bps: self.gas_limit_buffer_bps,
        }
    }

    fn validate(&self) -> LpResult<()> {
        if self.receipt_timeout_secs == 0 {
            return Err(LpError::Configuration("network.receipt_timeout_secs must be greater than 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(LpError::Configuration("network.poll_interval_ms must be greater than 0".into()));
        }
        if self.gas_limit_buffer_bps > 10_000 {
            return Err(LpError::Configuration(format!(
                "network.gas_limit_buffer_bps is {}, at most 10000 (100%)",
                self.gas_limit_buffer_bps
            )));
        }
        Ok(())
    }
}

/// Token entry as written in the file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    #[serde(with = "address_serde")]
    pub address: Address,
    pub decimals: u8,
}

/// Pool entry as written in the file; tokens are referenced by symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    #[serde(with = "address_serde")]
    pub pool: Address,
    #[serde(with = "address_serde")]
    pub nft_manager: Address,
    pub token0: String,
    pub token1: String,
    pub tick_spacing: i32,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LpConfig {
    /// `tracing` filter directives, e.g. `info,aero_sdk::receipt=debug`
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub tokens: Vec<TokenConfig>,

    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

impl LpConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> LpResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LpError::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
            .map_err(|e| LpError::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> LpResult<Self> {
        toml::from_str(content).map_err(|e| LpError::Configuration(format!("Failed to parse config: {}", e)))
    }
}

/// Immutable lookup of pools by name and tokens by symbol
#[derive(Debug, Clone, Default)]
pub struct Registry {
    log_filter: Option<String>,
    network: NetworkConfig,
    tokens: BTreeMap<String, TokenDescriptor>,
    pools: BTreeMap<String, PoolDescriptor>,
}

impl Registry {
    /// Load and validate `path`
    pub fn load(path: impl AsRef<Path>) -> LpResult<Self> {
        Self::from_config(LpConfig::load(path)?)
    }

    /// Validate `config` and resolve pool token references
    pub fn from_config(config: LpConfig) -> LpResult<Self> {
        config.network.validate()?;

        let mut tokens = BTreeMap::new();
        for token in config.tokens {
            if token.symbol.trim().is_empty() {
                return Err(LpError::Configuration("token symbol must not be empty".into()));
            }
            if token.address == Address::ZERO {
                return Err(LpError::Configuration(format!("token {} has the zero address", token.symbol)));
            }
            if token.decimals > MAX_DECIMALS {
                return Err(LpError::Configuration(format!(
                    "token {} has {} decimals, at most {} supported",
                    token.symbol, token.decimals, MAX_DECIMALS
                )));
            }

            let descriptor = TokenDescriptor {
                symbol: token.symbol.clone(),
                address: token.address,
                decimals: token.decimals,
            };
            if tokens.insert(token.symbol.clone(), descriptor).is_some() {
                return Err(LpError::Configuration(format!("duplicate token {}", token.symbol)));
            }
        }

        let mut pools = BTreeMap::new();
        for pool in config.pools {
            let descriptor = resolve_pool(&pool, &tokens)?;
            if pools.insert(pool.name.clone(), descriptor).is_some() {
                return Err(LpError::Configuration(format!("duplicate pool {}", pool.name)));
            }
        }

        Ok(Self {
            log_filter: config.log_filter,
            network: config.network,
            tokens,
            pools,
        })
    }

    /// Pool by registry name
    pub fn pool(&self, name: &str) -> LpResult<&PoolDescriptor> {
        self.pools.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.pools.keys().map(String::as_str).collect();
            LpError::Validation(format!("unknown pool {} (known: {})", name, known.join(", ")))
        })
    }

    pub fn token(&self, symbol: &str) -> LpResult<&TokenDescriptor> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| LpError::Validation(format!("unknown token {}", symbol)))
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolDescriptor> {
        self.pools.values()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenDescriptor> {
        self.tokens.values()
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.log_filter.as_deref()
    }
}

fn resolve_pool(pool: &PoolConfig, tokens: &BTreeMap<String, TokenDescriptor>) -> LpResult<PoolDescriptor> {
    if pool.name.trim().is_empty() {
        return Err(LpError::Configuration("pool name must not be empty".into()));
    }
    if pool.tick_spacing <= 0 {
        return Err(LpError::Configuration(format!(
            "pool {} has tick_spacing {}, must be positive",
            pool.name, pool.tick_spacing
        )));
    }
    if pool.pool == Address::ZERO || pool.nft_manager == Address::ZERO {
        return Err(LpError::Configuration(format!("pool {} has a zero address", pool.name)));
    }
    if pool.token0 == pool.token1 {
        return Err(LpError::Configuration(format!(
            "pool {} uses {} for both tokens",
            pool.name, pool.token0
        )));
    }

    let lookup = |symbol: &str| {
        tokens.get(symbol).cloned().ok_or_else(|| {
            LpError::Configuration(format!("pool {} references unknown token {}", pool.name, symbol))
        })
    };

    Ok(PoolDescriptor {
        name: pool.name.clone(),
        pool: pool.pool,
        nft_manager: pool.nft_manager,
        token0: lookup(&pool.token0)?,
        token1: lookup(&pool.token1)?,
        tick_spacing: pool.tick_spacing,
    })
}

/// Parse a `0x`-prefixed hex address. Mixed-case input must carry a valid
/// EIP-55 checksum.
pub fn parse_address(value: &str) -> LpResult<Address> {
    let value = value.trim();
    let hex = value
        .strip_prefix("0x")
        .filter(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| LpError::Validation(format!("{} is not a 20-byte 0x-prefixed hex address", value)))?;

    let mixed_case = hex.bytes().any(|b| b.is_ascii_lowercase()) && hex.bytes().any(|b| b.is_ascii_uppercase());
    if mixed_case {
        return Address::parse_checksummed(value, None)
            .map_err(|_| LpError::Validation(format!("{} has an invalid checksum", value)));
    }

    Address::from_str(value).map_err(|e| LpError::Validation(format!("{}: {}", value, e)))
}

mod address_serde {
    use alloy::primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_address(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_filter = "info,aero_sdk::receipt=debug"

[network]
provider = "alchemy"
receipt_timeout_secs = 300

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
"#;

    fn sample() -> LpConfig {
        LpConfig::from_toml_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_registry_resolves_tokens() {
        let registry = Registry::from_config(sample()).unwrap();
        let pool = registry.pool("WETH/USDC").unwrap();

        assert_eq!(pool.token0.symbol, "WETH");
        assert_eq!(pool.token1.decimals, 6);
        assert_eq!(pool.decimals_diff(), 12);
        assert_eq!(registry.log_filter(), Some("info,aero_sdk::receipt=debug"));
        assert_eq!(registry.network().provider, ProviderKind::Alchemy);
        assert_eq!(registry.network().poll_interval_ms, 2000);
        assert_eq!(registry.network().tx_settings().receipt_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_unknown_pool_is_validation_error() {
        let registry = Registry::from_config(sample()).unwrap();
        assert!(matches!(registry.pool("WETH/DAI"), Err(LpError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_pools() {
        let mut config = sample();
        config.pools[0].token1 = "DAI".into();
        assert!(matches!(Registry::from_config(config), Err(LpError::Configuration(_))));

        let mut config = sample();
        config.pools[0].tick_spacing = 0;
        assert!(Registry::from_config(config).is_err());

        let mut config = sample();
        config.pools[0].token1 = "WETH".into();
        assert!(Registry::from_config(config).is_err());

        let mut config = sample();
        let duplicate = config.pools[0].clone();
        config.pools.push(duplicate);
        assert!(Registry::from_config(config).is_err());
    }

    #[test]
    fn test_parse_address_checksum() {
        assert!(parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").is_ok());
        assert!(parse_address("0x833589FCD6EDB6E08F4C7C32D4F71B54BDA02913").is_ok());
        assert!(matches!(
            parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02914"),
            Err(LpError::Validation(_))
        ));
        assert!(parse_address("833589fcd6edb6e08f4c7c32d4f71b54bda02913").is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_bad_checksum_in_file_fails_to_parse() {
        let content = SAMPLE.replace(
            "0x4200000000000000000000000000000000000006",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02914",
        );
        assert!(matches!(LpConfig::from_toml_str(&content), Err(LpError::Configuration(_))));
    }

    #[test]
    fn test_endpoints() {
        let network = NetworkConfig::default();
        assert_eq!(
            network.endpoint(ProviderKind::Infura, Some("abc")).unwrap(),
            "https://base-mainnet.infura.io/v3/abc"
        );
        assert_eq!(
            network.endpoint(ProviderKind::Alchemy, Some("xyz")).unwrap(),
            "https://base-mainnet.g.alchemy.com/v2/xyz"
        );
        assert!(matches!(
            network.endpoint(ProviderKind::Infura, None),
            Err(LpError::Configuration(_))
        ));
        assert!(network.endpoint(ProviderKind::Custom, None).is_err());
        assert!(matches!("quicknode".parse::<ProviderKind>(), Err(LpError::Configuration(_))));
    }
}
