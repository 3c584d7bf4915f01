/// Aerodrome liquidity position SDK
///
/// Manages concentrated liquidity positions on Slipstream-style pools:
/// - Pool state reads and tick range selection
/// - ERC-20 allowance handling
/// - Position minting and receipt parsing
/// - Position teardown (decrease liquidity, collect, burn)
/// - Typed pool and token registry
pub mod abi;
pub mod chain;
pub mod config;
pub mod connector;
pub mod core;
pub mod pool;
pub mod position;
pub mod receipt;
pub mod testing;
pub mod token;
pub mod tx;

pub use chain::{ChainClient, ContractCall, LogEntry, TransactionReceipt, UnsignedTransaction, Wallet};
pub use config::{parse_address, LpConfig, NetworkConfig, ProviderKind, Registry};
pub use connector::{Connector, ConnectorBuilder};
pub use crate::core::*;
pub use pool::PoolStateReader;
pub use position::{LiquidityPosition, PositionManager, PositionState};
pub use receipt::{parse_collect_receipt, parse_mint_receipt, CollectOutcome, MintOutcome};
pub use token::TokenReader;
pub use tx::{TransactionSender, TxSettings};

// Re-export the math layer
pub use aero_math;
