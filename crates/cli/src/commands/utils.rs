// Shared helpers for CLI commands

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;

use aero_math::to_human_units;
use aero_sdk::{Connector, ConnectorBuilder, PoolStatus, ProviderKind, Registry};
use alloy_primitives::U256;

/// Endpoint selection and credentials, normally supplied through the environment
#[derive(Args)]
pub struct ConnectionArgs {
    /// RPC provider: infura, alchemy or custom. Defaults to the registry's.
    #[arg(long, env = "PROVIDER")]
    provider: Option<String>,

    /// Explicit RPC endpoint, overriding the provider
    #[arg(long, env = "RPC_URL", hide_env_values = true)]
    rpc_url: Option<String>,

    #[arg(long, env = "INFURA_PROJECT_ID", hide_env_values = true)]
    infura_project_id: Option<String>,

    #[arg(long, env = "ALCHEMY_PROJECT_ID", hide_env_values = true)]
    alchemy_project_id: Option<String>,

    /// Hex private key of the position owner
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

/// Build a connector. Without `require_wallet` a missing key yields a
/// read-only connector.
pub async fn connect(registry: Registry, args: &ConnectionArgs, require_wallet: bool) -> Result<Connector> {
    let provider = match args.provider.as_deref() {
        Some(name) => ProviderKind::from_str(name)?,
        None => registry.network().provider,
    };

    let mut builder = ConnectorBuilder::new(registry).provider(provider);

    let project_id = match provider {
        ProviderKind::Infura => args.infura_project_id.clone(),
        ProviderKind::Alchemy => args.alchemy_project_id.clone(),
        ProviderKind::Custom => None,
    };
    if let Some(project_id) = project_id {
        builder = builder.project_id(project_id);
    }
    if let Some(rpc_url) = &args.rpc_url {
        builder = builder.rpc_url(rpc_url.clone());
    }

    match &args.private_key {
        Some(key) => builder = builder.private_key(key.clone()),
        None if require_wallet => anyhow::bail!("PRIVATE_KEY must be set to send transactions"),
        None => {}
    }

    let connector = builder.build().await.context("Failed to connect")?;
    if let Some(host) = connector.endpoint_host() {
        info(&format!("Connected to {}", host));
    }
    Ok(connector)
}

/// Wei to ETH for display
pub fn format_ether(wei: U256) -> Result<String> {
    Ok(to_human_units(wei, 18)?.normalize().to_string())
}

pub fn print_status(pool: &str, status: &PoolStatus) {
    println!("{}", pool);
    println!("  tick spacing:  {}", status.tick_spacing);
    println!("  current tick:  {} (price {:.6})", status.current_tick, status.current_price);
    println!("  lower tick:    {} (price {:.6})", status.lower_tick, status.lower_price);
    println!("  upper tick:    {} (price {:.6})", status.upper_tick, status.upper_price);
}

/// Print success message with checkmark
pub fn success(msg: &str) {
    println!("[OK] {}", msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("[INFO] {}", msg);
}

/// Print warning message
pub fn warn(msg: &str) {
    eprintln!("[WARN] {}", msg);
}
