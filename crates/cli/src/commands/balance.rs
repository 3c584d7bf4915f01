// Balance command

use anyhow::{Context, Result};
use clap::Args;

use aero_sdk::{parse_address, Registry};

use super::utils::{connect, format_ether, warn, ConnectionArgs};

#[derive(Args)]
pub struct BalanceCmd {
    /// Account to inspect; defaults to the wallet address
    address: Option<String>,
}

pub async fn execute(cmd: BalanceCmd, registry: Registry, args: &ConnectionArgs) -> Result<()> {
    // Validate before connecting
    let explicit = cmd.address.as_deref().map(parse_address).transpose()?;

    let connector = connect(registry, args, false).await?;
    let address = explicit
        .or_else(|| connector.wallet_address())
        .context("Pass an address or set PRIVATE_KEY")?;

    let block = connector.latest_block_number().await?;
    let wei = connector.native_balance(address).await?;

    println!("Account:      {}", address);
    println!("Block:        {}", block);
    println!("ETH:          {}", format_ether(wei)?);

    let symbols: Vec<String> = connector.registry().tokens().map(|t| t.symbol.clone()).collect();
    for symbol in symbols {
        match connector.token_balance(&symbol, address).await {
            Ok(balance) => println!("{:<13} {}", format!("{}:", symbol), balance.normalize()),
            Err(e) => warn(&format!("{} balance unavailable: {}", symbol, e)),
        }
    }

    Ok(())
}
