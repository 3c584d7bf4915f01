// Operator CLI for Aerodrome concentrated liquidity positions
//
// Reads pools and tokens from a TOML registry, takes credentials from the
// environment, and runs one lifecycle command per invocation.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use aero_sdk::Registry;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "aero-lp")]
#[command(about = "Aerodrome concentrated liquidity position manager", long_about = None)]
#[command(version)]
struct Cli {
    /// Registry of pools, tokens and network settings
    #[arg(long, env = "AERO_CONFIG", default_value = "aero.toml")]
    config: PathBuf,

    /// Per-component log filter, e.g. `info,aero_sdk::receipt=debug`.
    /// RUST_LOG takes precedence.
    #[arg(long)]
    log_filter: Option<String>,

    #[command(flatten)]
    connection: commands::utils::ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current price and the range a position would use
    Status(commands::status::StatusCmd),

    /// Show native and registry token balances with the latest block
    Balance(commands::balance::BalanceCmd),

    /// Approve, mint and record a new position
    Open(commands::position::OpenCmd),

    /// Remove liquidity, collect and burn an existing position
    Close(commands::position::CloseCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let registry = Registry::load(&cli.config)
        .with_context(|| format!("Failed to load registry from {}", cli.config.display()))?;

    let filter = cli
        .log_filter
        .as_deref()
        .or(registry.log_filter())
        .unwrap_or(DEFAULT_LOG_FILTER);
    init_logging(filter)?;
    tracing::debug!(config = %cli.config.display(), pools = registry.pools().count(), "Registry loaded");

    match cli.command {
        Commands::Status(cmd) => commands::status::execute(cmd, registry, &cli.connection).await,
        Commands::Balance(cmd) => commands::balance::execute(cmd, registry, &cli.connection).await,
        Commands::Open(cmd) => commands::position::open(cmd, registry, &cli.connection).await,
        Commands::Close(cmd) => commands::position::close(cmd, registry, &cli.connection).await,
    }
}

fn init_logging(filter: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter: {}", filter))?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_close() {
        let cli = Cli::try_parse_from([
            "aero-lp",
            "--config",
            "custom.toml",
            "close",
            "WETH/USDC",
            "42",
            "--amount1-min",
            "2.5",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert!(matches!(cli.command, Commands::Close(_)));
    }

    #[test]
    fn test_open_requires_amounts() {
        assert!(Cli::try_parse_from(["aero-lp", "open", "WETH/USDC", "--amount0", "1"]).is_err());
    }
}
