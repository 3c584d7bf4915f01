// Pool status command

use anyhow::{Context, Result};
use clap::Args;

use aero_sdk::{RangeParams, Registry};

use super::utils::{connect, print_status, ConnectionArgs};

#[derive(Args)]
pub struct StatusCmd {
    /// Pool name from the registry; all pools when omitted
    pool: Option<String>,

    /// Tick spacings added below the current interval
    #[arg(long, default_value = "1")]
    lower: u32,

    /// Tick spacings added above the current interval
    #[arg(long, default_value = "1")]
    upper: u32,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub async fn execute(cmd: StatusCmd, registry: Registry, args: &ConnectionArgs) -> Result<()> {
    let names: Vec<String> = match cmd.pool {
        Some(name) => vec![registry.pool(&name)?.name.clone()],
        None => registry.pools().map(|pool| pool.name.clone()).collect(),
    };
    let range = RangeParams::range_only(cmd.lower, cmd.upper);

    let connector = connect(registry, args, false).await?;

    for name in names {
        let status = connector
            .pool_status(&name, &range)
            .await
            .with_context(|| format!("Failed to read {}", name))?;

        if cmd.json {
            let value = serde_json::json!({ "pool": name, "status": status });
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            print_status(&name, &status);
        }
    }

    Ok(())
}
