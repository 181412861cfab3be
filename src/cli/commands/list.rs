//! List command: show available chains and data markets.

use clap::Args;

use crate::cli::utils::{create_table_with_headers, spinner};
use crate::cli::Cli;
use crate::config::fetch_markets_config;

/// List command arguments
#[derive(Args, Clone)]
pub struct ListCommand {
    /// Only show this Powerloom chain
    #[arg(short, long)]
    pub env: Option<String>,
}

pub async fn execute(cmd: ListCommand, _cli: &Cli) -> anyhow::Result<()> {
    let pb = spinner("Fetching markets manifest...");
    let context = fetch_markets_config().await;
    pb.finish_and_clear();
    let context = context?;

    for env in &context.available_environments {
        if let Some(wanted) = &cmd.env {
            if !env.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }
        let chain = context.chain(env).expect("listed chain exists");
        println!(
            "\n{} (chain ID {}, RPC {})",
            env, chain.chain.chain_id, chain.chain.rpc_url
        );

        if chain.markets.is_empty() {
            println!("  no data markets");
            continue;
        }

        let mut table = create_table_with_headers(&[
            "Market",
            "Source chain",
            "Market contract",
            "Protocol state",
            "Compute repo (branch)",
            "Config repo (branch)",
        ]);
        for name in context.market_names(env) {
            let market = &chain.markets[&name];
            table.add_row(vec![
                name.clone(),
                market.source_chain.clone(),
                market.contract_address.clone(),
                market.protocol_state_contract_address.clone(),
                format!("{} ({})", market.compute.repo, market.compute.branch),
                format!("{} ({})", market.config.repo, market.config.branch),
            ]);
        }
        println!("{table}");
    }

    if let Some(wanted) = &cmd.env {
        if context.chain(wanted).is_none() {
            anyhow::bail!(
                "Unknown chain '{wanted}'. Available: {}",
                context
                    .available_environments
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    Ok(())
}
