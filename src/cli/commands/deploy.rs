//! Deploy command: roll out snapshotter instances for owned slots.

use clap::Args;
use tracing::info;

use crate::cli::utils::{
    confirm, create_table_with_headers, parse_selection_string, print_error, print_info,
    print_success, print_warning, prompt_input, spinner,
};
use crate::cli::Cli;
use crate::config::resolver::CredentialResolver;
use crate::config::{fetch_markets_config, ChainMarkets, MarketConfig, MarketsContext};
use crate::core::constants;
use crate::deploy::{docker, git, run_staged_rollout, DeployPlan};
use crate::evm::fetch_owned_slots;

/// Deploy command arguments
#[derive(Args, Clone)]
pub struct DeployCommand {
    /// Powerloom chain to deploy on (e.g. mainnet, devnet)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Data market(s) to deploy (repeatable)
    #[arg(short, long)]
    pub market: Vec<String>,

    /// Slot ID(s) to deploy (repeatable; default: all owned slots)
    #[arg(short, long)]
    pub slot: Vec<u64>,

    /// Wallet holder address owning the slots
    #[arg(short, long)]
    pub wallet: Option<String>,

    /// Signer account address
    #[arg(long)]
    pub signer_address: Option<String>,

    /// Signer account private key
    #[arg(long)]
    pub signer_key: Option<String>,

    /// Worker pool size for slots after the first
    #[arg(long, default_value_t = constants::DEFAULT_DEPLOY_WORKERS)]
    pub parallel: usize,
}

pub async fn execute(cmd: DeployCommand, cli: &Cli) -> anyhow::Result<()> {
    docker::ensure_daemon_running().await?;

    let pb = spinner("Fetching markets manifest...");
    let context = fetch_markets_config().await;
    pb.finish_and_clear();
    let context = context?;

    let chain_markets = select_chain(&context, cmd.env.as_deref(), cli.no_prompt)?;
    let chain_name = chain_markets.chain.name.to_uppercase();

    let markets = select_markets(chain_markets, &cmd.market, cli.no_prompt)?;
    if markets.is_empty() {
        anyhow::bail!("No data markets selected");
    }

    let mut overall_failures = 0usize;
    for market in &markets {
        print_info(&format!(
            "Preparing deployment for market {} on {} (source: {})",
            market.name.to_uppercase(),
            chain_name,
            market.source_chain
        ));

        let mut resolver =
            CredentialResolver::load(&chain_name, &market.name, &market.source_chain)?;
        resolver.set_cli_value("WALLET_HOLDER_ADDRESS", cmd.wallet.as_deref());
        resolver.set_cli_value("SIGNER_ACCOUNT_ADDRESS", cmd.signer_address.as_deref());
        resolver.set_cli_value("SIGNER_ACCOUNT_PRIVATE_KEY", cmd.signer_key.as_deref());

        let wallet = resolver.resolve("WALLET_HOLDER_ADDRESS")?;
        let signer_address = resolver.resolve("SIGNER_ACCOUNT_ADDRESS")?;
        let signer_key = resolver.resolve("SIGNER_ACCOUNT_PRIVATE_KEY")?;
        let source_rpc = resolver.resolve_source_rpc(&market.source_chain)?;
        info!(
            wallet_source = %wallet.source,
            signer_source = %signer_address.source,
            "Resolved credentials"
        );

        let slots = select_slots(
            &cmd.slot,
            &wallet.value,
            &chain_markets.chain.rpc_url,
            &market.protocol_state_contract_address,
            cli.no_prompt,
        )
        .await?;
        if slots.is_empty() {
            print_warning(&format!(
                "No slots to deploy for market {}",
                market.name.to_uppercase()
            ));
            continue;
        }

        print_info(&format!(
            "Deploying {} slot(s) on {chain_name}/{}: {:?}",
            slots.len(),
            market.name.to_uppercase(),
            slots
        ));
        if !confirm("Proceed with deployment?", cli.no_prompt) {
            print_warning("Deployment cancelled");
            continue;
        }

        let workdir = std::env::current_dir()?;
        let plan = DeployPlan {
            chain: chain_markets.chain.clone(),
            market: (*market).clone(),
            slots,
            signer_address: signer_address.value.clone(),
            signer_private_key: signer_key.value.clone(),
            source_rpc_url: source_rpc.value.clone(),
            seed_env: resolver.namespaced_vars().clone(),
            workdir: workdir.clone(),
            max_workers: cmd.parallel.max(1),
        };

        let pb = spinner("Cloning node template...");
        let base_clone = git::BaseClone::create(
            &workdir,
            constants::SNAPSHOTTER_LITE_REPO_URL,
            constants::SNAPSHOTTER_LITE_BRANCH,
        )
        .await;
        pb.finish_and_clear();
        let base_clone = base_clone?;

        let summary = run_staged_rollout(&plan, &base_clone).await?;
        drop(base_clone);

        let mut table = create_table_with_headers(&["Slot", "Result"]);
        for slot in &summary.succeeded {
            table.add_row(vec![slot.to_string(), "launched".to_string()]);
        }
        for (slot, reason) in &summary.failed {
            table.add_row(vec![slot.to_string(), format!("failed: {reason}")]);
        }
        println!("{table}");

        if summary.all_succeeded() {
            print_success(&format!(
                "All {} instance(s) launched for {}",
                summary.succeeded.len(),
                market.name.to_uppercase()
            ));
        } else {
            overall_failures += summary.failed.len();
            print_error(&format!(
                "{} instance(s) failed for {}",
                summary.failed.len(),
                market.name.to_uppercase()
            ));
        }
    }

    if overall_failures > 0 {
        anyhow::bail!("{overall_failures} instance launch(es) failed");
    }
    Ok(())
}

/// Pick a chain from the manifest, by flag or interactively (number or name).
fn select_chain<'a>(
    context: &'a MarketsContext,
    env_flag: Option<&str>,
    no_prompt: bool,
) -> anyhow::Result<&'a ChainMarkets> {
    if let Some(env) = env_flag {
        return context.chain(env).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown chain '{env}'. Available: {}",
                context
                    .available_environments
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        });
    }
    if no_prompt {
        anyhow::bail!("--env is required with --no-prompt");
    }

    let environments: Vec<&String> = context.available_environments.iter().collect();
    println!("Available Powerloom chains:");
    for (i, name) in environments.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    let answer = prompt_input("Select a chain (number or name)");

    if let Ok(index) = answer.trim().parse::<usize>() {
        if index >= 1 && index <= environments.len() {
            return Ok(context
                .chain(environments[index - 1])
                .expect("listed chain exists"));
        }
        anyhow::bail!("Selection {index} is out of range (1-{})", environments.len());
    }
    context
        .chain(answer.trim())
        .ok_or_else(|| anyhow::anyhow!("Unknown chain '{}'", answer.trim()))
}

/// Pick markets by flags or interactively.
///
/// Interactive selection accepts `1,3-5` style strings, `A` for all markets
/// and `0` to type market names manually.
fn select_markets<'a>(
    chain: &'a ChainMarkets,
    market_flags: &[String],
    no_prompt: bool,
) -> anyhow::Result<Vec<&'a MarketConfig>> {
    let mut names: Vec<&String> = chain.markets.keys().collect();
    names.sort();

    if !market_flags.is_empty() {
        let mut selected = Vec::new();
        for flag in market_flags {
            let market = chain.markets.get(&flag.to_uppercase()).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown market '{flag}' on {}. Available: {}",
                    chain.chain.name,
                    names.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                )
            })?;
            selected.push(market);
        }
        return Ok(selected);
    }
    if no_prompt {
        anyhow::bail!("--market is required with --no-prompt");
    }
    if names.is_empty() {
        anyhow::bail!("Chain {} has no data markets", chain.chain.name);
    }

    println!("Available data markets on {}:", chain.chain.name);
    for (i, name) in names.iter().enumerate() {
        let market = &chain.markets[*name];
        println!("  {}. {} (source: {})", i + 1, name, market.source_chain);
    }
    println!("  A. all markets");
    println!("  0. enter market names manually");
    let answer = prompt_input("Select market(s) (e.g. 1,3-5)");
    let answer = answer.trim().to_string();

    if answer.eq_ignore_ascii_case("a") {
        return Ok(names.iter().map(|n| &chain.markets[*n]).collect());
    }
    if answer == "0" {
        let manual = prompt_input("Market names (comma separated)");
        let mut selected = Vec::new();
        for name in manual.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let market = chain
                .markets
                .get(&name.to_uppercase())
                .ok_or_else(|| anyhow::anyhow!("Unknown market '{name}'"))?;
            selected.push(market);
        }
        return Ok(selected);
    }

    let indices = parse_selection_string(&answer, names.len())?;
    Ok(indices.into_iter().map(|i| &chain.markets[names[i]]).collect())
}

/// Determine which slots to deploy.
///
/// Explicit `--slot` flags win. Otherwise owned slots are fetched from the
/// protocol chain and the operator picks all of them or an ID range.
async fn select_slots(
    slot_flags: &[u64],
    wallet: &str,
    rpc_url: &str,
    protocol_state_contract: &str,
    no_prompt: bool,
) -> anyhow::Result<Vec<u64>> {
    if !slot_flags.is_empty() {
        return Ok(slot_flags.to_vec());
    }

    let pb = spinner("Fetching owned slots...");
    let owned = fetch_owned_slots(wallet, rpc_url, protocol_state_contract).await;
    pb.finish_and_clear();
    let owned = owned?;

    if owned.is_empty() {
        print_warning(&format!("Wallet {wallet} owns no slots"));
        return Ok(Vec::new());
    }
    print_info(&format!("Wallet owns {} slot(s): {:?}", owned.len(), owned));

    if no_prompt {
        return Ok(owned);
    }

    let answer = prompt_input("Deploy all slots, or a range of slot IDs (e.g. 5481-5485)? [all]");
    let answer = answer.trim().to_string();
    if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
        return Ok(owned);
    }

    let (start, end) = answer
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("Expected 'all' or a range like 5481-5485"))?;
    let start: u64 = start.trim().parse()?;
    let end: u64 = end.trim().parse()?;
    if start > end {
        anyhow::bail!("Range {start}-{end} is not ascending");
    }

    let selected: Vec<u64> = owned
        .iter()
        .copied()
        .filter(|id| (start..=end).contains(id))
        .collect();
    if selected.is_empty() {
        anyhow::bail!("No owned slots fall within {start}-{end}");
    }
    Ok(selected)
}
