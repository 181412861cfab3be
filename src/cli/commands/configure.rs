//! Configure command: create or update a namespaced credential file.

use clap::Args;

use crate::cli::utils::{
    confirm, mask_secret, print_info, print_success, print_warning, prompt_input,
    prompt_input_with_default, prompt_password, spinner,
};
use crate::cli::Cli;
use crate::config::envfile;
use crate::config::fetch_markets_config;
use crate::core::constants;

/// Configure command arguments
#[derive(Args, Clone)]
pub struct ConfigureCommand {
    /// Powerloom chain (e.g. mainnet, devnet)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Data market name
    #[arg(short, long)]
    pub market: Option<String>,

    /// Wallet holder address
    #[arg(short, long)]
    pub wallet: Option<String>,

    /// Signer account address
    #[arg(long)]
    pub signer_address: Option<String>,

    /// Signer account private key (prompted hidden when omitted)
    #[arg(long)]
    pub signer_key: Option<String>,

    /// Source chain RPC URL
    #[arg(long)]
    pub source_rpc: Option<String>,
}

/// Recommended gRPC stream pool size for a logical CPU count.
pub fn recommended_stream_pool_size(cpus: usize) -> u32 {
    if cpus >= 4 {
        100
    } else if cpus >= 2 {
        40
    } else {
        20
    }
}

pub async fn execute(cmd: ConfigureCommand, cli: &Cli) -> anyhow::Result<()> {
    let pb = spinner("Fetching markets manifest...");
    let context = fetch_markets_config().await;
    pb.finish_and_clear();
    let context = context?;

    let chain_name = match cmd.env {
        Some(env) => env,
        None => prompt_input(&format!(
            "Powerloom chain ({})",
            context
                .available_environments
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        )),
    };
    let chain = context
        .chain(&chain_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown chain '{chain_name}'"))?;

    let market_name = match cmd.market {
        Some(market) => market,
        None => prompt_input(&format!(
            "Data market ({})",
            context.market_names(&chain_name).join(", ")
        )),
    };
    let market = context
        .market(&chain_name, &market_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown market '{market_name}' on {chain_name}"))?;

    let filename =
        envfile::namespaced_env_filename(&chain.chain.name, &market.name, &market.source_chain);
    let config_dir = envfile::app_config_dir()?;
    let file_path = config_dir.join(&filename);

    // Existing values become prompt defaults
    let existing = if file_path.is_file() {
        print_info(&format!(
            "Existing configuration found for {filename}. Using existing values as defaults."
        ));
        envfile::parse_env_file(&file_path)?
    } else {
        Default::default()
    };
    let default_of = |key: &str| existing.get(key).cloned().unwrap_or_default();

    let wallet = cmd
        .wallet
        .unwrap_or_else(|| {
            prompt_input_with_default(
                "Slot NFT holder wallet address (0x...)",
                &default_of("WALLET_HOLDER_ADDRESS"),
            )
        });
    let signer_address = cmd.signer_address.unwrap_or_else(|| {
        prompt_input_with_default(
            "Signer account address (0x...)",
            &default_of("SIGNER_ACCOUNT_ADDRESS"),
        )
    });
    let signer_key = match cmd.signer_key {
        Some(key) => key,
        None => {
            let existing_key = default_of("SIGNER_ACCOUNT_PRIVATE_KEY");
            if existing_key.is_empty() {
                prompt_password("Signer account private key")
            } else {
                let entered = prompt_password(&format!(
                    "Signer account private key [{}]",
                    mask_secret(&existing_key)
                ));
                if entered.is_empty() {
                    existing_key
                } else {
                    entered
                }
            }
        }
    };
    let source_rpc = cmd.source_rpc.unwrap_or_else(|| {
        prompt_input_with_default(
            &format!("RPC URL for source chain {}", market.source_chain),
            &default_of("SOURCE_RPC_URL"),
        )
    });
    let powerloom_rpc = prompt_input_with_default(
        "Powerloom chain RPC URL",
        existing
            .get("POWERLOOM_RPC_URL")
            .unwrap_or(&chain.chain.rpc_url),
    );
    let telegram_chat = prompt_input_with_default(
        "Telegram chat ID (optional)",
        &default_of("TELEGRAM_CHAT_ID"),
    );
    let telegram_url = prompt_input_with_default(
        "Telegram reporting URL (optional)",
        &default_of("TELEGRAM_REPORTING_URL"),
    );

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let recommended = recommended_stream_pool_size(cpus);
    let pool_default = existing
        .get("MAX_STREAM_POOL_SIZE")
        .cloned()
        .unwrap_or_else(|| recommended.to_string());
    let pool_answer =
        prompt_input_with_default("Max gRPC stream pool size", &pool_default);
    let mut pool_size: u32 = pool_answer.trim().parse().unwrap_or(recommended);
    if pool_size > recommended {
        print_warning(&format!(
            "MAX_STREAM_POOL_SIZE above the recommended {recommended} for {cpus} logical CPUs \
             may cause instability. Using the recommended value."
        ));
        pool_size = recommended;
    }
    let refresh_default = existing
        .get("CONNECTION_REFRESH_INTERVAL_SEC")
        .cloned()
        .unwrap_or_else(|| constants::DEFAULT_CONNECTION_REFRESH_INTERVAL_SEC.to_string());
    let refresh_interval =
        prompt_input_with_default("Connection refresh interval (seconds)", &refresh_default);

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut push_if = |key: &str, value: String| {
        if !value.trim().is_empty() {
            pairs.push((key.to_string(), value.trim().to_string()));
        }
    };
    push_if("WALLET_HOLDER_ADDRESS", wallet);
    push_if("SIGNER_ACCOUNT_ADDRESS", signer_address);
    push_if("SIGNER_ACCOUNT_PRIVATE_KEY", signer_key);
    push_if("SOURCE_RPC_URL", source_rpc);
    push_if("POWERLOOM_RPC_URL", powerloom_rpc);
    push_if("TELEGRAM_CHAT_ID", telegram_chat);
    push_if("TELEGRAM_REPORTING_URL", telegram_url);
    push_if("MAX_STREAM_POOL_SIZE", pool_size.to_string());
    push_if("CONNECTION_REFRESH_INTERVAL_SEC", refresh_interval);

    if file_path.exists()
        && !confirm(&format!("{filename} already exists. Overwrite?"), cli.no_prompt)
    {
        print_warning("Configuration unchanged");
        return Ok(());
    }

    std::fs::write(&file_path, envfile::render_env_contents(&pairs))?;
    print_success(&format!("Wrote {}", file_path.display()));
    for (key, value) in &pairs {
        if key == "SIGNER_ACCOUNT_PRIVATE_KEY" {
            println!("  {key}={}", mask_secret(value));
        } else {
            println!("  {key}={value}");
        }
    }
    Ok(())
}
