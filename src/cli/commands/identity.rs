//! Identity command: manage stored credential files.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use crate::cli::utils::{
    confirm, create_table_with_headers, mask_secret, print_error, print_info, print_success,
    print_warning,
};
use crate::cli::Cli;
use crate::config::envfile;

/// Identity command container
#[derive(Args, Clone)]
pub struct IdentityCommand {
    #[command(subcommand)]
    pub command: IdentityCommands,
}

/// Available identity operations
#[derive(Subcommand, Clone)]
pub enum IdentityCommands {
    /// List stored credential files and their readiness
    List,

    /// Show one credential file with secrets masked
    Show {
        /// Powerloom chain
        #[arg(short, long)]
        env: String,
        /// Data market name
        #[arg(short, long)]
        market: String,
        /// Source chain of the market
        #[arg(short, long)]
        source_chain: String,
    },

    /// Delete one credential file
    Delete {
        /// Powerloom chain
        #[arg(short, long)]
        env: String,
        /// Data market name
        #[arg(short, long)]
        market: String,
        /// Source chain of the market
        #[arg(short, long)]
        source_chain: String,
    },
}

/// Chain/market/source parsed from a namespaced env file name.
pub fn parse_identity_filename(name: &str) -> Option<(String, String, String)> {
    let rest = name.strip_prefix(".env.")?;
    let mut parts = rest.splitn(3, '.');
    let chain = parts.next()?.to_string();
    let market = parts.next()?.to_string();
    let source = parts.next()?.to_string();
    if chain.is_empty() || market.is_empty() || source.is_empty() {
        return None;
    }
    Some((chain, market, source))
}

fn readiness(vars: &std::collections::HashMap<String, String>, key: &str) -> &'static str {
    match vars.get(key) {
        Some(v) if !v.trim().is_empty() => "yes",
        _ => "no",
    }
}

pub async fn execute(cmd: IdentityCommand, cli: &Cli) -> anyhow::Result<()> {
    match &cmd.command {
        IdentityCommands::List => list_identities(),
        IdentityCommands::Show {
            env,
            market,
            source_chain,
        } => show_identity(env, market, source_chain),
        IdentityCommands::Delete {
            env,
            market,
            source_chain,
        } => delete_identity(env, market, source_chain, cli.no_prompt),
    }
}

fn list_identities() -> anyhow::Result<()> {
    let files = envfile::list_namespaced_env_files()?;
    if files.is_empty() {
        print_info("No stored identities. Run `plcli configure` to create one.");
        return Ok(());
    }

    let mut table = create_table_with_headers(&[
        "Chain", "Market", "Source", "Wallet", "Signer", "Key", "Source RPC", "Location",
    ]);
    for path in &files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((chain, market, source)) = parse_identity_filename(name) else {
            continue;
        };
        let vars = envfile::parse_env_file(path).unwrap_or_default();
        table.add_row(vec![
            chain.to_uppercase(),
            market.to_uppercase(),
            source.to_uppercase(),
            readiness(&vars, "WALLET_HOLDER_ADDRESS").to_string(),
            readiness(&vars, "SIGNER_ACCOUNT_ADDRESS").to_string(),
            readiness(&vars, "SIGNER_ACCOUNT_PRIVATE_KEY").to_string(),
            readiness(&vars, "SOURCE_RPC_URL").to_string(),
            location_label(path).to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn location_label(path: &Path) -> &'static str {
    match envfile::app_config_dir() {
        Ok(dir) if path.starts_with(&dir) => "config dir",
        _ => "working dir (legacy)",
    }
}

fn identity_path(env: &str, market: &str, source_chain: &str) -> anyhow::Result<PathBuf> {
    envfile::find_namespaced_env_file(env, market, source_chain)?.ok_or_else(|| {
        anyhow::anyhow!(
            "No stored identity for {}/{}/{}",
            env.to_uppercase(),
            market.to_uppercase(),
            source_chain.to_uppercase()
        )
    })
}

fn show_identity(env: &str, market: &str, source_chain: &str) -> anyhow::Result<()> {
    let path = identity_path(env, market, source_chain)?;
    let vars = envfile::parse_env_file(&path)?;

    print_info(&format!("Identity file: {}", path.display()));
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort();
    for key in keys {
        let value = &vars[key];
        if key.contains("PRIVATE_KEY") {
            println!("  {key}={}", mask_secret(value));
        } else {
            println!("  {key}={value}");
        }
    }
    Ok(())
}

fn delete_identity(
    env: &str,
    market: &str,
    source_chain: &str,
    no_prompt: bool,
) -> anyhow::Result<()> {
    let path = identity_path(env, market, source_chain)?;
    if !confirm(&format!("Delete {}?", path.display()), no_prompt) {
        print_warning("Deletion cancelled");
        return Ok(());
    }
    match std::fs::remove_file(&path) {
        Ok(()) => {
            print_success(&format!("Deleted {}", path.display()));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Could not delete {}: {e}", path.display()));
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity_filename() {
        assert_eq!(
            parse_identity_filename(".env.mainnet.uniswapv2.eth_mainnet"),
            Some((
                "mainnet".to_string(),
                "uniswapv2".to_string(),
                "eth_mainnet".to_string()
            ))
        );
    }

    #[test]
    fn test_parse_identity_filename_rejects_short() {
        assert_eq!(parse_identity_filename(".env"), None);
        assert_eq!(parse_identity_filename(".env.mainnet"), None);
        assert_eq!(parse_identity_filename(".env.mainnet.uniswapv2"), None);
        assert_eq!(parse_identity_filename("env.mainnet.uniswapv2.eth"), None);
    }

    #[test]
    fn test_readiness() {
        let mut vars = std::collections::HashMap::new();
        vars.insert("WALLET_HOLDER_ADDRESS".to_string(), "0xabc".to_string());
        vars.insert("SIGNER_ACCOUNT_ADDRESS".to_string(), "  ".to_string());
        assert_eq!(readiness(&vars, "WALLET_HOLDER_ADDRESS"), "yes");
        assert_eq!(readiness(&vars, "SIGNER_ACCOUNT_ADDRESS"), "no");
        assert_eq!(readiness(&vars, "SIGNER_ACCOUNT_PRIVATE_KEY"), "no");
    }
}
