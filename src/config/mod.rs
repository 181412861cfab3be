//! Configuration for the snapshotter deployment toolkit
//!
//! Covers the remote markets manifest (chains, data markets, repos) and the
//! local credential/env file layer.

pub mod envfile;
pub mod resolver;

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::constants;
use crate::errors::{MarketsConfigError, SnapshotterResult};

/// A protocol chain entry from the markets manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(rename = "rpcURL")]
    pub rpc_url: String,
}

/// A git repo plus branch reference (compute or config repo)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    pub repo: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// A data market entry from the markets manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub name: String,
    #[serde(rename = "sourceChain")]
    pub source_chain: String,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    #[serde(rename = "powerloomProtocolStateContractAddress")]
    pub protocol_state_contract_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequencer: Option<String>,
    pub compute: RepoConfig,
    pub config: RepoConfig,
}

/// One manifest entry: a protocol chain and its data markets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerloomChainConfig {
    #[serde(rename = "powerloomChain")]
    pub powerloom_chain: ChainConfig,
    #[serde(rename = "dataMarkets")]
    pub data_markets: Vec<MarketConfig>,
}

/// Markets for one chain, keyed by uppercase market name
#[derive(Debug, Clone)]
pub struct ChainMarkets {
    pub chain: ChainConfig,
    pub markets: HashMap<String, MarketConfig>,
}

/// Parsed manifest with uppercase lookup maps
#[derive(Debug, Clone)]
pub struct MarketsContext {
    /// Uppercase chain name to chain + markets
    pub chains: HashMap<String, ChainMarkets>,
    /// All chain names, uppercase, sorted
    pub available_environments: BTreeSet<String>,
    /// All market names across chains, uppercase, sorted
    pub available_markets: BTreeSet<String>,
}

impl MarketsContext {
    /// Build lookup maps from raw manifest entries.
    pub fn from_entries(entries: Vec<PowerloomChainConfig>) -> Self {
        let mut chains = HashMap::new();
        let mut available_environments = BTreeSet::new();
        let mut available_markets = BTreeSet::new();

        for entry in entries {
            let chain_key = entry.powerloom_chain.name.to_uppercase();
            available_environments.insert(chain_key.clone());

            let mut markets = HashMap::new();
            for market in entry.data_markets {
                available_markets.insert(market.name.to_uppercase());
                markets.insert(market.name.to_uppercase(), market);
            }

            chains.insert(
                chain_key,
                ChainMarkets {
                    chain: entry.powerloom_chain,
                    markets,
                },
            );
        }

        Self {
            chains,
            available_environments,
            available_markets,
        }
    }

    /// Look up a chain by name, case insensitive.
    pub fn chain(&self, name: &str) -> Option<&ChainMarkets> {
        self.chains.get(&name.to_uppercase())
    }

    /// Look up a market on a chain, both case insensitive.
    pub fn market(&self, chain: &str, market: &str) -> Option<&MarketConfig> {
        self.chain(chain)
            .and_then(|c| c.markets.get(&market.to_uppercase()))
    }

    /// Market names for one chain, sorted.
    pub fn market_names(&self, chain: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .chain(chain)
            .map(|c| c.markets.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Fetch and parse the curated markets manifest.
pub async fn fetch_markets_config() -> SnapshotterResult<MarketsContext> {
    fetch_markets_config_from(constants::MARKETS_CONFIG_URL).await
}

/// Fetch the manifest from an explicit URL. Split out for tests.
pub async fn fetch_markets_config_from(url: &str) -> SnapshotterResult<MarketsContext> {
    info!(url, "Fetching markets manifest");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(constants::MANIFEST_FETCH_TIMEOUT_SECS))
        .build()?;

    let response = client.get(url).send().await.map_err(|e| {
        MarketsConfigError::with_url(format!("Failed to fetch manifest: {e}"), url)
    })?;

    if !response.status().is_success() {
        return Err(MarketsConfigError::with_url(
            format!("Manifest fetch returned HTTP {}", response.status()),
            url,
        )
        .into());
    }

    let entries: Vec<PowerloomChainConfig> = response.json().await.map_err(|e| {
        MarketsConfigError::with_url(format!("Failed to parse manifest JSON: {e}"), url)
    })?;

    let context = MarketsContext::from_entries(entries);
    debug!(
        chains = context.available_environments.len(),
        markets = context.available_markets.len(),
        "Parsed markets manifest"
    );
    Ok(context)
}
