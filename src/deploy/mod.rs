//! Deployment orchestration for snapshotter node instances
//!
//! A deploy run clones the node template once, then stamps out one instance
//! per (chain, market, slot): a copied tree, a rendered env file and a
//! detached screen session running `build.sh`. The first slot carries the
//! local collector and is launched serially; the rest go through a bounded
//! worker pool.

pub mod docker;
pub mod git;
pub mod screen;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{ChainConfig, MarketConfig};
use crate::core::constants;
use crate::errors::{DeploymentError, SnapshotterResult};

/// Everything needed to deploy a set of slots for one market
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub chain: ChainConfig,
    pub market: MarketConfig,
    pub slots: Vec<u64>,
    pub signer_address: String,
    pub signer_private_key: String,
    pub source_rpc_url: String,
    /// Variables seeded from the namespaced env file, overridable defaults
    pub seed_env: HashMap<String, String>,
    /// Directory the deployment tree is rooted under
    pub workdir: PathBuf,
    /// Worker pool cap for slots after the first
    pub max_workers: usize,
}

/// Outcome of a deploy run
#[derive(Debug, Default)]
pub struct DeploySummary {
    pub succeeded: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

impl DeploySummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-instance port and subnet assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancePorts {
    pub local_collector_port: u16,
    pub core_api_port: u16,
    pub subnet_third_octet: u8,
    /// Whether this instance starts its own collector
    pub new_collector: bool,
}

/// Port/subnet assignment for the instance at `index` within a run.
///
/// The core API port and subnet octet increment per instance. A fresh
/// collector (and collector port bump) happens every
/// [`constants::COLLECTOR_SLOT_THRESHOLD`] instances, starting with the first.
pub fn ports_for_index(index: usize) -> InstancePorts {
    let collector_generation = index / constants::COLLECTOR_SLOT_THRESHOLD;
    InstancePorts {
        local_collector_port: constants::DEFAULT_LOCAL_COLLECTOR_PORT
            + collector_generation as u16,
        core_api_port: constants::DEFAULT_CORE_API_PORT + index as u16,
        subnet_third_octet: constants::DEFAULT_SUBNET_THIRD_OCTET
            .wrapping_add((index % 255) as u8),
        new_collector: index % constants::COLLECTOR_SLOT_THRESHOLD == 0,
    }
}

/// Uppercase namespace suffix, e.g. `MAINNET-UNISWAPV2-ETH`.
///
/// The source chain contributes only its first dash-separated component.
pub fn env_file_suffix(chain: &str, market: &str, source_chain: &str) -> String {
    let source_prefix = source_chain
        .split('-')
        .next()
        .unwrap_or(source_chain)
        .to_uppercase();
    format!(
        "{}-{}-{}",
        chain.to_uppercase(),
        market.to_uppercase(),
        source_prefix
    )
}

/// Instance directory beneath the deployment root:
/// `snapshotter-lite-v2/{chain}/{market}_{source}/slot-{id}`.
pub fn instance_dir(
    workdir: &Path,
    chain: &str,
    market: &str,
    source_chain: &str,
    slot_id: u64,
) -> PathBuf {
    workdir
        .join(constants::DEPLOYMENT_ROOT_DIR)
        .join(chain.to_lowercase())
        .join(format!(
            "{}_{}",
            market.to_lowercase(),
            source_chain.to_lowercase()
        ))
        .join(format!("slot-{slot_id}"))
}

/// build.sh arguments for an instance.
pub fn build_sh_args(new_collector: bool) -> &'static str {
    if new_collector {
        "--skip-credential-update"
    } else {
        "--no-collector --skip-credential-update"
    }
}

/// Render the instance env file contents.
///
/// Seed variables from the namespaced env file come first; resolved values
/// overwrite them; operational knobs keep seeded values when present.
pub fn render_instance_env(plan: &DeployPlan, slot_id: u64, ports: InstancePorts) -> String {
    let suffix = env_file_suffix(&plan.chain.name, &plan.market.name, &plan.market.source_chain);
    let source_prefix = plan
        .market
        .source_chain
        .split('-')
        .next()
        .unwrap_or(&plan.market.source_chain)
        .to_uppercase();

    let mut vars = plan.seed_env.clone();

    // Resolved values always win over seeded ones
    vars.insert("OVERRIDE_DEFAULTS".into(), "true".into());
    vars.insert("SLOT_ID".into(), slot_id.to_string());
    vars.insert("SIGNER_ACCOUNT_ADDRESS".into(), plan.signer_address.clone());
    vars.insert(
        "SIGNER_ACCOUNT_PRIVATE_KEY".into(),
        plan.signer_private_key.clone(),
    );
    vars.insert("POWERLOOM_RPC_URL".into(), plan.chain.rpc_url.clone());
    vars.insert("SOURCE_RPC_URL".into(), plan.source_rpc_url.clone());
    vars.insert(
        "DATA_MARKET_CONTRACT".into(),
        plan.market.contract_address.clone(),
    );
    vars.insert(
        "PROTOCOL_STATE_CONTRACT".into(),
        plan.market.protocol_state_contract_address.clone(),
    );
    vars.insert(
        "SNAPSHOT_CONFIG_REPO".into(),
        plan.market.config.repo.clone(),
    );
    vars.insert(
        "SNAPSHOT_CONFIG_REPO_BRANCH".into(),
        plan.market.config.branch.clone(),
    );
    vars.insert(
        "SNAPSHOTTER_COMPUTE_REPO".into(),
        plan.market.compute.repo.clone(),
    );
    vars.insert(
        "SNAPSHOTTER_COMPUTE_REPO_BRANCH".into(),
        plan.market.compute.branch.clone(),
    );
    vars.insert("POWERLOOM_CHAIN".into(), plan.chain.name.to_uppercase());
    vars.insert("NAMESPACE".into(), plan.market.name.to_uppercase());
    vars.insert("SOURCE_CHAIN".into(), source_prefix);
    vars.insert("FULL_NAMESPACE".into(), suffix.clone());
    vars.insert(
        "DOCKER_NETWORK_NAME".into(),
        format!("snapshotter-lite-v2-{suffix}"),
    );

    // Per-instance assignments
    vars.insert(
        "LOCAL_COLLECTOR_PORT".into(),
        ports.local_collector_port.to_string(),
    );
    vars.insert("CORE_API_PORT".into(), ports.core_api_port.to_string());
    vars.insert(
        "SUBNET_THIRD_OCTET".into(),
        ports.subnet_third_octet.to_string(),
    );

    // Operational knobs: seeded values win, defaults fill the gaps
    let defaults: [(&str, String); 5] = [
        (
            "MAX_STREAM_POOL_SIZE",
            constants::DEFAULT_MAX_STREAM_POOL_SIZE.to_string(),
        ),
        (
            "STREAM_POOL_HEALTH_CHECK_INTERVAL",
            constants::DEFAULT_STREAM_POOL_HEALTH_CHECK_INTERVAL.to_string(),
        ),
        (
            "CONNECTION_REFRESH_INTERVAL_SEC",
            constants::DEFAULT_CONNECTION_REFRESH_INTERVAL_SEC.to_string(),
        ),
        (
            "TELEGRAM_NOTIFICATION_COOLDOWN",
            constants::DEFAULT_TELEGRAM_NOTIFICATION_COOLDOWN.to_string(),
        ),
        ("DATA_MARKET_IN_REQUEST", "false".to_string()),
    ];
    for (key, value) in defaults {
        vars.entry(key.to_string()).or_insert(value);
    }

    let mut pairs: Vec<(String, String)> = vars.into_iter().collect();
    pairs.sort();
    crate::config::envfile::render_env_contents(&pairs)
}

/// Deploy one instance: fresh directory, template copy, env file, screen
/// session running build.sh.
pub async fn deploy_instance(
    plan: &DeployPlan,
    base_clone: &git::BaseClone,
    slot_id: u64,
    ports: InstancePorts,
) -> SnapshotterResult<()> {
    let dir = instance_dir(
        &plan.workdir,
        &plan.chain.name,
        &plan.market.name,
        &plan.market.source_chain,
        slot_id,
    );

    info!(slot = slot_id, dir = %dir.display(), "Deploying instance");

    if dir.exists() {
        warn!(dir = %dir.display(), "Instance directory exists, removing for fresh deployment");
        std::fs::remove_dir_all(&dir)
            .map_err(|e| DeploymentError::with_slot(
                format!("Could not remove existing instance dir: {e}"),
                slot_id,
                &plan.market.name,
            ))?;
    }
    std::fs::create_dir_all(&dir)?;

    base_clone.copy_into(&dir)?;

    let suffix = env_file_suffix(&plan.chain.name, &plan.market.name, &plan.market.source_chain);
    let env_path = dir.join(format!(".env-{suffix}"));
    std::fs::write(&env_path, render_instance_env(plan, slot_id, ports))?;
    debug!(file = %env_path.display(), "Wrote instance env file");

    let session = screen::session_name(&plan.chain.name, &plan.market.name, slot_id);
    let lockfile = dir.join(constants::LAUNCH_LOCKFILE_NAME);
    std::fs::write(&lockfile, session.as_bytes())?;

    let launch = screen::launch_in_session(
        &session,
        &dir,
        &format!("./build.sh {}", build_sh_args(ports.new_collector)),
    )
    .await;

    if launch.is_err() {
        let _ = std::fs::remove_file(&lockfile);
    }
    launch?;

    info!(slot = slot_id, session, "Instance launched");
    Ok(())
}

/// Count launch lockfiles beneath the deployment root.
pub fn count_active_lockfiles(workdir: &Path) -> usize {
    fn walk(dir: &Path, count: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, count);
            } else if path.file_name().and_then(|n| n.to_str())
                == Some(constants::LAUNCH_LOCKFILE_NAME)
            {
                *count += 1;
            }
        }
    }
    let mut count = 0;
    walk(&workdir.join(constants::DEPLOYMENT_ROOT_DIR), &mut count);
    count
}

/// Wait for in-flight launches to drop below `cap`.
///
/// Polls the launch lockfile count and the number of matching screen
/// sessions. Gives up after [`constants::LAUNCH_DRAIN_TIMEOUT_SECS`] so a
/// wedged build.sh cannot stall the whole run.
async fn wait_for_launch_drain(workdir: &Path, expected_sessions: usize, cap: usize) {
    let deadline =
        tokio::time::Instant::now() + Duration::from_secs(constants::LAUNCH_DRAIN_TIMEOUT_SECS);
    loop {
        let lockfiles = count_active_lockfiles(workdir);
        let sessions = screen::count_sessions_with_prefix(constants::SCREEN_SESSION_PREFIX)
            .await
            .unwrap_or(0);
        debug!(lockfiles, sessions, expected_sessions, "Launch drain poll");

        if lockfiles < cap && sessions >= expected_sessions {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(
                lockfiles,
                sessions, "Timed out waiting for launches to settle, continuing"
            );
            return;
        }
        tokio::time::sleep(Duration::from_secs(constants::LAUNCH_POLL_INTERVAL_SECS)).await;
    }
}

/// Run a full staged rollout for the plan.
///
/// The first slot is deployed serially and given a settle delay so its
/// collector is up before followers attach. Remaining slots run under a
/// counting semaphore with `plan.max_workers` permits, with a drain poll
/// between batches.
pub async fn run_staged_rollout(
    plan: &DeployPlan,
    base_clone: &git::BaseClone,
) -> SnapshotterResult<DeploySummary> {
    let mut summary = DeploySummary::default();
    if plan.slots.is_empty() {
        return Ok(summary);
    }

    // Leader slot carries the collector
    let leader = plan.slots[0];
    match deploy_instance(plan, base_clone, leader, ports_for_index(0)).await {
        Ok(()) => {
            summary.succeeded.push(leader);
            if plan.slots.len() > 1 {
                info!(
                    seconds = constants::LEADER_SETTLE_DELAY_SECS,
                    "Waiting for the collector instance to settle"
                );
                tokio::time::sleep(Duration::from_secs(constants::LEADER_SETTLE_DELAY_SECS)).await;
            }
            let dir = instance_dir(
                &plan.workdir,
                &plan.chain.name,
                &plan.market.name,
                &plan.market.source_chain,
                leader,
            );
            let _ = std::fs::remove_file(dir.join(constants::LAUNCH_LOCKFILE_NAME));
        }
        Err(e) => {
            // Followers need the collector; no point continuing
            summary.failed.push((leader, e.to_string()));
            for slot in &plan.slots[1..] {
                summary
                    .failed
                    .push((*slot, "Skipped: collector instance failed".to_string()));
            }
            return Ok(summary);
        }
    }

    let cap = plan.max_workers.max(1);
    let semaphore = Arc::new(Semaphore::new(cap));
    let followers = &plan.slots[1..];

    for (batch_index, batch) in followers.chunks(cap).enumerate() {
        let mut tasks = Vec::with_capacity(batch.len());
        for (offset, &slot) in batch.iter().enumerate() {
            let index = 1 + batch_index * cap + offset;
            let semaphore = Arc::clone(&semaphore);
            let plan = plan.clone();
            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let result =
                    deploy_instance(&plan, base_clone, slot, ports_for_index(index)).await;
                if result.is_ok() {
                    tokio::time::sleep(Duration::from_secs(
                        constants::FOLLOWER_STAGGER_DELAY_SECS,
                    ))
                    .await;
                    let dir = instance_dir(
                        &plan.workdir,
                        &plan.chain.name,
                        &plan.market.name,
                        &plan.market.source_chain,
                        slot,
                    );
                    let _ = std::fs::remove_file(dir.join(constants::LAUNCH_LOCKFILE_NAME));
                }
                (slot, result)
            });
        }

        for (slot, result) in join_all(tasks).await {
            match result {
                Ok(()) => summary.succeeded.push(slot),
                Err(e) => summary.failed.push((slot, e.to_string())),
            }
        }

        let launched_so_far = summary.succeeded.len();
        wait_for_launch_drain(&plan.workdir, launched_so_far, cap).await;
    }

    info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        "Deploy run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoConfig;

    fn sample_plan(workdir: PathBuf) -> DeployPlan {
        DeployPlan {
            chain: ChainConfig {
                name: "mainnet".to_string(),
                chain_id: 7865,
                rpc_url: "https://rpc-v2.powerloom.network".to_string(),
            },
            market: MarketConfig {
                name: "uniswapv2".to_string(),
                source_chain: "ETH-MAINNET".to_string(),
                contract_address: "0x21cb57C1f2352ad215a463DD867b838749CD3b8f".to_string(),
                protocol_state_contract_address:
                    "0x000AA7d3a6a2556496f363B59e56D9aA1881548F".to_string(),
                sequencer: None,
                compute: RepoConfig {
                    repo: "https://github.com/powerloom/snapshotter-computes".to_string(),
                    branch: "eth_uniswapv2_lite_v2".to_string(),
                    commit: None,
                },
                config: RepoConfig {
                    repo: "https://github.com/powerloom/snapshotter-configs".to_string(),
                    branch: "eth_uniswapv2_lite_v2".to_string(),
                    commit: None,
                },
            },
            slots: vec![5481, 5482],
            signer_address: "0xSigner".to_string(),
            signer_private_key: "0xKey".to_string(),
            source_rpc_url: "https://eth.example.com".to_string(),
            seed_env: HashMap::new(),
            workdir,
            max_workers: 4,
        }
    }

    #[test]
    fn test_env_file_suffix() {
        assert_eq!(
            env_file_suffix("mainnet", "uniswapv2", "ETH-MAINNET"),
            "MAINNET-UNISWAPV2-ETH"
        );
        assert_eq!(env_file_suffix("devnet", "aavev3", "base"), "DEVNET-AAVEV3-BASE");
    }

    #[test]
    fn test_instance_dir_layout() {
        let dir = instance_dir(Path::new("/work"), "MAINNET", "UNISWAPV2", "ETH-MAINNET", 5481);
        assert_eq!(
            dir,
            Path::new("/work/snapshotter-lite-v2/mainnet/uniswapv2_eth-mainnet/slot-5481")
        );
    }

    #[test]
    fn test_ports_for_index() {
        let first = ports_for_index(0);
        assert_eq!(first.local_collector_port, 50051);
        assert_eq!(first.core_api_port, 8002);
        assert_eq!(first.subnet_third_octet, 1);
        assert!(first.new_collector);

        let third = ports_for_index(2);
        assert_eq!(third.local_collector_port, 50051);
        assert_eq!(third.core_api_port, 8004);
        assert_eq!(third.subnet_third_octet, 3);
        assert!(!third.new_collector);

        let gen2 = ports_for_index(200);
        assert_eq!(gen2.local_collector_port, 50052);
        assert!(gen2.new_collector);
    }

    #[test]
    fn test_build_sh_args() {
        assert_eq!(build_sh_args(true), "--skip-credential-update");
        assert_eq!(build_sh_args(false), "--no-collector --skip-credential-update");
    }

    #[test]
    fn test_render_instance_env_core_values() {
        let plan = sample_plan(PathBuf::from("/work"));
        let rendered = render_instance_env(&plan, 5481, ports_for_index(0));
        let vars = crate::config::envfile::parse_env_str(&rendered);

        assert_eq!(vars.get("SLOT_ID").map(String::as_str), Some("5481"));
        assert_eq!(vars.get("OVERRIDE_DEFAULTS").map(String::as_str), Some("true"));
        assert_eq!(
            vars.get("FULL_NAMESPACE").map(String::as_str),
            Some("MAINNET-UNISWAPV2-ETH")
        );
        assert_eq!(
            vars.get("DOCKER_NETWORK_NAME").map(String::as_str),
            Some("snapshotter-lite-v2-MAINNET-UNISWAPV2-ETH")
        );
        assert_eq!(vars.get("SOURCE_CHAIN").map(String::as_str), Some("ETH"));
        assert_eq!(vars.get("NAMESPACE").map(String::as_str), Some("UNISWAPV2"));
        assert_eq!(vars.get("LOCAL_COLLECTOR_PORT").map(String::as_str), Some("50051"));
        assert_eq!(vars.get("MAX_STREAM_POOL_SIZE").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_render_instance_env_seed_overridable() {
        let mut plan = sample_plan(PathBuf::from("/work"));
        plan.seed_env
            .insert("MAX_STREAM_POOL_SIZE".to_string(), "100".to_string());
        plan.seed_env
            .insert("SIGNER_ACCOUNT_ADDRESS".to_string(), "0xStale".to_string());

        let rendered = render_instance_env(&plan, 5481, ports_for_index(0));
        let vars = crate::config::envfile::parse_env_str(&rendered);

        // Knobs keep the seeded value, resolved credentials do not
        assert_eq!(vars.get("MAX_STREAM_POOL_SIZE").map(String::as_str), Some("100"));
        assert_eq!(
            vars.get("SIGNER_ACCOUNT_ADDRESS").map(String::as_str),
            Some("0xSigner")
        );
    }

    #[test]
    fn test_count_active_lockfiles() {
        let tmp = tempfile::TempDir::new().unwrap();
        let plan = sample_plan(tmp.path().to_path_buf());

        assert_eq!(count_active_lockfiles(tmp.path()), 0);

        for slot in [1u64, 2] {
            let dir = instance_dir(
                tmp.path(),
                &plan.chain.name,
                &plan.market.name,
                &plan.market.source_chain,
                slot,
            );
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(constants::LAUNCH_LOCKFILE_NAME), "x").unwrap();
        }
        assert_eq!(count_active_lockfiles(tmp.path()), 2);
    }
}
