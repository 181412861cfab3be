//! Deployment layout, env rendering and session naming tests.

use std::collections::HashMap;
use std::path::Path;

use snapshotter_rs::config::envfile::parse_env_str;
use snapshotter_rs::core::constants;
use snapshotter_rs::deploy::screen::{parse_session_name, session_name};
use snapshotter_rs::deploy::{
    build_sh_args, count_active_lockfiles, env_file_suffix, instance_dir, ports_for_index,
    render_instance_env, DeployPlan,
};
use snapshotter_rs::{ChainConfig, MarketConfig, RepoConfig};
use tempfile::TempDir;

fn sample_plan(workdir: &Path) -> DeployPlan {
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
            protocol_state_contract_address: "0x000AA7d3a6a2556496f363B59e56D9aA1881548F"
                .to_string(),
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
        slots: vec![5481, 5482, 5483],
        signer_address: "0xSignerAddress".to_string(),
        signer_private_key: "0xSignerKey".to_string(),
        source_rpc_url: "https://eth.llamarpc.com".to_string(),
        seed_env: HashMap::new(),
        workdir: workdir.to_path_buf(),
        max_workers: 4,
    }
}

#[test]
fn test_instance_directory_layout() {
    let dir = instance_dir(
        Path::new("/deploy"),
        "MAINNET",
        "UNISWAPV2",
        "ETH-MAINNET",
        5481,
    );
    assert_eq!(
        dir,
        Path::new("/deploy/snapshotter-lite-v2/mainnet/uniswapv2_eth-mainnet/slot-5481")
    );
}

#[test]
fn test_env_suffix_uses_source_prefix() {
    assert_eq!(
        env_file_suffix("mainnet", "uniswapv2", "ETH-MAINNET"),
        "MAINNET-UNISWAPV2-ETH"
    );
}

#[test]
fn test_rendered_env_has_all_required_fields() {
    let tmp = TempDir::new().unwrap();
    let plan = sample_plan(tmp.path());
    let vars = parse_env_str(&render_instance_env(&plan, 5481, ports_for_index(0)));

    for key in [
        "OVERRIDE_DEFAULTS",
        "SLOT_ID",
        "SIGNER_ACCOUNT_ADDRESS",
        "SIGNER_ACCOUNT_PRIVATE_KEY",
        "POWERLOOM_RPC_URL",
        "SOURCE_RPC_URL",
        "DATA_MARKET_CONTRACT",
        "PROTOCOL_STATE_CONTRACT",
        "SNAPSHOT_CONFIG_REPO",
        "SNAPSHOT_CONFIG_REPO_BRANCH",
        "SNAPSHOTTER_COMPUTE_REPO",
        "SNAPSHOTTER_COMPUTE_REPO_BRANCH",
        "POWERLOOM_CHAIN",
        "NAMESPACE",
        "SOURCE_CHAIN",
        "FULL_NAMESPACE",
        "DOCKER_NETWORK_NAME",
        "LOCAL_COLLECTOR_PORT",
        "CORE_API_PORT",
        "SUBNET_THIRD_OCTET",
        "MAX_STREAM_POOL_SIZE",
        "STREAM_POOL_HEALTH_CHECK_INTERVAL",
        "CONNECTION_REFRESH_INTERVAL_SEC",
        "TELEGRAM_NOTIFICATION_COOLDOWN",
    ] {
        assert!(vars.contains_key(key), "missing {key}");
    }

    assert_eq!(
        vars.get("DOCKER_NETWORK_NAME").map(String::as_str),
        Some("snapshotter-lite-v2-MAINNET-UNISWAPV2-ETH")
    );
    assert_eq!(vars.get("POWERLOOM_CHAIN").map(String::as_str), Some("MAINNET"));
}

#[test]
fn test_port_assignment_across_a_run() {
    let p0 = ports_for_index(0);
    let p1 = ports_for_index(1);
    let p199 = ports_for_index(199);
    let p200 = ports_for_index(200);

    assert!(p0.new_collector);
    assert!(!p1.new_collector);
    assert!(!p199.new_collector);
    assert!(p200.new_collector);

    assert_eq!(p0.local_collector_port, constants::DEFAULT_LOCAL_COLLECTOR_PORT);
    assert_eq!(p199.local_collector_port, constants::DEFAULT_LOCAL_COLLECTOR_PORT);
    assert_eq!(
        p200.local_collector_port,
        constants::DEFAULT_LOCAL_COLLECTOR_PORT + 1
    );

    assert_eq!(p1.core_api_port, p0.core_api_port + 1);
    assert_eq!(p1.subnet_third_octet, p0.subnet_third_octet + 1);
}

#[test]
fn test_collector_flag_maps_to_build_args() {
    assert_eq!(build_sh_args(true), "--skip-credential-update");
    assert_eq!(
        build_sh_args(false),
        "--no-collector --skip-credential-update"
    );
}

#[test]
fn test_session_naming_round_trip() {
    let name = session_name("MAINNET", "UNISWAPV2", 5481);
    assert_eq!(name, "pl_mainnet_uniswapv2_5481");
    assert_eq!(
        parse_session_name(&name),
        Some(("mainnet".to_string(), "uniswapv2".to_string(), 5481))
    );
}

#[test]
fn test_legacy_session_names_still_parse() {
    assert_eq!(
        parse_session_name("powerloom-devnet-aavev3-12"),
        Some(("devnet".to_string(), "aavev3".to_string(), 12))
    );
    assert_eq!(
        parse_session_name("snapshotter-lite-v2-12-DEVNET-aavev3"),
        Some(("DEVNET".to_string(), "aavev3".to_string(), 12))
    );
}

#[test]
fn test_lockfile_counting_over_instance_tree() {
    let tmp = TempDir::new().unwrap();
    let plan = sample_plan(tmp.path());

    assert_eq!(count_active_lockfiles(tmp.path()), 0);

    for (i, slot) in plan.slots.iter().enumerate() {
        let dir = instance_dir(
            tmp.path(),
            &plan.chain.name,
            &plan.market.name,
            &plan.market.source_chain,
            *slot,
        );
        std::fs::create_dir_all(&dir).unwrap();
        // Only the first two instances are still launching
        if i < 2 {
            std::fs::write(dir.join(constants::LAUNCH_LOCKFILE_NAME), "pending").unwrap();
        }
    }
    assert_eq!(count_active_lockfiles(tmp.path()), 2);
}

#[test]
fn test_seeded_env_survives_for_knobs_only() {
    let tmp = TempDir::new().unwrap();
    let mut plan = sample_plan(tmp.path());
    plan.seed_env
        .insert("TELEGRAM_CHAT_ID".to_string(), "12345".to_string());
    plan.seed_env
        .insert("MAX_STREAM_POOL_SIZE".to_string(), "40".to_string());
    plan.seed_env
        .insert("SLOT_ID".to_string(), "99999".to_string());

    let vars = parse_env_str(&render_instance_env(&plan, 5481, ports_for_index(0)));
    assert_eq!(vars.get("TELEGRAM_CHAT_ID").map(String::as_str), Some("12345"));
    assert_eq!(vars.get("MAX_STREAM_POOL_SIZE").map(String::as_str), Some("40"));
    // Resolved values always override seeds
    assert_eq!(vars.get("SLOT_ID").map(String::as_str), Some("5481"));
}
