//! Diagnose command: host environment checks and cleanup.

use clap::Args;

use crate::cli::utils::{
    confirm, print_error, print_info, print_success, print_warning, spinner,
};
use crate::cli::Cli;
use crate::deploy::{docker, screen};

/// Container name patterns belonging to snapshotter deployments
const CONTAINER_PATTERNS: [&str; 2] = ["snapshotter-lite-v2", "pl_"];

/// Network name pattern for snapshotter docker networks
const NETWORK_PATTERN: &str = "snapshotter-lite-v2";

/// Diagnose command arguments
#[derive(Args, Clone)]
pub struct DiagnoseCommand {
    /// Remove found sessions, containers and networks
    #[arg(short, long)]
    pub clean: bool,

    /// Skip per-item confirmations during --clean
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(cmd: DiagnoseCommand, cli: &Cli) -> anyhow::Result<()> {
    // Docker daemon
    match docker::ensure_daemon_running().await {
        Ok(()) => print_success("Docker daemon is running"),
        Err(e) => {
            print_error(&format!("Docker check failed: {e}"));
            return Err(e.into());
        }
    }

    // Compose plugin
    if docker::compose_available().await? {
        print_success("docker compose is available");
    } else {
        print_warning("docker compose is not available; deployments will fail to build");
    }

    // Screen sessions
    let sessions = screen::list_managed_sessions().await?;
    if sessions.is_empty() {
        print_info("No snapshotter screen sessions found");
    } else {
        print_info(&format!("Found {} screen session(s):", sessions.len()));
        for session in &sessions {
            println!("  {} ({})", session.name, session.status);
        }
    }

    // Containers
    let pb = spinner("Scanning containers and networks...");
    let mut containers = Vec::new();
    for pattern in CONTAINER_PATTERNS {
        for container in docker::containers_matching(pattern).await? {
            if !containers.contains(&container) {
                containers.push(container);
            }
        }
    }
    let networks = docker::networks_matching(NETWORK_PATTERN).await?;
    pb.finish_and_clear();

    if containers.is_empty() {
        print_info("No snapshotter containers found");
    } else {
        print_info(&format!("Found {} container(s):", containers.len()));
        for container in &containers {
            println!("  {} ({})", container.name, container.status);
        }
    }
    if networks.is_empty() {
        print_info("No snapshotter networks found");
    } else {
        print_info(&format!("Found {} network(s):", networks.len()));
        for network in &networks {
            println!("  {network}");
        }
    }

    if !cmd.clean {
        return Ok(());
    }

    let auto_approve = cmd.force || cli.no_prompt;

    if !sessions.is_empty()
        && confirm(
            &format!("Kill {} screen session(s)?", sessions.len()),
            auto_approve,
        )
    {
        for session in &sessions {
            screen::kill_session(&session.name).await?;
            print_success(&format!("Killed session {}", session.name));
        }
    }

    if !containers.is_empty()
        && confirm(
            &format!("Stop and remove {} container(s)?", containers.len()),
            auto_approve,
        )
    {
        for container in &containers {
            match docker::remove_container(&container.id).await {
                Ok(()) => print_success(&format!("Removed container {}", container.name)),
                Err(e) => print_error(&format!("Failed to remove {}: {e}", container.name)),
            }
        }
    }

    // Networks last: removal fails while attached containers exist
    if !networks.is_empty()
        && confirm(&format!("Remove {} network(s)?", networks.len()), auto_approve)
    {
        for network in &networks {
            match docker::remove_network(network).await {
                Ok(()) => print_success(&format!("Removed network {network}")),
                Err(e) => print_error(&format!("Failed to remove {network}: {e}")),
            }
        }
    }

    Ok(())
}
