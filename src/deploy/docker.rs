//! Docker daemon probes and container/network queries
//!
//! All invocations go through the `docker` CLI with captured output and a
//! probe timeout. `docker info` can exit non-zero with only warnings, so the
//! daemon check also inspects stderr for the well known connect failures.

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::constants;
use crate::errors::{DockerError, SnapshotterResult};

/// A container row from `docker ps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    pub status: String,
    pub id: String,
}

async fn run_docker(args: &[&str]) -> SnapshotterResult<std::process::Output> {
    let output = timeout(
        Duration::from_secs(constants::TOOL_PROBE_TIMEOUT_SECS),
        Command::new("docker").args(args).output(),
    )
    .await
    .map_err(|_| DockerError::new(format!("Timed out running `docker {}`", args.join(" "))))?
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DockerError::missing_binary()
        } else {
            DockerError::new(format!("Failed to run docker: {e}"))
        }
    })?;
    Ok(output)
}

/// Check that the Docker daemon is running and responsive.
pub async fn ensure_daemon_running() -> SnapshotterResult<()> {
    let output = run_docker(&["info"]).await?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("Cannot connect to the Docker daemon")
        || stderr.contains("Is the docker daemon running?")
        || !output.status.success()
    {
        return Err(DockerError::new(
            "Docker daemon is not running or not responsive. Start Docker and retry",
        )
        .into());
    }
    debug!("Docker daemon is responsive");
    Ok(())
}

/// Check that the `docker compose` plugin is available.
pub async fn compose_available() -> SnapshotterResult<bool> {
    let output = run_docker(&["compose", "version"]).await?;
    Ok(output.status.success())
}

/// Parse `docker ps --format '{{.Names}}\t{{.Status}}\t{{.ID}}'` output.
pub fn parse_ps_output(output: &str) -> Vec<ContainerStatus> {
    let mut containers = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, '\t');
        let (Some(name), Some(status), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        containers.push(ContainerStatus {
            name: name.trim().to_string(),
            status: status.trim().to_string(),
            id: id.trim().to_string(),
        });
    }
    containers
}

/// Containers (running or stopped) whose name contains `name_pattern`.
pub async fn containers_matching(name_pattern: &str) -> SnapshotterResult<Vec<ContainerStatus>> {
    let filter = format!("name={name_pattern}");
    let output = run_docker(&[
        "ps",
        "-a",
        "--filter",
        &filter,
        "--format",
        "{{.Names}}\t{{.Status}}\t{{.ID}}",
    ])
    .await?;
    if !output.status.success() {
        warn!(
            pattern = name_pattern,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "docker ps returned non-zero"
        );
        return Ok(Vec::new());
    }
    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Docker networks whose name contains `name_pattern`.
pub async fn networks_matching(name_pattern: &str) -> SnapshotterResult<Vec<String>> {
    let filter = format!("name={name_pattern}");
    let output = run_docker(&[
        "network",
        "ls",
        "--filter",
        &filter,
        "--format",
        "{{.Name}}",
    ])
    .await?;
    if !output.status.success() {
        return Ok(Vec::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Stop and remove a container by name or ID.
pub async fn remove_container(name_or_id: &str) -> SnapshotterResult<()> {
    let stop = run_docker(&["stop", name_or_id]).await?;
    if !stop.status.success() {
        warn!(container = name_or_id, "docker stop returned non-zero");
    }
    let rm = run_docker(&["rm", "-f", name_or_id]).await?;
    if !rm.status.success() {
        return Err(DockerError::new(format!(
            "Failed to remove container {name_or_id}: {}",
            String::from_utf8_lossy(&rm.stderr).trim()
        ))
        .into());
    }
    Ok(())
}

/// Remove a docker network by name.
pub async fn remove_network(name: &str) -> SnapshotterResult<()> {
    let output = run_docker(&["network", "rm", name]).await?;
    if !output.status.success() {
        return Err(DockerError::new(format!(
            "Failed to remove network {name}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_output() {
        let out = "pl_mainnet_uniswapv2_5481-snapshotter-1\tUp 2 hours\tabc123\n\
                   pl_mainnet_uniswapv2_5481-collector-1\tExited (1) 5 minutes ago\tdef456\n";
        let containers = parse_ps_output(out);
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "pl_mainnet_uniswapv2_5481-snapshotter-1");
        assert_eq!(containers[0].status, "Up 2 hours");
        assert_eq!(containers[1].id, "def456");
    }

    #[test]
    fn test_parse_ps_output_skips_malformed() {
        let out = "only-a-name\n\nname\tstatus\tid\n";
        let containers = parse_ps_output(out);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "name");
    }

    #[test]
    fn test_parse_ps_output_empty() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("\n\n").is_empty());
    }
}
