//! Screen session management
//!
//! Instances run inside detached GNU screen sessions named
//! `pl_{chain}_{market}_{slot}`. `screen -ls` exits 1 when sessions exist
//! and 0 when none do, so only return codes above 1 are treated as errors.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::constants;
use crate::errors::{ScreenError, SnapshotterResult};

/// One parsed entry from `screen -ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSession {
    pub pid: String,
    pub name: String,
    pub status: String,
}

/// Screen session name for a deployed instance.
pub fn session_name(chain: &str, market: &str, slot_id: u64) -> String {
    format!(
        "{}{}_{}_{}",
        constants::SCREEN_SESSION_PREFIX,
        chain.to_lowercase(),
        market.to_lowercase(),
        slot_id
    )
}

/// Whether a session name belongs to this toolkit, current or legacy form.
pub fn is_managed_session(name: &str) -> bool {
    name.starts_with(constants::SCREEN_SESSION_PREFIX)
        || constants::LEGACY_SESSION_PREFIXES
            .iter()
            .any(|p| name.starts_with(p))
}

async fn run_screen_ls() -> SnapshotterResult<String> {
    let output = timeout(
        Duration::from_secs(constants::TOOL_PROBE_TIMEOUT_SECS),
        Command::new("screen").arg("-ls").output(),
    )
    .await
    .map_err(|_| ScreenError::new("Timed out running `screen -ls`"))?
    .map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ScreenError::new("`screen` command not found. Is screen installed?")
        } else {
            ScreenError::new(format!("Failed to run `screen -ls`: {e}"))
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    if code > 1 && !stdout.contains("No Sockets found") && !stderr.contains("No Sockets found") {
        return Err(ScreenError::new(format!(
            "`screen -ls` failed with code {code}: {}",
            stderr.trim()
        ))
        .into());
    }
    Ok(stdout)
}

/// Parse `screen -ls` output into session entries.
///
/// Session lines are tab separated: `{pid}.{name}\t({timestamp})\t({state})`.
pub fn parse_screen_ls(output: &str) -> Vec<ScreenSession> {
    let mut sessions = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        let mut parts = line.split('\t');
        let Some(pid_name) = parts.next() else {
            continue;
        };
        let Some((pid, name)) = pid_name.split_once('.') else {
            continue;
        };
        if pid.chars().any(|c| !c.is_ascii_digit()) {
            continue;
        }
        let status = parts.collect::<Vec<_>>().join(" ").trim().to_string();
        sessions.push(ScreenSession {
            pid: pid.to_string(),
            name: name.to_string(),
            status,
        });
    }
    sessions
}

/// All live screen sessions.
pub async fn list_sessions() -> SnapshotterResult<Vec<ScreenSession>> {
    Ok(parse_screen_ls(&run_screen_ls().await?))
}

/// Live sessions managed by this toolkit (current or legacy naming).
pub async fn list_managed_sessions() -> SnapshotterResult<Vec<ScreenSession>> {
    Ok(list_sessions()
        .await?
        .into_iter()
        .filter(|s| is_managed_session(&s.name))
        .collect())
}

/// Whether a session with exactly this name is live.
pub async fn session_exists(name: &str) -> SnapshotterResult<bool> {
    Ok(list_sessions().await?.iter().any(|s| s.name == name))
}

/// Count live sessions whose name starts with `prefix`.
pub async fn count_sessions_with_prefix(prefix: &str) -> SnapshotterResult<usize> {
    Ok(list_sessions()
        .await?
        .iter()
        .filter(|s| s.name.starts_with(prefix))
        .count())
}

/// Create a detached session in `workdir` and stuff a command into it.
///
/// Fails if a session with the same name already exists; the operator must
/// clean it up first.
pub async fn launch_in_session(
    name: &str,
    workdir: &Path,
    command: &str,
) -> SnapshotterResult<()> {
    if session_exists(name).await? {
        return Err(ScreenError::with_session(
            format!(
                "Screen session '{name}' already exists. \
                 Clean it up with `screen -X -S {name} quit` and retry"
            ),
            name,
        )
        .into());
    }

    debug!(session = name, workdir = %workdir.display(), "Creating screen session");
    let status = Command::new("screen")
        .args(["-dmS", name])
        .current_dir(workdir)
        .status()
        .await
        .map_err(|e| ScreenError::with_session(format!("Failed to create session: {e}"), name))?;
    if !status.success() {
        return Err(
            ScreenError::with_session("Failed to create detached screen session", name).into(),
        );
    }

    let status = Command::new("screen")
        .args(stuff_args(name, command))
        .current_dir(workdir)
        .status()
        .await
        .map_err(|e| ScreenError::with_session(format!("Failed to send command: {e}"), name))?;
    if !status.success() {
        // Session was created but the command never made it in. Tear it down
        // so a retry does not hit the duplicate-session error.
        let _ = kill_session(name).await;
        return Err(ScreenError::with_session(
            format!("Failed to send '{command}' into session"),
            name,
        )
        .into());
    }

    Ok(())
}

/// Arguments for stuffing a command into a detached session.
///
/// Targets the session with `-S`; `-r` would try to resume it, which needs
/// a controlling terminal.
fn stuff_args(name: &str, command: &str) -> Vec<String> {
    vec![
        "-S".to_string(),
        name.to_string(),
        "-p".to_string(),
        "0".to_string(),
        "-X".to_string(),
        "stuff".to_string(),
        format!("{command}\n"),
    ]
}

/// Terminate a session by name.
pub async fn kill_session(name: &str) -> SnapshotterResult<()> {
    let status = Command::new("screen")
        .args(["-X", "-S", name, "quit"])
        .status()
        .await
        .map_err(|e| ScreenError::with_session(format!("Failed to quit session: {e}"), name))?;
    if !status.success() {
        warn!(session = name, "screen quit returned non-zero");
    }
    Ok(())
}

/// Extract (chain, market, slot) from a managed session name.
///
/// Understands the current `pl_{chain}_{market}_{slot}` form and the legacy
/// `powerloom-{chain}-{market}-{slot}` and
/// `snapshotter-lite-v2-{slot}-{chain}-{market}` forms.
pub fn parse_session_name(name: &str) -> Option<(String, String, u64)> {
    if let Some(rest) = name.strip_prefix(constants::SCREEN_SESSION_PREFIX) {
        let parts: Vec<&str> = rest.split('_').collect();
        if parts.len() >= 3 {
            if let Ok(slot) = parts[parts.len() - 1].parse::<u64>() {
                let chain = parts[0].to_string();
                let market = parts[1..parts.len() - 1].join("_");
                return Some((chain, market, slot));
            }
        }
        return None;
    }
    if let Some(rest) = name.strip_prefix("powerloom-") {
        let parts: Vec<&str> = rest.split('-').collect();
        if parts.len() >= 3 {
            if let Ok(slot) = parts[parts.len() - 1].parse::<u64>() {
                let chain = parts[0].to_string();
                let market = parts[1..parts.len() - 1].join("-");
                return Some((chain, market, slot));
            }
        }
        return None;
    }
    if let Some(rest) = name.strip_prefix("snapshotter-lite-v2-") {
        let parts: Vec<&str> = rest.split('-').collect();
        if parts.len() >= 3 {
            if let Ok(slot) = parts[0].parse::<u64>() {
                let chain = parts[1].to_string();
                let market = parts[2..].join("-");
                return Some((chain, market, slot));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LS: &str = "There are screens on:\n\
        \t12345.pl_mainnet_uniswapv2_5481\t(01/23/2024 11:29:09 AM)\t(Detached)\n\
        \t12346.pl_mainnet_aavev3_5482\t(01/23/2024 11:30:00 AM)\t(Attached)\n\
        \t12399.unrelated_session\t(01/23/2024 11:31:00 AM)\t(Detached)\n\
        3 Sockets in /run/screen/S-root.\n";

    #[test]
    fn test_session_name_format() {
        assert_eq!(
            session_name("MAINNET", "UNISWAPV2", 5481),
            "pl_mainnet_uniswapv2_5481"
        );
    }

    #[test]
    fn test_parse_screen_ls() {
        let sessions = parse_screen_ls(SAMPLE_LS);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].pid, "12345");
        assert_eq!(sessions[0].name, "pl_mainnet_uniswapv2_5481");
        assert!(sessions[0].status.contains("Detached"));
        assert!(sessions[1].status.contains("Attached"));
    }

    #[test]
    fn test_parse_screen_ls_no_sessions() {
        let sessions = parse_screen_ls("No Sockets found in /run/screen/S-root.\n");
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_is_managed_session() {
        assert!(is_managed_session("pl_mainnet_uniswapv2_5481"));
        assert!(is_managed_session("powerloom-mainnet-uniswapv2-5481"));
        assert!(is_managed_session("snapshotter-lite-v2-5481-MAINNET-uniswapv2"));
        assert!(!is_managed_session("unrelated_session"));
    }

    #[test]
    fn test_parse_session_name_current() {
        assert_eq!(
            parse_session_name("pl_mainnet_uniswapv2_5481"),
            Some(("mainnet".to_string(), "uniswapv2".to_string(), 5481))
        );
    }

    #[test]
    fn test_parse_session_name_market_with_underscore() {
        assert_eq!(
            parse_session_name("pl_mainnet_uniswap_v2_5481"),
            Some(("mainnet".to_string(), "uniswap_v2".to_string(), 5481))
        );
    }

    #[test]
    fn test_parse_session_name_legacy_powerloom() {
        assert_eq!(
            parse_session_name("powerloom-mainnet-uniswapv2-5481"),
            Some(("mainnet".to_string(), "uniswapv2".to_string(), 5481))
        );
    }

    #[test]
    fn test_parse_session_name_legacy_lite_v2() {
        assert_eq!(
            parse_session_name("snapshotter-lite-v2-5481-MAINNET-uniswapv2"),
            Some(("MAINNET".to_string(), "uniswapv2".to_string(), 5481))
        );
    }

    #[test]
    fn test_stuff_targets_session_without_resuming() {
        let args = stuff_args("pl_mainnet_uniswapv2_5481", "./build.sh --skip-credential-update");
        assert_eq!(args[0], "-S");
        assert_eq!(args[1], "pl_mainnet_uniswapv2_5481");
        assert!(!args.contains(&"-r".to_string()));
        assert_eq!(args[6], "./build.sh --skip-credential-update\n");
    }

    #[test]
    fn test_parse_session_name_rejects_garbage() {
        assert_eq!(parse_session_name("pl_mainnet_uniswapv2_notanum"), None);
        assert_eq!(parse_session_name("unrelated"), None);
    }
}
