//! Status command: show running instances and their containers.

use clap::Args;

use crate::cli::utils::{create_table_with_headers, print_info, print_warning, spinner};
use crate::cli::Cli;
use crate::deploy::{docker, screen};

/// Status command arguments
#[derive(Args, Clone)]
pub struct StatusCommand {
    /// Only show instances on this Powerloom chain
    #[arg(short, long)]
    pub env: Option<String>,

    /// Only show instances of this data market
    #[arg(short, long)]
    pub market: Option<String>,
}

pub async fn execute(cmd: StatusCommand, _cli: &Cli) -> anyhow::Result<()> {
    let pb = spinner("Collecting instance status...");
    let sessions = screen::list_managed_sessions().await;
    pb.finish_and_clear();
    let sessions = sessions?;

    let mut rows = Vec::new();
    for session in &sessions {
        let Some((chain, market, slot)) = screen::parse_session_name(&session.name) else {
            continue;
        };
        if let Some(env) = &cmd.env {
            if !chain.eq_ignore_ascii_case(env) {
                continue;
            }
        }
        if let Some(wanted) = &cmd.market {
            if !market.eq_ignore_ascii_case(wanted) {
                continue;
            }
        }

        let containers = docker::containers_matching(&session.name)
            .await
            .unwrap_or_default();
        let container_summary = if containers.is_empty() {
            "none".to_string()
        } else {
            containers
                .iter()
                .map(|c| format!("{} ({})", c.name, c.status))
                .collect::<Vec<_>>()
                .join(", ")
        };

        rows.push(vec![
            chain.to_uppercase(),
            market.to_uppercase(),
            slot.to_string(),
            session.name.clone(),
            session.status.clone(),
            container_summary,
        ]);
    }

    if rows.is_empty() {
        if cmd.env.is_some() || cmd.market.is_some() {
            print_warning("No running instances match the given filters");
        } else {
            print_info("No running snapshotter instances found");
        }
        return Ok(());
    }

    rows.sort();
    let mut table = create_table_with_headers(&[
        "Chain", "Market", "Slot", "Session", "Session state", "Containers",
    ]);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}
