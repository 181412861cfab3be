//! Command-line interface for managing snapshotter node deployments
//!
//! # Commands
//!
//! - `deploy` - Deploy node instances for owned slots
//! - `configure` - Create or update per chain/market credentials
//! - `identity` - Manage stored credential files
//! - `status` - Show running instances and their containers
//! - `list` - List available chains and data markets
//! - `diagnose` - Check the host environment, optionally clean up
//! - `shell` - Interactive shell dispatching the same commands

use clap::{Parser, Subcommand};

pub mod commands;
pub mod utils;

/// Powerloom snapshotter deployment CLI
#[derive(Parser)]
#[command(name = "plcli")]
#[command(author = "Powerloom Protocol")]
#[command(version)]
#[command(about = "Deployment CLI for Powerloom snapshotter nodes", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Don't prompt for confirmations (auto-approve)
    #[arg(long, global = true)]
    pub no_prompt: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy snapshotter instances for owned slots
    #[command(alias = "d")]
    Deploy(commands::deploy::DeployCommand),

    /// Create or update a namespaced credential file
    #[command(alias = "c")]
    Configure(commands::configure::ConfigureCommand),

    /// Manage stored credential files
    #[command(alias = "id")]
    Identity(commands::identity::IdentityCommand),

    /// Show running instances and container status
    #[command(alias = "st")]
    Status(commands::status::StatusCommand),

    /// List available chains and data markets
    #[command(alias = "ls")]
    List(commands::list::ListCommand),

    /// Check the host environment and optionally clean up
    Diagnose(commands::diagnose::DiagnoseCommand),

    /// Interactive shell
    Shell,
}

/// Run the CLI application
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Deploy(cmd) => commands::deploy::execute(cmd.clone(), &cli).await,
        Commands::Configure(cmd) => commands::configure::execute(cmd.clone(), &cli).await,
        Commands::Identity(cmd) => commands::identity::execute(cmd.clone(), &cli).await,
        Commands::Status(cmd) => commands::status::execute(cmd.clone(), &cli).await,
        Commands::List(cmd) => commands::list::execute(cmd.clone(), &cli).await,
        Commands::Diagnose(cmd) => commands::diagnose::execute(cmd.clone(), &cli).await,
        Commands::Shell => commands::shell::run_shell().await,
    }
}
