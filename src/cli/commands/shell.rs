//! Interactive shell dispatching the regular subcommands.

use std::io::Write;

use clap::Parser;

use crate::cli::utils::{print_error, print_info};
use crate::cli::{Cli, Commands};

/// Split a command line into tokens, honoring single and double quotes.
///
/// A quote inside the other quote kind is literal. Unterminated quotes are
/// an error.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err("Unterminated quote".to_string());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn print_help() {
    println!("Available commands:");
    println!("  deploy     Deploy snapshotter instances for owned slots");
    println!("  configure  Create or update a namespaced credential file");
    println!("  identity   Manage stored credential files");
    println!("  status     Show running instances and container status");
    println!("  list       List available chains and data markets");
    println!("  diagnose   Check the host environment, optionally clean up");
    println!("  help       Show this help");
    println!("  clear      Clear the screen");
    println!("  exit       Leave the shell");
}

/// Run the interactive shell loop.
pub async fn run_shell() -> anyhow::Result<()> {
    print_info("Interactive shell. Type 'help' for commands, 'exit' to leave.");

    let stdin = std::io::stdin();
    loop {
        print!("plcli> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            // EOF
            println!();
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "exit" | "quit" => return Ok(()),
            "help" => {
                print_help();
                continue;
            }
            "clear" => {
                let _ = console::Term::stdout().clear_screen();
                continue;
            }
            _ => {}
        }

        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                print_error(&e);
                continue;
            }
        };
        if tokens.first().map(String::as_str) == Some("shell") {
            print_error("Already in a shell");
            continue;
        }

        let mut argv = vec!["plcli".to_string()];
        argv.extend(tokens);
        let cli = match Cli::try_parse_from(&argv) {
            Ok(cli) => cli,
            Err(e) => {
                // clap renders its own help/usage output
                let _ = e.print();
                continue;
            }
        };

        let result = match &cli.command {
            Commands::Deploy(cmd) => super::deploy::execute(cmd.clone(), &cli).await,
            Commands::Configure(cmd) => super::configure::execute(cmd.clone(), &cli).await,
            Commands::Identity(cmd) => super::identity::execute(cmd.clone(), &cli).await,
            Commands::Status(cmd) => super::status::execute(cmd.clone(), &cli).await,
            Commands::List(cmd) => super::list::execute(cmd.clone(), &cli).await,
            Commands::Diagnose(cmd) => super::diagnose::execute(cmd.clone(), &cli).await,
            Commands::Shell => {
                print_error("Already in a shell");
                Ok(())
            }
        };
        if let Err(e) = result {
            print_error(&format!("{e:#}"));
        }
    }
}
