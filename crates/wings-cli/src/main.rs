// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::configure::ConfigureArgs;

const DEFAULT_CONFIG_PATH: &str = "/etc/pterodactyl/wings.toml";

#[derive(Parser)]
#[command(name = "wings", version, about = "Pterodactyl Wings node daemon")]
struct Cli {
    /// Path to the daemon's wings.toml.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the CLI/daemon version.
    Version,
    /// Fetch this node's configuration from the Panel and write it to disk.
    Configure {
        #[arg(long)]
        panel_url: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        node: String,
    },
    /// Print a redacted diagnostics report for bug reports.
    Diagnostics,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let config = wings_daemon::DaemonConfig::load(&cli.config)?;
            let _guard = wings_daemon::logging::init(&config)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(wings_daemon::boot(config))?;
        }
        Some(Command::Version) => commands::version::run(),
        Some(Command::Configure { panel_url, token, node }) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::configure::run(ConfigureArgs {
                panel_url: &panel_url,
                token: &token,
                node: &node,
                output: &cli.config,
            }))?;
        }
        Some(Command::Diagnostics) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::diagnostics::run(&cli.config));
        }
    }

    Ok(())
}
