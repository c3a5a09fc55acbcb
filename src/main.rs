// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::collections::HashMap;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use praxis_node::{Node, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Completions { shell } => {
            cli::print_completions(shell);
            Ok(())
        }
    }
}

async fn run(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let config = praxis_node::config::load(config_path.as_deref())?;
    let node = Node::start(config, HashMap::new()).await?;

    let card = node.local_card().await;
    tracing::info!(name = %card.name, version = %card.version, "node started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    node.shutdown().await;
    Ok(())
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
