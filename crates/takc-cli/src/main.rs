//! takc CLI
//!
//! Compress a knowledge base once per task type, then answer queries from
//! the compression rate that suits each question.

use anyhow::Result;
use clap::Parser;
use takc_core::error::exit_codes;
use takc_core::{Config, KnowledgeService, TakcError};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON and the MCP transport
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(cli.verbose))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<TakcError>()
            .map(TakcError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

/// RUST_LOG wins when set; `--verbose` still raises the floor to info
fn log_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "info" } else { "warn" };
    match EnvFilter::try_from_default_env() {
        Ok(filter) if verbose => filter.add_directive(tracing::Level::INFO.into()),
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Commands::Compress(args) = &cli.command {
        commands::compress::configure(args, &mut config)?;
    }

    if let Commands::Models(args) = &cli.command {
        return commands::models::run(args, &config, cli.format).await;
    }

    let service = KnowledgeService::from_config(config)?;

    match cli.command {
        Commands::Compress(args) => commands::compress::run(args, &service, cli.format).await,
        Commands::Query(args) => commands::query::run(args, &service, cli.format).await,
        Commands::Get(args) => commands::get::run(args, &service, cli.format).await,
        Commands::Ls(args) => commands::ls::run(args, &service, cli.format).await,
        Commands::Models(_) => Ok(()),
        Commands::Mcp => takc_mcp::start_server(&service).await,
    }
}
