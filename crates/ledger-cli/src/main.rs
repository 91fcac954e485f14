//! Ledger Query CLI
//!
//! Entry point for running the node's fixed ledger queries and weight
//! estimation from the command line.

mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use ledger_query::{LedgerQueries, QueryRunner, SqliteLedger};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

/// Exit status once the ledger has been declared unusable
const FATAL_EXIT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if commands::is_fatal(&err) => {
            error!("{err:#}");
            error!("ledger is unusable, stopping");
            ExitCode::from(FATAL_EXIT)
        }
        Err(err) => {
            eprintln!("{} {err:#}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.command == Commands::Version {
        return commands::version::execute();
    }

    let config = config::resolve(cli)?;
    let db = SqliteLedger::open(&config)
        .with_context(|| format!("Failed to open ledger {}", config.path))?;
    info!(ledger = %config.path, attempts = config.retry.attempts(), "ledger opened");

    let queries = LedgerQueries::new(QueryRunner::new(config.retry));
    let output = commands::query::run(&cli.command, &queries, &db)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{output}");
    }

    Ok(())
}

/// Initialize logging/tracing based on verbosity level
fn init_logging(verbose: u8) {
    let filter_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
