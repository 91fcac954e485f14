//! Command-line interface definition using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ledger query tool
#[derive(Parser, Debug)]
#[command(name = "ledger-query")]
#[command(version)]
#[command(about = "Run the node's pre-built ledger queries against a ledger database")]
#[command(long_about = "
Opens the transaction ledger read-only and runs one of the fixed catalog
queries, or estimates the registration weight of an address.

A ledger that keeps failing is fatal: the tool stops with exit status 2
instead of printing a partial answer.
")]
pub struct Cli {
    /// Ledger database path (overrides the configuration file)
    #[arg(short = 'd', long, env = "LEDGER_DB")]
    pub db: Option<String>,

    /// Configuration file (TOML format)
    #[arg(short = 'c', long, env = "LEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Attempts per query before giving up
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Pause between attempts, in milliseconds
    #[arg(long, value_name = "MS")]
    pub retry_delay: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (can be used multiple times)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Display version information
    Version,

    /// Estimate the registration weight of an address
    Weight {
        /// Ledger address
        address: String,
        /// Last block height to include
        height: i64,
    },

    /// Net balance of an address (credits minus debits)
    Balance {
        /// Ledger address
        address: String,
        /// Last block height to include
        height: i64,
        /// Use the mirror view (absolute block heights)
        #[arg(long)]
        mirror: bool,
    },

    /// Highest block at or before a timestamp
    HeightAt {
        /// Unix timestamp
        timestamp: f64,
        /// Consider every transaction instead of mined blocks only
        #[arg(long)]
        slow: bool,
    },

    /// Timestamp of a block
    BlockTs {
        /// Block height
        height: i64,
    },

    /// Timestamp of the latest block
    LastTs,

    /// Hypernode registrations and unregistrations in a height range
    Regs {
        /// First block height (inclusive)
        from: i64,
        /// Last block height (inclusive)
        to: i64,
    },
}
