//! Ledger query commands

use crate::cli::Commands;
use anyhow::{bail, Context, Result};
use ledger_query::{LedgerDb, LedgerQueries, QueryLog, RegistrationEvent};
use serde::Serialize;
use std::fmt;

/// Result of a query command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    /// Registration weight of an address
    Weight {
        address: String,
        height: i64,
        weight: i64,
    },
    /// Net balance of an address
    Balance {
        address: String,
        height: i64,
        mirror: bool,
        balance: Option<f64>,
    },
    /// Block height found for a timestamp
    Height { timestamp: f64, height: Option<i64> },
    /// Timestamp found for a block
    Timestamp {
        height: Option<i64>,
        timestamp: Option<f64>,
    },
    /// Registration events
    Registrations(Vec<RegistrationEvent>),
}

fn or_none<T: fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "none".to_string(), ToString::to_string)
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Weight { weight, .. } => write!(f, "{weight}"),
            Output::Balance { balance, .. } => f.write_str(&or_none(balance.as_ref())),
            Output::Height { height, .. } => f.write_str(&or_none(height.as_ref())),
            Output::Timestamp { timestamp, .. } => f.write_str(&or_none(timestamp.as_ref())),
            Output::Registrations(events) => {
                for (i, event) in events.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "{}\t{}\t{}\t{}\t{}",
                        event.block_height, event.kind, event.address, event.openfield, event.timestamp
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Run a query command against `db`
pub fn run<L, D>(command: &Commands, queries: &LedgerQueries<L>, db: &D) -> Result<Output>
where
    L: QueryLog,
    D: LedgerDb + ?Sized,
{
    let output = match command {
        Commands::Weight { address, height } => {
            let weight = queries
                .estimate_weight(db, address, *height)
                .with_context(|| format!("weight of {address} at block {height}"))?;
            Output::Weight {
                address: address.clone(),
                height: *height,
                weight,
            }
        }
        Commands::Balance {
            address,
            height,
            mirror,
        } => {
            let balance = if *mirror {
                queries.net_balance_mirror(db, address, *height)
            } else {
                queries.net_balance(db, address, *height)
            }
            .with_context(|| format!("balance of {address} at block {height}"))?;
            Output::Balance {
                address: address.clone(),
                height: *height,
                mirror: *mirror,
                balance,
            }
        }
        Commands::HeightAt { timestamp, slow } => {
            let height = if *slow {
                queries.block_height_preceding_slow(db, *timestamp)
            } else {
                queries.block_height_preceding(db, *timestamp)
            }
            .with_context(|| format!("block height at {timestamp}"))?;
            Output::Height {
                timestamp: *timestamp,
                height,
            }
        }
        Commands::BlockTs { height } => Output::Timestamp {
            height: Some(*height),
            timestamp: queries
                .block_timestamp(db, *height)
                .with_context(|| format!("timestamp of block {height}"))?,
        },
        Commands::LastTs => Output::Timestamp {
            height: None,
            timestamp: queries
                .last_block_timestamp(db)
                .context("timestamp of the last block")?,
        },
        Commands::Regs { from, to } => Output::Registrations(
            queries
                .registrations_between(db, *from, *to)
                .with_context(|| format!("registrations in blocks {from}..={to}"))?,
        ),
        Commands::Version => bail!("version is not a ledger query"),
    };

    Ok(output)
}
