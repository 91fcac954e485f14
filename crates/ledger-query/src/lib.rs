//! Read-only Query Façade over the Transaction Ledger
//!
//! This crate gives plugins typed, pre-built queries against the node's
//! append-only `transactions` ledger without exposing them to the table
//! layout or to transient database failures. It includes:
//!
//! - The `LedgerDb` handle trait and its SQLite implementation
//! - `QueryRunner`, which retries transient failures and halts for good once
//!   its attempt budget is spent
//! - The fixed query catalog and the `LedgerQueries` typed wrappers
//! - `BalanceWeightEstimator`, mapping historical balances to registration weights
//!
//! ## Basic Usage
//!
//! ```rust
//! use ledger_query::{LedgerQueries, SqliteLedger};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch(
//!     "CREATE TABLE transactions (block_height INTEGER, timestamp NUMERIC, address TEXT,
//!          recipient TEXT, amount NUMERIC, fee NUMERIC, reward NUMERIC,
//!          operation TEXT, openfield TEXT);
//!      INSERT INTO transactions VALUES (100, 1.0, 'miner', 'node', 50000, 0, 0, '', '');",
//! ).unwrap();
//! let db = SqliteLedger::from_connection(conn).unwrap();
//!
//! let queries = LedgerQueries::default();
//! assert_eq!(queries.estimate_weight(&db, "node", 120).unwrap(), 3);
//! ```

pub mod config;
pub mod queries;
pub mod runner;
pub mod traits;
pub mod types;
pub mod weight;

#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export core types and traits
pub use config::{LedgerConfig, RetryPolicy};
pub use queries::{LedgerError, LedgerQueries, QueryDef, RegistrationEvent, RegistrationKind};
pub use runner::{QueryError, QueryLog, QueryRunner, TracingLog};
pub use traits::LedgerDb;
pub use types::*;
pub use weight::{weight_for_balance, BalanceWeightEstimator, WeightError, MAX_WEIGHT, WEIGHT_UNIT};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;
