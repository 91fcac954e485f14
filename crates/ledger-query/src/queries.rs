//! Query catalog and typed ledger queries
//!
//! The catalog holds the fixed statements plugins may run against the ledger.
//! [`LedgerQueries`] wraps each of them with typed inputs and outputs so that
//! callers never depend on the `transactions` table layout directly.

use crate::runner::{QueryError, QueryLog, QueryRunner, TracingLog};
use crate::traits::LedgerDb;
use crate::types::{Params, Row, Value};
use crate::weight::{BalanceWeightEstimator, WeightError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A fixed, parameterized statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDef {
    /// Catalog name, used in diagnostics
    pub name: &'static str,
    /// Statement text with positional placeholders
    pub sql: &'static str,
    /// Number of values the statement binds
    pub arity: usize,
}

impl QueryDef {
    /// Bind `values` to this statement
    pub fn bind<I, V>(&self, values: I) -> Params
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let params = Params::single(values);
        if let Params::Single(values) = &params {
            debug_assert_eq!(values.len(), self.arity, "bind count for {}", self.name);
        }
        params
    }

    /// Parameters for a statement without placeholders
    pub fn unbound(&self) -> Params {
        debug_assert_eq!(self.arity, 0, "{} expects bind values", self.name);
        Params::None
    }
}

impl fmt::Display for QueryDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Highest block height with a timestamp at or before `?1`, scanning every row
pub const BLOCK_HEIGHT_PRECEDING_TS_SLOW: QueryDef = QueryDef {
    name: "block_height_preceding_ts_slow",
    sql: "SELECT block_height FROM transactions WHERE timestamp <= ?1 \
          ORDER BY block_height DESC LIMIT 1",
    arity: 1,
};

/// Highest block height with a timestamp at or before `?1`, from mining rewards only
pub const BLOCK_HEIGHT_PRECEDING_TS: QueryDef = QueryDef {
    name: "block_height_preceding_ts",
    sql: "SELECT max(block_height) FROM transactions WHERE timestamp <= ?1 AND reward > 0",
    arity: 1,
};

/// Timestamp of block `?1`
pub const TS_OF_BLOCK: QueryDef = QueryDef {
    name: "ts_of_block",
    sql: "SELECT timestamp FROM transactions WHERE reward > 0 AND block_height = ?1",
    arity: 1,
};

/// Hypernode registrations and unregistrations between heights `?1` and `?2`
pub const REGS_FROM_TO: QueryDef = QueryDef {
    name: "regs_from_to",
    sql: "SELECT block_height, address, operation, openfield, timestamp FROM transactions \
          WHERE (operation = 'hypernode:register' OR operation = 'hypernode:unregister') \
          AND block_height >= ?1 AND block_height <= ?2 \
          ORDER BY block_height ASC",
    arity: 2,
};

/// Sum of `amount + reward` received by `?1` up to height `?2`
pub const QUICK_BALANCE_CREDITS: QueryDef = QueryDef {
    name: "quick_balance_credits",
    sql: "SELECT sum(amount + reward) FROM transactions WHERE recipient = ?1 AND block_height <= ?2",
    arity: 2,
};

/// Sum of `amount + fee` sent by `?1` up to height `?2`
pub const QUICK_BALANCE_DEBITS: QueryDef = QueryDef {
    name: "quick_balance_debits",
    sql: "SELECT sum(amount + fee) FROM transactions WHERE address = ?1 AND block_height <= ?2",
    arity: 2,
};

/// Credits minus debits of `?1` up to height `?2`, in one snapshot read
///
/// NULL when the account has neither credits nor debits in range; a missing
/// side otherwise counts as zero.
pub const QUICK_BALANCE_ALL: QueryDef = QueryDef {
    name: "quick_balance_all",
    sql: "SELECT CASE WHEN c.credit IS NULL AND d.debit IS NULL THEN NULL \
          ELSE ifnull(c.credit, 0) - ifnull(d.debit, 0) END \
          FROM (SELECT sum(amount + reward) AS credit FROM transactions \
                WHERE recipient = ?1 AND block_height <= ?2) AS c, \
               (SELECT sum(amount + fee) AS debit FROM transactions \
                WHERE address = ?1 AND block_height <= ?2) AS d",
    arity: 2,
};

/// [`QUICK_BALANCE_ALL`] over the mirror view, where heights may be negative
pub const QUICK_BALANCE_ALL_MIRROR: QueryDef = QueryDef {
    name: "quick_balance_all_mirror",
    sql: "SELECT CASE WHEN c.credit IS NULL AND d.debit IS NULL THEN NULL \
          ELSE ifnull(c.credit, 0) - ifnull(d.debit, 0) END \
          FROM (SELECT sum(amount + reward) AS credit FROM transactions \
                WHERE recipient = ?1 AND abs(block_height) <= ?2) AS c, \
               (SELECT sum(amount + fee) AS debit FROM transactions \
                WHERE address = ?1 AND abs(block_height) <= ?2) AS d",
    arity: 2,
};

/// Timestamp of the most recent block
pub const LAST_BLOCK_TS: QueryDef = QueryDef {
    name: "last_block_ts",
    sql: "SELECT timestamp FROM transactions WHERE block_height = \
          (SELECT max(block_height) FROM transactions)",
    arity: 0,
};

/// Every catalog entry
pub const CATALOG: [QueryDef; 9] = [
    BLOCK_HEIGHT_PRECEDING_TS_SLOW,
    BLOCK_HEIGHT_PRECEDING_TS,
    TS_OF_BLOCK,
    REGS_FROM_TO,
    QUICK_BALANCE_CREDITS,
    QUICK_BALANCE_DEBITS,
    QUICK_BALANCE_ALL,
    QUICK_BALANCE_ALL_MIRROR,
    LAST_BLOCK_TS,
];

/// Errors from typed ledger queries
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Statement execution failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A column held a value of an unexpected type
    #[error("Unexpected {found} value for {column} in {query}")]
    UnexpectedValue {
        query: &'static str,
        column: String,
        found: &'static str,
    },
}

impl LedgerError {
    /// Whether the caller must stop using the ledger handle
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Query(e) if e.is_fatal())
    }
}

/// Read the first column of `row` as a number; NULL or no row is `None`
pub(crate) fn scalar_f64(query: &QueryDef, row: Option<Row>) -> Result<Option<f64>, LedgerError> {
    let Some(value) = row.and_then(|row| row.into_values().into_iter().next()) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    value.as_f64().map(Some).ok_or(LedgerError::UnexpectedValue {
        query: query.name,
        column: "0".to_string(),
        found: value.type_name(),
    })
}

fn scalar_i64(query: &QueryDef, row: Option<Row>) -> Result<Option<i64>, LedgerError> {
    let Some(value) = row.and_then(|row| row.into_values().into_iter().next()) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    value.as_i64().map(Some).ok_or(LedgerError::UnexpectedValue {
        query: query.name,
        column: "0".to_string(),
        found: value.type_name(),
    })
}

/// Registration event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationKind {
    /// `hypernode:register`
    Register,
    /// `hypernode:unregister`
    Unregister,
}

impl RegistrationKind {
    /// Operation string stored in the ledger
    pub fn operation(&self) -> &'static str {
        match self {
            RegistrationKind::Register => "hypernode:register",
            RegistrationKind::Unregister => "hypernode:unregister",
        }
    }

    /// Parse a ledger operation string
    pub fn from_operation(operation: &str) -> Option<Self> {
        match operation {
            "hypernode:register" => Some(RegistrationKind::Register),
            "hypernode:unregister" => Some(RegistrationKind::Unregister),
            _ => None,
        }
    }
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// One hypernode registration or unregistration transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    /// Block containing the transaction
    pub block_height: i64,
    /// Sending address
    pub address: String,
    /// Register or unregister
    pub kind: RegistrationKind,
    /// Free-form payload (ip:port, pos address, ...)
    pub openfield: String,
    /// Transaction timestamp
    pub timestamp: f64,
}

impl RegistrationEvent {
    fn from_row(row: &Row) -> Result<Self, LedgerError> {
        fn unexpected(column: &str, value: Option<&Value>) -> LedgerError {
            LedgerError::UnexpectedValue {
                query: REGS_FROM_TO.name,
                column: column.to_string(),
                found: value.map_or("missing", Value::type_name),
            }
        }

        let text = |column: &str| -> Result<String, LedgerError> {
            let value = row.get_named(column);
            match value {
                Some(Value::Text(s)) => Ok(s.clone()),
                Some(Value::Null) => Ok(String::new()),
                _ => Err(unexpected(column, value)),
            }
        };

        let block_height = row
            .get_named("block_height")
            .and_then(Value::as_i64)
            .ok_or_else(|| unexpected("block_height", row.get_named("block_height")))?;
        let timestamp = row
            .get_named("timestamp")
            .and_then(Value::as_f64)
            .ok_or_else(|| unexpected("timestamp", row.get_named("timestamp")))?;
        let operation = text("operation")?;
        let kind = RegistrationKind::from_operation(&operation)
            .ok_or_else(|| unexpected("operation", row.get_named("operation")))?;

        Ok(RegistrationEvent {
            block_height,
            address: text("address")?,
            kind,
            openfield: text("openfield")?,
            timestamp,
        })
    }
}

/// Typed access to the query catalog
///
/// Owns the [`QueryRunner`]; the ledger handle is passed to every call.
#[derive(Debug)]
pub struct LedgerQueries<L = TracingLog> {
    runner: QueryRunner<L>,
}

impl Default for LedgerQueries {
    fn default() -> Self {
        Self::new(QueryRunner::default())
    }
}

impl<L: QueryLog> LedgerQueries<L> {
    /// Wrap a runner
    pub fn new(runner: QueryRunner<L>) -> Self {
        LedgerQueries { runner }
    }

    /// Underlying runner
    pub fn runner(&self) -> &QueryRunner<L> {
        &self.runner
    }

    /// Weight estimator sharing this runner
    pub fn estimator(&self) -> BalanceWeightEstimator<'_, L> {
        BalanceWeightEstimator::new(&self.runner)
    }

    /// Highest rewarded block at or before `timestamp`
    pub fn block_height_preceding<D>(&self, db: &D, timestamp: f64) -> Result<Option<i64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = BLOCK_HEIGHT_PRECEDING_TS;
        scalar_i64(&q, self.runner.fetch_one(db, q.sql, &q.bind([timestamp]))?)
    }

    /// Highest block at or before `timestamp`, considering every transaction
    pub fn block_height_preceding_slow<D>(&self, db: &D, timestamp: f64) -> Result<Option<i64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = BLOCK_HEIGHT_PRECEDING_TS_SLOW;
        scalar_i64(&q, self.runner.fetch_one(db, q.sql, &q.bind([timestamp]))?)
    }

    /// Timestamp of block `height`
    pub fn block_timestamp<D>(&self, db: &D, height: i64) -> Result<Option<f64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = TS_OF_BLOCK;
        scalar_f64(&q, self.runner.fetch_one(db, q.sql, &q.bind([height]))?)
    }

    /// Timestamp of the latest block
    pub fn last_block_timestamp<D>(&self, db: &D) -> Result<Option<f64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = LAST_BLOCK_TS;
        scalar_f64(&q, self.runner.fetch_one(db, q.sql, &q.unbound())?)
    }

    /// Registration events with `from <= block_height <= to`, oldest first
    pub fn registrations_between<D>(&self, db: &D, from: i64, to: i64) -> Result<Vec<RegistrationEvent>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = REGS_FROM_TO;
        self.runner
            .fetch_all(db, q.sql, &q.bind([from, to]))?
            .iter()
            .map(RegistrationEvent::from_row)
            .collect()
    }

    /// Total received by `address` up to `height`
    pub fn credits<D>(&self, db: &D, address: &str, height: i64) -> Result<Option<f64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = QUICK_BALANCE_CREDITS;
        let params = q.bind([Value::from(address), Value::from(height)]);
        scalar_f64(&q, self.runner.fetch_one(db, q.sql, &params)?)
    }

    /// Total sent by `address`, fees included, up to `height`
    pub fn debits<D>(&self, db: &D, address: &str, height: i64) -> Result<Option<f64>, LedgerError>
    where
        D: LedgerDb + ?Sized,
    {
        let q = QUICK_BALANCE_DEBITS;
        let params = q.bind([Value::from(address), Value::from(height)]);
        scalar_f64(&q, self.runner.fetch_one(db, q.sql, &params)?)
    }

    /// Net balance of `address` up to `height`
    pub fn net_balance<D>(&self, db: &D, address: &str, height: i64) -> Result<Option<f64>, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        self.estimator().net_balance(db, address, height)
    }

    /// Net balance of `address` in the mirror view, up to absolute height `height`
    pub fn net_balance_mirror<D>(&self, db: &D, address: &str, height: i64) -> Result<Option<f64>, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        self.estimator().net_balance_with(db, &QUICK_BALANCE_ALL_MIRROR, address, height)
    }

    /// Registration weight of `address` at `height`
    pub fn estimate_weight<D>(&self, db: &D, address: &str, height: i64) -> Result<i64, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        self.estimator().estimate_weight(db, address, height)
    }
}
