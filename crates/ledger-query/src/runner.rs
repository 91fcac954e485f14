//! Resilient statement execution
//!
//! [`QueryRunner`] executes statements against a caller-owned [`LedgerDb`]
//! handle. Transient failures are retried with a fixed pause; once the attempt
//! budget is spent the runner reports [`QueryError::Exhausted`] and halts, so
//! no later statement reaches the database. Deciding whether to stop the
//! process is left to the host application.

use crate::config::RetryPolicy;
use crate::traits::LedgerDb;
use crate::types::{DbError, Params, Row, RowSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Query execution errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Statement text was empty
    #[error("Empty statement")]
    EmptyStatement,

    /// The database refused the statement itself; retrying cannot help
    #[error("Statement rejected: {statement}: {source}")]
    Rejected {
        statement: String,
        #[source]
        source: DbError,
    },

    /// Retry budget spent on transient failures
    #[error("Database unavailable after {attempts} attempts: {statement}: {source}")]
    Exhausted {
        statement: String,
        attempts: u32,
        #[source]
        source: DbError,
    },

    /// A previous statement exhausted its retries; the runner accepts no more work
    #[error("Query runner halted after a fatal database failure")]
    Halted,
}

impl QueryError {
    /// Whether the caller must stop using the ledger handle
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueryError::Exhausted { .. } | QueryError::Halted)
    }
}

/// Sink for the runner's failure reports
pub trait QueryLog: Send + Sync {
    /// A transient failure on attempt number `attempt` (1-based)
    fn attempt_failed(&self, ledger: &str, statement: &str, attempt: u32, error: &DbError);

    /// The database rejected the statement outright
    fn rejected(&self, ledger: &str, statement: &str, error: &DbError);

    /// The retry budget is spent
    fn exhausted(&self, ledger: &str, statement: &str, attempts: u32, error: &DbError);
}

/// [`QueryLog`] that reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl QueryLog for TracingLog {
    fn attempt_failed(&self, ledger: &str, statement: &str, attempt: u32, error: &DbError) {
        warn!(ledger, attempt, "Database query failed: {}", statement);
        warn!(ledger, attempt, "Database retry reason: {}", error);
    }

    fn rejected(&self, ledger: &str, statement: &str, error: &DbError) {
        error!(ledger, "Database rejected query: {}: {}", statement, error);
    }

    fn exhausted(&self, ledger: &str, statement: &str, attempts: u32, error: &DbError) {
        error!(
            ledger,
            attempts, "Database error, giving up on query: {}: {}", statement, error
        );
    }
}

/// Executes statements with bounded retry
#[derive(Debug)]
pub struct QueryRunner<L = TracingLog> {
    policy: RetryPolicy,
    log: L,
    halted: AtomicBool,
}

impl QueryRunner {
    /// Create a runner that logs through `tracing`
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_log(policy, TracingLog)
    }
}

impl Default for QueryRunner {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<L: QueryLog> QueryRunner<L> {
    /// Create a runner reporting failures to `log`
    pub fn with_log(policy: RetryPolicy, log: L) -> Self {
        QueryRunner {
            policy,
            log,
            halted: AtomicBool::new(false),
        }
    }

    /// Retry policy in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Failure sink
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Whether a fatal failure has stopped this runner
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Execute `statement`, retrying transient failures
    pub fn execute<D>(&self, db: &D, statement: &str, params: &Params) -> Result<RowSource, QueryError>
    where
        D: LedgerDb + ?Sized,
    {
        if self.is_halted() {
            return Err(QueryError::Halted);
        }
        if statement.trim().is_empty() {
            return Err(QueryError::EmptyStatement);
        }

        let max_attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            let result = match params {
                Params::None => db.execute_plain(statement),
                Params::Single(values) => db.execute(statement, values),
                Params::Batch(sets) => db.execute_many(statement, sets),
            };

            let err = match result {
                Ok(source) => {
                    if attempt > 0 {
                        debug!(ledger = db.name(), attempt, "query recovered after retry");
                    }
                    return Ok(source);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                self.log.rejected(db.name(), statement, &err);
                return Err(QueryError::Rejected {
                    statement: statement.to_string(),
                    source: err,
                });
            }

            attempt += 1;
            self.log.attempt_failed(db.name(), statement, attempt, &err);

            if attempt >= max_attempts {
                self.halted.store(true, Ordering::SeqCst);
                self.log.exhausted(db.name(), statement, attempt, &err);
                return Err(QueryError::Exhausted {
                    statement: statement.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.policy.delay();
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    /// Execute `statement` and return its first row, `None` if it produced none
    pub fn fetch_one<D>(&self, db: &D, statement: &str, params: &Params) -> Result<Option<Row>, QueryError>
    where
        D: LedgerDb + ?Sized,
    {
        let mut source = self.execute(db, statement, params)?;
        Ok(source.fetch_one())
    }

    /// Execute `statement` and return every row
    pub fn fetch_all<D>(&self, db: &D, statement: &str, params: &Params) -> Result<Vec<Row>, QueryError>
    where
        D: LedgerDb + ?Sized,
    {
        Ok(self.execute(db, statement, params)?.fetch_all())
    }
}
