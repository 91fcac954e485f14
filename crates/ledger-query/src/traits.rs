//! Ledger handle trait
//!
//! This module defines the contract every database handle must satisfy to be
//! driven by the query runner. Handles are owned by the caller; the runner
//! never opens or closes them.

use crate::types::{DbResult, RowSource, Value};

/// Read access to a ledger database
///
/// Each call executes one statement and returns the rows it produced. Calls
/// must be free of side effects on the ledger so that they can be repeated
/// after a transient failure.
pub trait LedgerDb: Send + Sync {
    /// Execute a statement with one set of positional bind values
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<RowSource>;

    /// Execute a statement once per bind set, concatenating the results
    fn execute_many(&self, sql: &str, param_sets: &[Vec<Value>]) -> DbResult<RowSource>;

    /// Execute a statement that takes no bind values
    fn execute_plain(&self, sql: &str) -> DbResult<RowSource>;

    /// Short name of the handle, used in log output
    fn name(&self) -> &str {
        "ledger"
    }
}

impl<T: LedgerDb + ?Sized> LedgerDb for &T {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<RowSource> {
        (**self).execute(sql, params)
    }

    fn execute_many(&self, sql: &str, param_sets: &[Vec<Value>]) -> DbResult<RowSource> {
        (**self).execute_many(sql, param_sets)
    }

    fn execute_plain(&self, sql: &str) -> DbResult<RowSource> {
        (**self).execute_plain(sql)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: LedgerDb + ?Sized> LedgerDb for std::sync::Arc<T> {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<RowSource> {
        (**self).execute(sql, params)
    }

    fn execute_many(&self, sql: &str, param_sets: &[Vec<Value>]) -> DbResult<RowSource> {
        (**self).execute_many(sql, param_sets)
    }

    fn execute_plain(&self, sql: &str) -> DbResult<RowSource> {
        (**self).execute_plain(sql)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
