//! SQLite ledger handle
//!
//! Opens the node's ledger database read-only and implements [`LedgerDb`] on
//! top of `rusqlite`. Connection lifecycle stays with the owner of the
//! [`SqliteLedger`]; the query runner only borrows it.

use crate::config::LedgerConfig;
use crate::traits::LedgerDb;
use crate::types::{DbError, DbResult, Row, RowSource, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, OpenFlags, ToSql};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// Map a `rusqlite` error onto the retry taxonomy
///
/// Lock contention is `Busy`; errors that depend only on the statement text
/// or its bindings are `Rejected`; anything else (I/O, corruption, open
/// failures) is a retryable `Backend` error.
pub fn classify(err: rusqlite::Error) -> DbError {
    use rusqlite::Error as E;

    let reason = err.to_string();
    match &err {
        E::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DbError::Busy { reason },
            ErrorCode::TypeMismatch
            | ErrorCode::ParameterOutOfRange
            | ErrorCode::ApiMisuse
            | ErrorCode::ConstraintViolation
            | ErrorCode::ReadOnly
            | ErrorCode::AuthorizationForStatementDenied => DbError::Rejected { reason },
            // Plain SQLITE_ERROR: syntax errors, unknown tables and columns
            ErrorCode::Unknown if failure.extended_code == ffi::SQLITE_ERROR => {
                DbError::Rejected { reason }
            }
            _ => DbError::Backend { reason },
        },
        E::InvalidParameterCount(..)
        | E::InvalidParameterName(_)
        | E::InvalidColumnIndex(_)
        | E::InvalidColumnName(_)
        | E::InvalidColumnType(..)
        | E::MultipleStatement
        | E::ExecuteReturnedResults
        | E::NulError(_)
        | E::InvalidQuery => DbError::Rejected { reason },
        _ => DbError::Backend { reason },
    }
}

/// SQLite-backed ledger handle
#[derive(Debug)]
pub struct SqliteLedger {
    /// Database connection
    conn: Mutex<Connection>,
    /// Name used in log output
    name: String,
}

impl SqliteLedger {
    /// Open the ledger described by `config`
    ///
    /// File databases are opened with `SQLITE_OPEN_READ_ONLY`.
    pub fn open(config: &LedgerConfig) -> DbResult<Self> {
        let conn = if config.is_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        }
        .map_err(|e| DbError::Backend {
            reason: format!("Failed to open ledger database {}: {}", config.path, e),
        })?;

        Self::with_settings(conn, config.path.clone(), config)
    }

    /// Wrap a connection opened elsewhere
    ///
    /// The connection is switched to `query_only` so that nothing issued
    /// through this handle can modify the ledger.
    pub fn from_connection(conn: Connection) -> DbResult<Self> {
        Self::with_settings(conn, "ledger".to_string(), &LedgerConfig::memory())
    }

    fn with_settings(conn: Connection, name: String, config: &LedgerConfig) -> DbResult<Self> {
        conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout)))
            .and_then(|()| conn.pragma_update(None, "cache_size", config.cache_size))
            .and_then(|()| conn.pragma_update(None, "query_only", true))
            .map_err(|e| DbError::Backend {
                reason: format!("Failed to configure SQLite: {}", e),
            })?;

        debug!(ledger = %name, "ledger handle ready");
        Ok(SqliteLedger {
            conn: Mutex::new(conn),
            name,
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Backend {
            reason: "ledger connection lock poisoned".to_string(),
        })
    }

    /// Run `sql` once per bind set on one prepared statement
    fn run<'p>(
        &self,
        sql: &str,
        param_sets: impl IntoIterator<Item = &'p [Value]>,
    ) -> DbResult<RowSource> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(sql).map_err(classify)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut source = RowSource::empty();
        for params in param_sets {
            let mut rows = stmt.query(params_from_iter(params.iter())).map_err(classify)?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next().map_err(classify)? {
                let mut values = Vec::with_capacity(columns.len());
                for idx in 0..columns.len() {
                    values.push(Value::from(row.get_ref(idx).map_err(classify)?));
                }
                collected.push(Row::new(columns.clone(), values));
            }
            source.extend(RowSource::from_rows(collected));
        }

        Ok(source)
    }
}

impl LedgerDb for SqliteLedger {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<RowSource> {
        self.run(sql, [params])
    }

    fn execute_many(&self, sql: &str, param_sets: &[Vec<Value>]) -> DbResult<RowSource> {
        self.run(sql, param_sets.iter().map(Vec::as_slice))
    }

    fn execute_plain(&self, sql: &str) -> DbResult<RowSource> {
        self.run(sql, [&[][..]])
    }

    fn name(&self) -> &str {
        &self.name
    }
}
