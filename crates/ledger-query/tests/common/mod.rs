//! Shared fixtures for ledger integration tests

#![allow(dead_code)]

use ledger_query::{
    DbError, DbResult, LedgerDb, QueryLog, QueryRunner, RetryPolicy, RowSource, SqliteLedger, Value,
};
use rusqlite::{params, Connection};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub const SCHEMA: &str = "
    CREATE TABLE transactions (
        block_height INTEGER,
        timestamp NUMERIC,
        address TEXT,
        recipient TEXT,
        amount NUMERIC,
        signature TEXT,
        public_key TEXT,
        block_hash TEXT,
        fee NUMERIC,
        reward NUMERIC,
        operation TEXT,
        openfield TEXT
    );
";

/// One ledger row, with only the columns the queries look at
#[derive(Debug, Clone)]
pub struct Tx {
    pub height: i64,
    pub timestamp: f64,
    pub from: &'static str,
    pub to: &'static str,
    pub amount: f64,
    pub fee: f64,
    pub reward: f64,
    pub operation: &'static str,
    pub openfield: &'static str,
}

impl Tx {
    pub fn transfer(height: i64, from: &'static str, to: &'static str, amount: f64) -> Self {
        Tx {
            height,
            timestamp: 1_500_000_000.0 + height as f64 * 60.0,
            from,
            to,
            amount,
            fee: 0.0,
            reward: 0.0,
            operation: "",
            openfield: "",
        }
    }

    /// Mining reward row that marks a block
    pub fn coinbase(height: i64, miner: &'static str) -> Self {
        Tx {
            reward: 10.0,
            ..Tx::transfer(height, miner, miner, 0.0)
        }
    }

    pub fn fee(mut self, fee: f64) -> Self {
        self.fee = fee;
        self
    }

    pub fn operation(mut self, operation: &'static str, openfield: &'static str) -> Self {
        self.operation = operation;
        self.openfield = openfield;
        self
    }
}

/// In-memory ledger holding `txs`
pub fn ledger(txs: &[Tx]) -> SqliteLedger {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    for tx in txs {
        conn.execute(
            "INSERT INTO transactions
                (block_height, timestamp, address, recipient, amount, signature, public_key,
                 block_hash, fee, reward, operation, openfield)
             VALUES (?1, ?2, ?3, ?4, ?5, '', '', '', ?6, ?7, ?8, ?9)",
            params![
                tx.height,
                tx.timestamp,
                tx.from,
                tx.to,
                tx.amount,
                tx.fee,
                tx.reward,
                tx.operation,
                tx.openfield
            ],
        )
        .unwrap();
    }
    SqliteLedger::from_connection(conn).unwrap()
}

/// The reference scenario: A receives 50 000 at 100 and sends 5 000 at 150
pub fn reference_ledger() -> SqliteLedger {
    ledger(&[
        Tx::coinbase(100, "miner"),
        Tx::transfer(100, "faucet", "A", 50_000.0),
        Tx::coinbase(150, "miner"),
        Tx::transfer(150, "A", "B", 5_000.0),
    ])
}

/// Handle that fails with `Busy` a fixed number of times before delegating
pub struct FlakyLedger<D> {
    inner: D,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl<D: LedgerDb> FlakyLedger<D> {
    pub fn new(inner: D, failures: u32) -> Self {
        FlakyLedger {
            inner,
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> DbResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(DbError::Busy {
                reason: "database is locked".to_string(),
            });
        }
        Ok(())
    }
}

impl<D: LedgerDb> LedgerDb for FlakyLedger<D> {
    fn execute(&self, sql: &str, params: &[Value]) -> DbResult<RowSource> {
        self.gate()?;
        self.inner.execute(sql, params)
    }

    fn execute_many(&self, sql: &str, param_sets: &[Vec<Value>]) -> DbResult<RowSource> {
        self.gate()?;
        self.inner.execute_many(sql, param_sets)
    }

    fn execute_plain(&self, sql: &str) -> DbResult<RowSource> {
        self.gate()?;
        self.inner.execute_plain(sql)
    }
}

/// Log that keeps every report in memory
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub failures: Mutex<Vec<(String, u32, DbError)>>,
    pub rejections: Mutex<Vec<String>>,
    pub exhausted: Mutex<Vec<(String, u32)>>,
}

impl QueryLog for RecordingLog {
    fn attempt_failed(&self, _ledger: &str, statement: &str, attempt: u32, error: &DbError) {
        self.failures
            .lock()
            .unwrap()
            .push((statement.to_string(), attempt, error.clone()));
    }

    fn rejected(&self, _ledger: &str, statement: &str, _error: &DbError) {
        self.rejections.lock().unwrap().push(statement.to_string());
    }

    fn exhausted(&self, _ledger: &str, statement: &str, attempts: u32, _error: &DbError) {
        self.exhausted
            .lock()
            .unwrap()
            .push((statement.to_string(), attempts));
    }
}

/// Runner with the production attempt budget and no delay
pub fn recording_runner() -> QueryRunner<RecordingLog> {
    QueryRunner::with_log(RetryPolicy::immediate(10), RecordingLog::default())
}
