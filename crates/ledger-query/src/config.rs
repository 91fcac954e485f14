//! Ledger connection and retry configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Number of attempts before a statement is declared fatal
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Pause between two attempts of the same statement, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// Bounded retry policy applied to every statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts allowed for one logical operation (at least 1)
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and delay
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Policy without any delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Attempt budget, never below one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay between attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// SQLite ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Path to the ledger database file (":memory:" for in-memory)
    pub path: String,
    /// Timeout for busy connections (ms)
    pub busy_timeout: u32,
    /// Cache size in KB
    pub cache_size: i32,
    /// Statement retry policy
    pub retry: RetryPolicy,
}

impl LedgerConfig {
    /// Configuration for an on-disk ledger
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        LedgerConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Self::default()
        }
    }

    /// Configuration for an in-memory ledger
    pub fn memory() -> Self {
        LedgerConfig {
            path: ":memory:".to_string(),
            busy_timeout: 1000,
            ..Self::default()
        }
    }

    /// Whether this configuration points at an in-memory database
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            path: "ledger.db".to_string(),
            busy_timeout: 5000, // 5 seconds
            cache_size: 10000,  // 10MB
            retry: RetryPolicy::default(),
        }
    }
}
