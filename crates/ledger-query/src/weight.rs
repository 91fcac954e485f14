//! Balance-based registration weight
//!
//! A node's weight is a coarse tier derived from the net balance of its
//! address at a past block height: one tier per 10 000 units, capped at
//! [`MAX_WEIGHT`]. The balance comes from a single aggregate query and is a
//! rough estimate, not an exact figure down to the smallest unit.

use crate::queries::{scalar_f64, LedgerError, QueryDef, QUICK_BALANCE_ALL};
use crate::runner::{QueryError, QueryLog, QueryRunner, TracingLog};
use crate::traits::LedgerDb;
use crate::types::Value;
use thiserror::Error;
use tracing::debug;

/// Balance units per weight tier
pub const WEIGHT_UNIT: f64 = 10_000.0;

/// Highest weight ever returned
pub const MAX_WEIGHT: i64 = 3;

/// Errors from balance and weight estimation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeightError {
    /// Address was empty
    #[error("Address must not be empty")]
    EmptyAddress,

    /// Height was negative
    #[error("Block height must not be negative, got {0}")]
    NegativeHeight(i64),

    /// The address has no credit and no debit up to the height
    #[error("No ledger activity for {address} up to block {height}")]
    UnknownAccount { address: String, height: i64 },

    /// Ledger query failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<QueryError> for WeightError {
    fn from(err: QueryError) -> Self {
        WeightError::Ledger(LedgerError::Query(err))
    }
}

impl WeightError {
    /// Whether the caller must stop using the ledger handle
    pub fn is_fatal(&self) -> bool {
        matches!(self, WeightError::Ledger(e) if e.is_fatal())
    }
}

/// Map a balance onto its weight tier
///
/// `floor(balance / 10000)`, rounding toward negative infinity, capped at
/// [`MAX_WEIGHT`]. Zero and negative weights are returned unchanged.
#[allow(clippy::cast_possible_truncation)]
pub fn weight_for_balance(balance: f64) -> i64 {
    let tiers = (balance / WEIGHT_UNIT).floor();
    if tiers.is_nan() {
        return 0;
    }
    // `as` saturates, so huge balances still land on the cap
    (tiers as i64).min(MAX_WEIGHT)
}

/// Estimates registration weight from historical balances
#[derive(Debug, Clone, Copy)]
pub struct BalanceWeightEstimator<'r, L = TracingLog> {
    runner: &'r QueryRunner<L>,
}

impl<'r, L: QueryLog> BalanceWeightEstimator<'r, L> {
    /// Create an estimator running its query through `runner`
    pub fn new(runner: &'r QueryRunner<L>) -> Self {
        BalanceWeightEstimator { runner }
    }

    /// Net balance of `address` at `height`; `None` when the address has no activity
    pub fn net_balance<D>(&self, db: &D, address: &str, height: i64) -> Result<Option<f64>, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        self.net_balance_with(db, &QUICK_BALANCE_ALL, address, height)
    }

    /// Net balance using an alternate aggregate such as the mirror view
    pub fn net_balance_with<D>(
        &self,
        db: &D,
        query: &QueryDef,
        address: &str,
        height: i64,
    ) -> Result<Option<f64>, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        if address.is_empty() {
            return Err(WeightError::EmptyAddress);
        }
        if height < 0 {
            return Err(WeightError::NegativeHeight(height));
        }

        let params = query.bind([Value::from(address), Value::from(height)]);
        let row = self.runner.fetch_one(db, query.sql, &params)?;
        Ok(scalar_f64(query, row)?)
    }

    /// Registration weight of `address` at `height`
    ///
    /// Fails with [`WeightError::UnknownAccount`] when the address never
    /// appears in the ledger up to `height`.
    pub fn estimate_weight<D>(&self, db: &D, address: &str, height: i64) -> Result<i64, WeightError>
    where
        D: LedgerDb + ?Sized,
    {
        let balance = self
            .net_balance(db, address, height)?
            .ok_or_else(|| WeightError::UnknownAccount {
                address: address.to_string(),
                height,
            })?;

        let weight = weight_for_balance(balance);
        debug!(address, height, balance, weight, "estimated registration weight");
        Ok(weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_weight_tiers() {
        assert_eq!(weight_for_balance(0.0), 0);
        assert_eq!(weight_for_balance(9_999.0), 0);
        assert_eq!(weight_for_balance(10_000.0), 1);
        assert_eq!(weight_for_balance(25_000.5), 2);
        assert_eq!(weight_for_balance(39_999.99), 3);
    }

    #[test]
    fn test_weight_is_capped() {
        assert_eq!(weight_for_balance(45_000.0), 3);
        assert_eq!(weight_for_balance(50_000.0), 3);
        assert_eq!(weight_for_balance(f64::INFINITY), 3);
    }

    #[test]
    fn test_negative_balance_floors_toward_negative_infinity() {
        assert_eq!(weight_for_balance(-0.5), -1);
        assert_eq!(weight_for_balance(-10_000.0), -1);
        assert_eq!(weight_for_balance(-10_000.5), -2);
    }

    #[test]
    fn test_nan_balance_has_no_weight() {
        assert_eq!(weight_for_balance(f64::NAN), 0);
    }

    proptest! {
        /// The weight never exceeds the cap
        #[test]
        fn prop_weight_capped(balance in -1.0e12f64..1.0e12) {
            prop_assert!(weight_for_balance(balance) <= MAX_WEIGHT);
        }

        /// Below the cap the weight is exactly the floored tier count
        #[test]
        fn prop_weight_matches_floor(balance in -1.0e9f64..40_000.0) {
            let expected = (balance / WEIGHT_UNIT).floor();
            #[allow(clippy::cast_precision_loss)]
            let actual = weight_for_balance(balance) as f64;
            prop_assert_eq!(actual, expected);
        }

        /// More balance never means less weight
        #[test]
        fn prop_weight_monotonic(a in -1.0e9f64..1.0e9, b in -1.0e9f64..1.0e9) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(weight_for_balance(lo) <= weight_for_balance(hi));
        }
    }
}
