//! Command implementations

pub mod query;
pub mod version;

use ledger_query::{LedgerError, QueryError, WeightError};

/// Whether `err` means the ledger can no longer be trusted
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<WeightError>() {
            e.is_fatal()
        } else if let Some(e) = cause.downcast_ref::<LedgerError>() {
            e.is_fatal()
        } else if let Some(e) = cause.downcast_ref::<QueryError>() {
            e.is_fatal()
        } else {
            false
        }
    })
}
