//! Transactional storage boundary.
//!
//! The traits here are the only way the ledger, workflow, views and catalog
//! touch persisted state. Engines live in the submodules.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryStorage, InMemoryTx};
pub use postgres::{PgStorage, PgTx};
pub use r#trait::{ActiveFilter, HistoryFilter, ItemFilter, Storage, StorageTx};

use tracing::warn;

use crate::error::CheckoutError;

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged and otherwise ignored: the original error is
/// what the caller needs, and the engine discards the work either way.
pub async fn settle<T, R>(tx: T, result: Result<R, CheckoutError>) -> Result<R, CheckoutError>
where
    T: StorageTx,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
