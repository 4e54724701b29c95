//! Error types for the storage boundary and the checkout workflow.

use thiserror::Error;

use kitroom_core::{CheckoutId, CorrelationId, DomainError, ItemId};
use kitroom_inventory::{QuantityError, UserLookup};

/// Storage operation error.
///
/// These are **infrastructure errors** (connectivity, constraint violations)
/// as opposed to domain rejections. Any of them forces the surrounding
/// transaction to roll back.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key already exists (e.g. duplicate ldap identifier).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A check constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Anything else: network, pool, decoding, poisoned locks.
    #[error("database error: {0}")]
    Database(String),
}

/// Failure taxonomy of the checkout service.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    #[error("user with {0} not found")]
    UserNotFound(UserLookup),

    #[error("checkout {0} not found")]
    CheckoutNotFound(CheckoutId),

    #[error("insufficient quantity for item {item_id}: requested {requested}, available {available}")]
    InsufficientQuantity {
        item_id: ItemId,
        requested: i32,
        available: i32,
    },

    #[error("cannot check in {requested} of item {item_id}: only {checked_out} checked out")]
    OverReturn {
        item_id: ItemId,
        requested: i32,
        checked_out: i32,
    },

    #[error("no open history record for correlation {0}")]
    HistoryRecordMismatch(CorrelationId),

    #[error("quantity must be at least 1 (got {0})")]
    InvalidQuantity(i32),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Lift a ledger arithmetic failure for `item_id` into the service
    /// taxonomy.
    pub fn from_quantity(item_id: ItemId, err: QuantityError) -> Self {
        match err {
            QuantityError::NonPositiveAmount(amount) => CheckoutError::InvalidQuantity(amount),
            QuantityError::Insufficient {
                requested,
                available,
            } => CheckoutError::InsufficientQuantity {
                item_id,
                requested,
                available,
            },
            QuantityError::OverReturn {
                requested,
                checked_out,
            } => CheckoutError::OverReturn {
                item_id,
                requested,
                checked_out,
            },
            QuantityError::Inconsistent { .. } => {
                CheckoutError::Store(StoreError::Constraint(err.to_string()))
            }
        }
    }

    /// Short machine-readable code, used by adapters and logs.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::ItemNotFound(_) => "item_not_found",
            CheckoutError::UserNotFound(_) => "user_not_found",
            CheckoutError::CheckoutNotFound(_) => "checkout_not_found",
            CheckoutError::InsufficientQuantity { .. } => "insufficient_quantity",
            CheckoutError::OverReturn { .. } => "over_return",
            CheckoutError::HistoryRecordMismatch(_) => "history_record_mismatch",
            CheckoutError::InvalidQuantity(_) => "invalid_quantity",
            CheckoutError::Validation(_) => "validation_error",
            CheckoutError::Store(_) => "store_error",
        }
    }
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CheckoutError::Validation(msg)
            }
            DomainError::Conflict(msg) => CheckoutError::Validation(msg),
        }
    }
}

/// Map SQLx errors onto [`StoreError`] by Postgres error code.
///
/// | Postgres code | StoreError |
/// |---|---|
/// | `23505` unique violation | `Conflict` |
/// | `23514` check violation | `Constraint` |
/// | anything else | `Database` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
