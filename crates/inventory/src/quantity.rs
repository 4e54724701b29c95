use serde::{Deserialize, Serialize};
use thiserror::Error;

use kitroom_core::ValueObject;

/// Direction of a ledger transfer between the available and checked-out pools.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Move units from `available` to `checked_out`.
    Checkout,
    /// Move units from `checked_out` back to `available`.
    Checkin,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Checkout => "checkout",
            TransferDirection::Checkin => "checkin",
        }
    }
}

impl core::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity must be at least 1 (got {0})")]
    NonPositiveAmount(i32),

    #[error("insufficient quantity: requested {requested}, available {available}")]
    Insufficient { requested: i32, available: i32 },

    #[error("cannot check in {requested}: only {checked_out} checked out")]
    OverReturn { requested: i32, checked_out: i32 },

    #[error("inconsistent quantities: total={total}, available={available}, checked_out={checked_out}")]
    Inconsistent {
        total: i32,
        available: i32,
        checked_out: i32,
    },
}

/// Per-item quantity state.
///
/// Invariant: `available + checked_out == total`, all three non-negative.
/// Every constructor checks it and [`Quantities::transfer`] preserves it, so a
/// `Quantities` value is always conserved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuantities")]
pub struct Quantities {
    total: i32,
    available: i32,
    checked_out: i32,
}

impl ValueObject for Quantities {}

#[derive(Deserialize)]
struct RawQuantities {
    total: i32,
    available: i32,
    checked_out: i32,
}

impl TryFrom<RawQuantities> for Quantities {
    type Error = QuantityError;

    fn try_from(raw: RawQuantities) -> Result<Self, Self::Error> {
        Quantities::from_parts(raw.total, raw.available, raw.checked_out)
    }
}

impl Quantities {
    /// Fresh stock: everything available, nothing out.
    pub fn new_stock(total: i32) -> Result<Self, QuantityError> {
        Self::from_parts(total, total, 0)
    }

    /// Rebuild from stored columns, rejecting rows that break conservation.
    pub fn from_parts(total: i32, available: i32, checked_out: i32) -> Result<Self, QuantityError> {
        let conserved = available
            .checked_add(checked_out)
            .is_some_and(|sum| sum == total);
        if total < 0 || available < 0 || checked_out < 0 || !conserved {
            return Err(QuantityError::Inconsistent {
                total,
                available,
                checked_out,
            });
        }
        Ok(Self {
            total,
            available,
            checked_out,
        })
    }

    pub fn total(&self) -> i32 {
        self.total
    }

    pub fn available(&self) -> i32 {
        self.available
    }

    pub fn checked_out(&self) -> i32 {
        self.checked_out
    }

    /// Compute the state after moving `amount` units in `direction`.
    ///
    /// Pure: the caller is responsible for holding the item's row lock while
    /// reading the current state and writing the result back.
    pub fn transfer(self, amount: i32, direction: TransferDirection) -> Result<Self, QuantityError> {
        if amount < 1 {
            return Err(QuantityError::NonPositiveAmount(amount));
        }

        match direction {
            TransferDirection::Checkout => {
                if amount > self.available {
                    return Err(QuantityError::Insufficient {
                        requested: amount,
                        available: self.available,
                    });
                }
                Ok(Self {
                    total: self.total,
                    available: self.available - amount,
                    checked_out: self.checked_out + amount,
                })
            }
            TransferDirection::Checkin => {
                if amount > self.checked_out {
                    return Err(QuantityError::OverReturn {
                        requested: amount,
                        checked_out: self.checked_out,
                    });
                }
                Ok(Self {
                    total: self.total,
                    available: self.available + amount,
                    checked_out: self.checked_out - amount,
                })
            }
        }
    }
}
