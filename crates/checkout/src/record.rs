use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kitroom_core::{
    CheckoutId, CorrelationId, DomainError, DomainResult, Entity, HistoryId, ItemId, UserId,
};

/// Condition recorded when a caller does not supply one.
pub const DEFAULT_CONDITION: &str = "good";

/// Loan period applied when no expected return time is given.
pub const DEFAULT_LOAN_DAYS: i64 = 7;

/// Lifecycle of a single checkout. `Open` → `Closed`, no other transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutState {
    Open,
    Closed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutStateError {
    #[error("checkout {0} is already closed")]
    AlreadyClosed(CorrelationId),
}

/// Checkout request as it reaches the workflow (user already resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub item_id: ItemId,
    pub user_id: UserId,
    pub quantity: i32,
    #[serde(default)]
    pub expected_return_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new(item_id: ItemId, user_id: UserId, quantity: i32) -> Self {
        Self {
            item_id,
            user_id,
            quantity,
            expected_return_time: None,
            condition: None,
            notes: None,
        }
    }

    pub fn due_at(mut self, expected_return_time: DateTime<Utc>) -> Self {
        self.expected_return_time = Some(expected_return_time);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub checkout_id: CheckoutId,
    #[serde(default)]
    pub return_condition: Option<String>,
    #[serde(default)]
    pub return_notes: Option<String>,
}

impl CheckinRequest {
    pub fn new(checkout_id: CheckoutId) -> Self {
        Self {
            checkout_id,
            return_condition: None,
            return_notes: None,
        }
    }
}

/// An outstanding loan. The row exists exactly while the checkout is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCheckout {
    pub id: CheckoutId,
    pub correlation_id: CorrelationId,
    pub item_id: ItemId,
    pub user_id: UserId,
    pub quantity: i32,
    pub checkout_time: DateTime<Utc>,
    pub expected_return_time: DateTime<Utc>,
    pub condition_at_checkout: String,
    pub notes: Option<String>,
}

impl Entity for ActiveCheckout {
    type Id = CheckoutId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl ActiveCheckout {
    /// Build the row for a checkout happening at `now`, filling in the
    /// default due date and condition. A fresh correlation id is minted here.
    ///
    /// Fails when `now + loan_days` falls outside the representable range.
    pub fn open(request: CheckoutRequest, now: DateTime<Utc>, loan_days: i64) -> DomainResult<Self> {
        let expected_return_time = match request.expected_return_time {
            Some(due) => due,
            None => TimeDelta::try_days(loan_days)
                .and_then(|loan| now.checked_add_signed(loan))
                .ok_or_else(|| {
                    DomainError::validation(format!("loan period of {loan_days} days is out of range"))
                })?,
        };

        Ok(Self {
            id: CheckoutId::new(),
            correlation_id: CorrelationId::new(),
            item_id: request.item_id,
            user_id: request.user_id,
            quantity: request.quantity,
            checkout_time: now,
            expected_return_time,
            condition_at_checkout: request
                .condition
                .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            notes: request.notes,
        })
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expected_return_time
    }
}

/// What the borrower reported when bringing the item back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDetails {
    pub return_time: DateTime<Utc>,
    pub return_condition: String,
    pub return_notes: Option<String>,
}

impl ReturnDetails {
    pub fn from_request(request: &CheckinRequest, now: DateTime<Utc>) -> Self {
        Self {
            return_time: now,
            return_condition: request
                .return_condition
                .clone()
                .unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            return_notes: request.return_notes.clone(),
        }
    }
}

/// Append-only audit row. Written once at checkout and closed once at
/// check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub correlation_id: CorrelationId,
    pub item_id: ItemId,
    pub user_id: UserId,
    pub quantity: i32,
    pub checkout_time: DateTime<Utc>,
    pub expected_return_time: DateTime<Utc>,
    pub return_time: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub late_return: bool,
    pub condition_at_checkout: String,
    pub return_condition: Option<String>,
    pub checkout_notes: Option<String>,
    pub return_notes: Option<String>,
}

impl Entity for HistoryRecord {
    type Id = HistoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl HistoryRecord {
    /// The unreturned history row paired with `checkout`.
    pub fn opened_for(checkout: &ActiveCheckout) -> Self {
        Self {
            id: HistoryId::new(),
            correlation_id: checkout.correlation_id,
            item_id: checkout.item_id,
            user_id: checkout.user_id,
            quantity: checkout.quantity,
            checkout_time: checkout.checkout_time,
            expected_return_time: checkout.expected_return_time,
            return_time: None,
            is_returned: false,
            late_return: false,
            condition_at_checkout: checkout.condition_at_checkout.clone(),
            return_condition: None,
            checkout_notes: checkout.notes.clone(),
            return_notes: None,
        }
    }

    pub fn state(&self) -> CheckoutState {
        if self.is_returned {
            CheckoutState::Closed
        } else {
            CheckoutState::Open
        }
    }

    /// Transition OPEN → CLOSED. A return strictly after the expected time is
    /// late.
    pub fn close(&mut self, details: ReturnDetails) -> Result<(), CheckoutStateError> {
        if self.state() == CheckoutState::Closed {
            return Err(CheckoutStateError::AlreadyClosed(self.correlation_id));
        }

        self.late_return = details.return_time > self.expected_return_time;
        self.return_time = Some(details.return_time);
        self.return_condition = Some(details.return_condition);
        self.return_notes = details.return_notes;
        self.is_returned = true;
        Ok(())
    }
}
