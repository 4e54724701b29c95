//! Checkout domain module.
//!
//! This crate contains the checkout records (open loans and their history),
//! the OPEN → CLOSED state machine and overdue arithmetic, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod overdue;
pub mod record;
pub mod view;

pub use overdue::Overdue;
pub use record::{
    ActiveCheckout, CheckinRequest, CheckoutRequest, CheckoutState, CheckoutStateError,
    HistoryRecord, ReturnDetails, DEFAULT_CONDITION, DEFAULT_LOAN_DAYS,
};
pub use view::{ActiveCheckoutRow, ActiveCheckoutView, HistoryView, ItemSummary, UserSummary};
