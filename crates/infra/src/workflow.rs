//! Checkout workflow: checkout and check-in as single transactions spanning
//! the item ledger and both checkout tables.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use kitroom_checkout::{
    ActiveCheckout, CheckinRequest, CheckoutRequest, DEFAULT_LOAN_DAYS, HistoryRecord,
    ReturnDetails,
};
use kitroom_core::CorrelationId;
use kitroom_inventory::{TransferDirection, UserLookup};

use crate::clock::Clock;
use crate::error::CheckoutError;
use crate::ledger::ItemLedger;
use crate::store::{Storage, StorageTx, settle};

pub struct CheckoutWorkflow<S: Storage> {
    storage: Arc<S>,
    ledger: ItemLedger<S>,
    clock: Arc<dyn Clock>,
    loan_days: i64,
}

impl<S: Storage> CheckoutWorkflow<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: ItemLedger::new(storage.clone(), clock.clone()),
            storage,
            clock,
            loan_days: DEFAULT_LOAN_DAYS,
        }
    }

    /// Loan period used when a checkout names no expected return time.
    pub fn with_loan_days(mut self, loan_days: i64) -> Self {
        self.loan_days = loan_days;
        self
    }

    pub fn ledger(&self) -> &ItemLedger<S> {
        &self.ledger
    }

    /// Check `quantity` units of an item out to a user.
    ///
    /// The ledger transfer, the active row and the open history row commit
    /// together or not at all. Both rows carry the same fresh correlation id.
    #[instrument(
        skip_all,
        fields(item_id = %request.item_id, user_id = %request.user_id, quantity = request.quantity),
        err
    )]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<ActiveCheckout, CheckoutError> {
        let user_id = request.user_id;
        if self
            .storage
            .find_user(&UserLookup::Id(user_id))
            .await?
            .is_none()
        {
            return Err(rejected(CheckoutError::UserNotFound(UserLookup::Id(user_id))));
        }

        let checkout = ActiveCheckout::open(request, self.clock.now(), self.loan_days)
            .map_err(|e| rejected(e.into()))?;
        let history = HistoryRecord::opened_for(&checkout);

        let mut tx = self.storage.begin().await?;
        let result = self.record_checkout(&mut tx, &checkout, &history).await;
        settle(tx, result).await.map_err(rejected)?;

        info!(
            checkout_id = %checkout.id,
            correlation_id = %checkout.correlation_id,
            expected_return_time = %checkout.expected_return_time,
            "checkout committed"
        );
        Ok(checkout)
    }

    async fn record_checkout(
        &self,
        tx: &mut S::Tx,
        checkout: &ActiveCheckout,
        history: &HistoryRecord,
    ) -> Result<(), CheckoutError> {
        self.ledger
            .transfer_within(tx, checkout.item_id, checkout.quantity, TransferDirection::Checkout)
            .await?;
        tx.insert_active_checkout(checkout).await?;
        tx.insert_history(history).await?;
        Ok(())
    }

    /// Return an open checkout, closing its history row.
    ///
    /// Concurrent check-ins of one checkout serialize on the active row lock;
    /// the loser finds the row gone and gets `CheckoutNotFound`.
    #[instrument(skip_all, fields(checkout_id = %request.checkout_id), err)]
    pub async fn checkin(&self, request: CheckinRequest) -> Result<HistoryRecord, CheckoutError> {
        let now = self.clock.now();
        let mut tx = self.storage.begin().await?;
        let result = self.record_checkin(&mut tx, &request, now).await;
        let history = settle(tx, result).await.map_err(rejected)?;

        info!(
            checkout_id = %request.checkout_id,
            correlation_id = %history.correlation_id,
            item_id = %history.item_id,
            quantity = history.quantity,
            late_return = history.late_return,
            "check-in committed"
        );
        Ok(history)
    }

    async fn record_checkin(
        &self,
        tx: &mut S::Tx,
        request: &CheckinRequest,
        now: DateTime<Utc>,
    ) -> Result<HistoryRecord, CheckoutError> {
        let active = tx
            .lock_active_checkout(request.checkout_id)
            .await?
            .ok_or(CheckoutError::CheckoutNotFound(request.checkout_id))?;

        self.ledger
            .transfer_within(tx, active.item_id, active.quantity, TransferDirection::Checkin)
            .await?;
        tx.delete_active_checkout(active.id).await?;

        let mut history = tx
            .lock_open_history(active.correlation_id)
            .await?
            .ok_or(CheckoutError::HistoryRecordMismatch(active.correlation_id))?;
        close_history(&mut history, ReturnDetails::from_request(request, now), active.correlation_id)?;
        tx.update_history(&history).await?;
        Ok(history)
    }
}

fn close_history(
    history: &mut HistoryRecord,
    details: ReturnDetails,
    correlation_id: CorrelationId,
) -> Result<(), CheckoutError> {
    history
        .close(details)
        .map_err(|_| CheckoutError::HistoryRecordMismatch(correlation_id))
}

/// Log a rejected operation. Storage failures are logged by the span.
fn rejected(err: CheckoutError) -> CheckoutError {
    if !matches!(err, CheckoutError::Store(_)) {
        warn!(code = err.code(), error = %err, "operation rejected");
    }
    err
}
