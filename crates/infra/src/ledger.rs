//! Item ledger: the single writer of item quantities.

use std::sync::Arc;

use tracing::{debug, instrument};

use kitroom_core::ItemId;
use kitroom_inventory::{Item, TransferDirection};

use crate::clock::Clock;
use crate::error::CheckoutError;
use crate::store::{Storage, StorageTx, settle};

/// Performs locked, atomic transfers between an item's `available` and
/// `checked_out` pools.
///
/// The item row lock is taken immediately before the quantity read and held
/// until the surrounding transaction ends, so concurrent transfers on one item
/// serialize while different items proceed independently.
pub struct ItemLedger<S: Storage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> Clone for ItemLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: Storage> ItemLedger<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Transfer in a transaction of its own, committed before returning.
    #[instrument(skip_all, fields(item_id = %item_id, amount = amount, direction = %direction), err)]
    pub async fn transfer_quantity(
        &self,
        item_id: ItemId,
        amount: i32,
        direction: TransferDirection,
    ) -> Result<Item, CheckoutError> {
        let mut tx = self.storage.begin().await?;
        let result = self.transfer_within(&mut tx, item_id, amount, direction).await;
        settle(tx, result).await
    }

    /// Transfer as one step of a caller-owned transaction.
    ///
    /// On error nothing has been written for this item; the caller is still
    /// expected to roll back.
    pub async fn transfer_within(
        &self,
        tx: &mut S::Tx,
        item_id: ItemId,
        amount: i32,
        direction: TransferDirection,
    ) -> Result<Item, CheckoutError> {
        if amount < 1 {
            return Err(CheckoutError::InvalidQuantity(amount));
        }

        let mut item = tx
            .lock_item(item_id)
            .await?
            .ok_or(CheckoutError::ItemNotFound(item_id))?;

        item.quantities = item
            .quantities
            .transfer(amount, direction)
            .map_err(|e| CheckoutError::from_quantity(item_id, e))?;
        item.updated_at = self.clock.now();
        tx.save_item(&item).await?;

        debug!(
            %item_id,
            amount,
            %direction,
            available = item.quantities.available(),
            checked_out = item.quantities.checked_out(),
            "quantity transferred"
        );
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kitroom_inventory::NewItem;

    use super::*;
    use crate::clock::SystemClock;
    use crate::store::InMemoryStorage;

    async fn ledger_with_item(total: i32) -> (ItemLedger<InMemoryStorage>, Arc<InMemoryStorage>, ItemId) {
        let storage = Arc::new(InMemoryStorage::new());
        let item = NewItem::new("Oscilloscope", "Test Equipment", "2u", total)
            .into_item(ItemId::new(), Utc::now())
            .unwrap();
        storage.insert_item(&item).await.unwrap();
        (ItemLedger::new(storage.clone(), Arc::new(SystemClock)), storage, item.id)
    }

    #[tokio::test]
    async fn checkout_and_checkin_move_units() {
        let (ledger, _, item_id) = ledger_with_item(10).await;

        let item = ledger
            .transfer_quantity(item_id, 2, TransferDirection::Checkout)
            .await
            .unwrap();
        assert_eq!((item.quantities.available(), item.quantities.checked_out()), (8, 2));

        let item = ledger
            .transfer_quantity(item_id, 2, TransferDirection::Checkin)
            .await
            .unwrap();
        assert_eq!((item.quantities.available(), item.quantities.checked_out()), (10, 0));
    }

    #[tokio::test]
    async fn rejected_transfer_leaves_item_unchanged() {
        let (ledger, storage, item_id) = ledger_with_item(8).await;
        let before = storage.get_item(item_id).await.unwrap().unwrap();

        let err = ledger
            .transfer_quantity(item_id, 100, TransferDirection::Checkout)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientQuantity { requested: 100, available: 8, .. }
        ));

        let err = ledger
            .transfer_quantity(item_id, 1, TransferDirection::Checkin)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OverReturn { checked_out: 0, .. }));

        assert_eq!(storage.get_item(item_id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn unknown_item_and_bad_amount_are_rejected() {
        let (ledger, _, item_id) = ledger_with_item(3).await;

        let missing = ItemId::new();
        assert!(matches!(
            ledger
                .transfer_quantity(missing, 1, TransferDirection::Checkout)
                .await,
            Err(CheckoutError::ItemNotFound(id)) if id == missing
        ));
        assert!(matches!(
            ledger
                .transfer_quantity(item_id, 0, TransferDirection::Checkout)
                .await,
            Err(CheckoutError::InvalidQuantity(0))
        ));
    }
}
