//! Read-only query views over the checkout tables.

use std::sync::Arc;

use tracing::instrument;

use kitroom_checkout::{ActiveCheckoutView, HistoryView};
use kitroom_core::{CheckoutId, ItemId};
use kitroom_inventory::UserLookup;

use crate::clock::Clock;
use crate::config::clamp_history_limit;
use crate::error::CheckoutError;
use crate::store::{ActiveFilter, HistoryFilter, Storage};

pub struct CheckoutViews<S: Storage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> CheckoutViews<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Open checkouts, newest first, with overdue fields derived from now.
    #[instrument(skip(self), err)]
    pub async fn list_active(
        &self,
        filter: ActiveFilter,
    ) -> Result<Vec<ActiveCheckoutView>, CheckoutError> {
        let now = self.clock.now();
        let mut views: Vec<_> = self
            .storage
            .list_active(&filter)
            .await?
            .into_iter()
            .map(|row| row.at(now))
            .collect();
        views.sort_by(ActiveCheckoutView::newest_first);
        Ok(views)
    }

    /// Overdue subset: most days overdue first, then newest first.
    #[instrument(skip(self), err)]
    pub async fn list_overdue(&self) -> Result<Vec<ActiveCheckoutView>, CheckoutError> {
        let mut views: Vec<_> = self
            .list_active(ActiveFilter::default())
            .await?
            .into_iter()
            .filter(|v| v.overdue.is_overdue)
            .collect();
        views.sort_by(ActiveCheckoutView::most_overdue_first);
        Ok(views)
    }

    pub async fn get_active(&self, id: CheckoutId) -> Result<ActiveCheckoutView, CheckoutError> {
        let row = self
            .storage
            .get_active(id)
            .await?
            .ok_or(CheckoutError::CheckoutNotFound(id))?;
        Ok(row.at(self.clock.now()))
    }

    /// History of one user (by id or ldap), newest first.
    #[instrument(skip(self), err)]
    pub async fn user_history(
        &self,
        user: UserLookup,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryView>, CheckoutError> {
        let found = self
            .storage
            .find_user(&user)
            .await?
            .ok_or(CheckoutError::UserNotFound(user))?;
        let rows = self
            .storage
            .list_history(&HistoryFilter::User(found.id), clamp_history_limit(limit))
            .await?;
        Ok(rows)
    }

    /// History of one item, newest first.
    #[instrument(skip(self), err)]
    pub async fn item_history(
        &self,
        item_id: ItemId,
        limit: Option<i64>,
    ) -> Result<Vec<HistoryView>, CheckoutError> {
        let rows = self
            .storage
            .list_history(&HistoryFilter::Item(item_id), clamp_history_limit(limit))
            .await?;
        Ok(rows)
    }
}
