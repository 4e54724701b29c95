use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kitroom_checkout::{ActiveCheckout, ActiveCheckoutRow, HistoryRecord, HistoryView};
use kitroom_core::{CheckoutId, CorrelationId, ItemId, UserId};
use kitroom_inventory::{Item, User, UserLookup};

use crate::error::StoreError;

/// Item listing filter. All set conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub location: Option<String>,
    /// Case-insensitive substring matched against name or category.
    pub text: Option<String>,
    /// Only items with `available > 0` and status `available`.
    pub checkout_ready: bool,
}

impl ItemFilter {
    pub fn at_location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(location) = &self.location {
            if item.location != *location {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            if !item.name.to_lowercase().contains(&needle)
                && !item.category.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        !self.checkout_ready || item.is_checkout_ready()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilter {
    pub user_id: Option<UserId>,
    pub item_id: Option<ItemId>,
}

impl ActiveFilter {
    pub fn matches(&self, checkout: &ActiveCheckout) -> bool {
        self.user_id.is_none_or(|id| checkout.user_id == id)
            && self.item_id.is_none_or(|id| checkout.item_id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    User(UserId),
    Item(ItemId),
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        match self {
            HistoryFilter::User(id) => record.user_id == *id,
            HistoryFilter::Item(id) => record.item_id == *id,
        }
    }
}

/// A unit of work over the checkout tables.
///
/// `lock_*` calls take an exclusive row lock held until `commit` or
/// `rollback`; a second transaction asking for the same row waits. Dropping a
/// transaction without committing rolls it back.
#[async_trait]
pub trait StorageTx: Send {
    /// Lock the item row and return its current state.
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Write every mutable column of an item previously locked by this
    /// transaction.
    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError>;

    /// Lock the active checkout row and return it.
    async fn lock_active_checkout(
        &mut self,
        id: CheckoutId,
    ) -> Result<Option<ActiveCheckout>, StoreError>;

    async fn insert_active_checkout(&mut self, checkout: &ActiveCheckout) -> Result<(), StoreError>;

    async fn delete_active_checkout(&mut self, id: CheckoutId) -> Result<(), StoreError>;

    async fn insert_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError>;

    /// Lock the unreturned history row carrying `correlation_id`, if any.
    async fn lock_open_history(
        &mut self,
        correlation_id: CorrelationId,
    ) -> Result<Option<HistoryRecord>, StoreError>;

    async fn update_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Storage boundary of the service.
///
/// Two engines implement it: Postgres for deployments and an in-memory engine
/// with the same locking and atomicity semantics for tests and local runs.
/// Non-transactional reads observe the latest committed state.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    type Tx: StorageTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Cheap connectivity probe used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the ldap identifier is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Users ordered by full name.
    async fn list_users(&self, active_only: bool) -> Result<Vec<User>, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Items matching `filter`, ordered by name.
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    /// Open checkouts joined with item and user, newest first.
    async fn list_active(&self, filter: &ActiveFilter) -> Result<Vec<ActiveCheckoutRow>, StoreError>;

    async fn get_active(&self, id: CheckoutId) -> Result<Option<ActiveCheckoutRow>, StoreError>;

    /// History joined with item and user, newest first, at most `limit` rows.
    async fn list_history(
        &self,
        filter: &HistoryFilter,
        limit: i64,
    ) -> Result<Vec<HistoryView>, StoreError>;
}
