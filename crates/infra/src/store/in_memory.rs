use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

use kitroom_checkout::{ActiveCheckout, ActiveCheckoutRow, HistoryRecord, HistoryView};
use kitroom_core::{CheckoutId, CorrelationId, ItemId, UserId};
use kitroom_inventory::{Item, User, UserLookup};

use super::r#trait::{ActiveFilter, HistoryFilter, ItemFilter, Storage, StorageTx};
use crate::error::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Item(ItemId),
    Checkout(CheckoutId),
    History(CorrelationId),
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    items: HashMap<ItemId, Item>,
    active: HashMap<CheckoutId, ActiveCheckout>,
    history: HashMap<CorrelationId, HistoryRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: RwLock<Tables>,
    locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
}

fn poisoned() -> StoreError {
    StoreError::Database("lock poisoned".to_string())
}

/// In-memory storage engine.
///
/// Intended for tests/dev. Row locks are per-row async mutexes owned by the
/// transaction, so a waiter is parked until the holder commits or rolls back.
/// Writes are staged in the transaction and applied in one step at commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StoreError> {
        let tables = self.inner.tables.read().map_err(|_| poisoned())?;
        Ok(f(&tables))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R, StoreError> {
        let mut tables = self.inner.tables.write().map_err(|_| poisoned())?;
        Ok(f(&mut tables))
    }
}

fn active_row(tables: &Tables, checkout: &ActiveCheckout) -> Option<ActiveCheckoutRow> {
    let item = tables.items.get(&checkout.item_id)?;
    let user = tables.users.get(&checkout.user_id)?;
    Some(ActiveCheckoutRow {
        checkout: checkout.clone(),
        item: item.into(),
        user: user.into(),
    })
}

fn history_view(tables: &Tables, record: &HistoryRecord) -> Option<HistoryView> {
    let item = tables.items.get(&record.item_id)?;
    let user = tables.users.get(&record.user_id)?;
    Some(HistoryView {
        record: record.clone(),
        item: item.into(),
        user: user.into(),
    })
}

#[async_trait]
impl Storage for InMemoryStorage {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(InMemoryTx {
            inner: self.inner.clone(),
            guards: HashMap::new(),
            writes: WriteSet::default(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.read(|_| ())
    }

    async fn find_user(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError> {
        self.read(|t| match lookup {
            UserLookup::Id(id) => t.users.get(id).cloned(),
            UserLookup::Ldap(_) => t.users.values().find(|u| lookup.matches(u)).cloned(),
        })
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.write(|t| {
            if t.users.values().any(|u| u.ldap == user.ldap) {
                return Err(StoreError::Conflict(format!(
                    "user with ldap '{}' already exists",
                    user.ldap
                )));
            }
            if t.users.contains_key(&user.id) {
                return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
            }
            t.users.insert(user.id, user.clone());
            Ok(())
        })?
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.write(|t| {
            if let Some(existing) = t.users.get_mut(&user.id) {
                *existing = user.clone();
            }
        })
    }

    async fn list_users(&self, active_only: bool) -> Result<Vec<User>, StoreError> {
        let mut users = self.read(|t| {
            t.users
                .values()
                .filter(|u| !active_only || u.active)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.read(|t| t.items.get(&id).cloned())
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.write(|t| {
            if t.items.contains_key(&item.id) {
                return Err(StoreError::Conflict(format!("item {} already exists", item.id)));
            }
            t.items.insert(item.id, item.clone());
            Ok(())
        })?
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let mut items = self.read(|t| {
            t.items
                .values()
                .filter(|i| filter.matches(i))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn list_active(&self, filter: &ActiveFilter) -> Result<Vec<ActiveCheckoutRow>, StoreError> {
        let mut rows = self.read(|t| {
            t.active
                .values()
                .filter(|c| filter.matches(c))
                .filter_map(|c| active_row(t, c))
                .collect::<Vec<_>>()
        })?;
        rows.sort_by(|a, b| {
            b.checkout
                .checkout_time
                .cmp(&a.checkout.checkout_time)
                .then_with(|| b.checkout.id.cmp(&a.checkout.id))
        });
        Ok(rows)
    }

    async fn get_active(&self, id: CheckoutId) -> Result<Option<ActiveCheckoutRow>, StoreError> {
        self.read(|t| t.active.get(&id).and_then(|c| active_row(t, c)))
    }

    async fn list_history(
        &self,
        filter: &HistoryFilter,
        limit: i64,
    ) -> Result<Vec<HistoryView>, StoreError> {
        let mut records = self.read(|t| {
            t.history
                .values()
                .filter(|r| filter.matches(r))
                .filter_map(|r| history_view(t, r))
                .collect::<Vec<_>>()
        })?;
        records.sort_by(|a, b| {
            b.record
                .checkout_time
                .cmp(&a.record.checkout_time)
                .then_with(|| b.record.id.cmp(&a.record.id))
        });
        records.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(records)
    }
}

/// Writes staged by a transaction, invisible to others until commit.
#[derive(Debug, Default)]
struct WriteSet {
    items: HashMap<ItemId, Item>,
    /// `None` marks a deletion.
    active: HashMap<CheckoutId, Option<ActiveCheckout>>,
    new_history: HashMap<CorrelationId, HistoryRecord>,
    updated_history: HashMap<CorrelationId, HistoryRecord>,
}

pub struct InMemoryTx {
    inner: Arc<Inner>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    writes: WriteSet,
}

impl InMemoryTx {
    /// Take the row lock for `key`, waiting for the current holder if needed.
    /// Re-locking a row this transaction already holds is a no-op.
    async fn acquire(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }
        let row = {
            let mut locks = self.inner.locks.lock().map_err(|_| poisoned())?;
            locks.entry(key).or_default().clone()
        };
        let guard = row.lock_owned().await;
        self.guards.insert(key, guard);
        Ok(())
    }

    fn committed<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StoreError> {
        let tables = self.inner.tables.read().map_err(|_| poisoned())?;
        Ok(f(&tables))
    }

    fn apply(&mut self) -> Result<(), StoreError> {
        let writes = std::mem::take(&mut self.writes);
        let mut tables = self.inner.tables.write().map_err(|_| poisoned())?;

        if let Some(id) = writes
            .new_history
            .keys()
            .find(|id| tables.history.contains_key(id))
        {
            return Err(StoreError::Conflict(format!(
                "history record for correlation {id} already exists"
            )));
        }

        for (id, item) in writes.items {
            tables.items.insert(id, item);
        }
        for (id, change) in writes.active {
            match change {
                Some(checkout) => {
                    tables.active.insert(id, checkout);
                }
                None => {
                    tables.active.remove(&id);
                }
            }
        }
        for (id, record) in writes.new_history.into_iter().chain(writes.updated_history) {
            tables.history.insert(id, record);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.guards.clear();
        if let Ok(mut locks) = self.inner.locks.lock() {
            locks.retain(|_, row| Arc::strong_count(row) > 1);
        }
    }
}

impl Drop for InMemoryTx {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl StorageTx for InMemoryTx {
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.acquire(RowKey::Item(id)).await?;
        if let Some(item) = self.writes.items.get(&id) {
            return Ok(Some(item.clone()));
        }
        self.committed(|t| t.items.get(&id).cloned())
    }

    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError> {
        if !self.guards.contains_key(&RowKey::Item(item.id)) {
            return Err(StoreError::Database(format!(
                "item {} written without holding its row lock",
                item.id
            )));
        }
        self.writes.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn lock_active_checkout(
        &mut self,
        id: CheckoutId,
    ) -> Result<Option<ActiveCheckout>, StoreError> {
        self.acquire(RowKey::Checkout(id)).await?;
        if let Some(staged) = self.writes.active.get(&id) {
            return Ok(staged.clone());
        }
        self.committed(|t| t.active.get(&id).cloned())
    }

    async fn insert_active_checkout(&mut self, checkout: &ActiveCheckout) -> Result<(), StoreError> {
        let taken = self.committed(|t| {
            t.active.contains_key(&checkout.id)
                || t
                    .active
                    .values()
                    .any(|c| c.correlation_id == checkout.correlation_id)
        })?;
        if taken || matches!(self.writes.active.get(&checkout.id), Some(Some(_))) {
            return Err(StoreError::Conflict(format!(
                "active checkout {} already exists",
                checkout.id
            )));
        }
        self.writes.active.insert(checkout.id, Some(checkout.clone()));
        Ok(())
    }

    async fn delete_active_checkout(&mut self, id: CheckoutId) -> Result<(), StoreError> {
        self.writes.active.insert(id, None);
        Ok(())
    }

    async fn insert_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError> {
        let taken = self.committed(|t| t.history.contains_key(&record.correlation_id))?;
        if taken || self.writes.new_history.contains_key(&record.correlation_id) {
            return Err(StoreError::Conflict(format!(
                "history record for correlation {} already exists",
                record.correlation_id
            )));
        }
        self.writes
            .new_history
            .insert(record.correlation_id, record.clone());
        Ok(())
    }

    async fn lock_open_history(
        &mut self,
        correlation_id: CorrelationId,
    ) -> Result<Option<HistoryRecord>, StoreError> {
        self.acquire(RowKey::History(correlation_id)).await?;
        let staged = self
            .writes
            .updated_history
            .get(&correlation_id)
            .or_else(|| self.writes.new_history.get(&correlation_id))
            .cloned();
        let record = match staged {
            Some(record) => Some(record),
            None => self.committed(|t| t.history.get(&correlation_id).cloned())?,
        };
        Ok(record.filter(|r| !r.is_returned))
    }

    async fn update_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError> {
        if let Some(pending) = self.writes.new_history.get_mut(&record.correlation_id) {
            *pending = record.clone();
        } else {
            self.writes
                .updated_history
                .insert(record.correlation_id, record.clone());
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.apply()
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
