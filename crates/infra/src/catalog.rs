//! Catalog service: descriptive item data and user records.
//!
//! Quantities are never edited here. Item updates take the item row lock so
//! they serialize with ledger transfers instead of overwriting them.

use std::sync::Arc;

use tracing::{info, instrument};

use kitroom_core::{DomainError, ItemId, UserId};
use kitroom_inventory::{Item, ItemUpdate, NewItem, NewUser, User, UserLookup, UserUpdate};

use crate::clock::Clock;
use crate::error::{CheckoutError, StoreError};
use crate::store::{ItemFilter, Storage, StorageTx, settle};

pub struct CatalogService<S: Storage> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    locations: Vec<String>,
}

impl<S: Storage> CatalogService<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            locations: Vec::new(),
        }
    }

    /// Restrict location listings to a whitelist. Empty disables the check.
    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations;
        self
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn check_location(&self, location: &str) -> Result<(), CheckoutError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(CheckoutError::Validation("location is required".into()));
        }
        if !self.locations.is_empty() && !self.locations.iter().any(|l| l == location) {
            return Err(CheckoutError::Validation(format!(
                "invalid location '{location}', valid locations: {}",
                self.locations.join(", ")
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(location = %new_item.location), err)]
    pub async fn create_item(&self, new_item: NewItem) -> Result<Item, CheckoutError> {
        let item = new_item.into_item(ItemId::new(), self.clock.now())?;
        self.storage.insert_item(&item).await?;
        info!(item_id = %item.id, total = item.quantities.total(), "item created");
        Ok(item)
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<Item, CheckoutError> {
        update.validate()?;
        let now = self.clock.now();

        let mut tx = self.storage.begin().await?;
        let result = async {
            let mut item = tx
                .lock_item(id)
                .await?
                .ok_or(CheckoutError::ItemNotFound(id))?;
            update.apply_to(&mut item, now);
            tx.save_item(&item).await?;
            Ok::<_, CheckoutError>(item)
        }
        .await;
        settle(tx, result).await
    }

    pub async fn get_item(&self, id: ItemId) -> Result<Item, CheckoutError> {
        self.storage
            .get_item(id)
            .await?
            .ok_or(CheckoutError::ItemNotFound(id))
    }

    /// All items at a whitelisted location, ordered by name.
    pub async fn items_by_location(&self, location: &str) -> Result<Vec<Item>, CheckoutError> {
        self.check_location(location)?;
        let items = self
            .storage
            .list_items(&ItemFilter::at_location(location.trim()))
            .await?;
        Ok(items)
    }

    /// Items that can be checked out right now.
    pub async fn available_items(&self, location: Option<&str>) -> Result<Vec<Item>, CheckoutError> {
        let filter = ItemFilter {
            location: location.map(str::to_string),
            checkout_ready: true,
            ..ItemFilter::default()
        };
        Ok(self.storage.list_items(&filter).await?)
    }

    /// Case-insensitive substring search over name and category.
    pub async fn search_items(
        &self,
        text: &str,
        location: Option<&str>,
    ) -> Result<Vec<Item>, CheckoutError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CheckoutError::Validation("search text is required".into()));
        }
        let filter = ItemFilter {
            location: location.map(str::to_string),
            text: Some(text.to_string()),
            checkout_ready: false,
        };
        Ok(self.storage.list_items(&filter).await?)
    }

    #[instrument(skip_all, fields(ldap = %new_user.ldap), err)]
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, CheckoutError> {
        let user = new_user.into_user(UserId::new(), self.clock.now())?;
        match self.storage.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(DomainError::conflict(format!(
                    "user with ldap '{}' already exists",
                    user.ldap
                ))
                .into());
            }
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn find_user(&self, lookup: UserLookup) -> Result<User, CheckoutError> {
        self.storage
            .find_user(&lookup)
            .await?
            .ok_or(CheckoutError::UserNotFound(lookup))
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, CheckoutError> {
        update.validate()?;
        let mut user = self.find_user(UserLookup::Id(id)).await?;
        update.apply_to(&mut user, self.clock.now());
        self.storage.update_user(&user).await?;
        Ok(user)
    }

    /// Soft delete: the user keeps their history but can no longer be found
    /// by ldap.
    pub async fn deactivate_user(&self, id: UserId) -> Result<User, CheckoutError> {
        self.update_user(id, UserUpdate::deactivate()).await
    }

    pub async fn list_users(&self, active_only: bool) -> Result<Vec<User>, CheckoutError> {
        Ok(self.storage.list_users(active_only).await?)
    }
}
