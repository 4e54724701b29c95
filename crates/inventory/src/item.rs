use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use kitroom_core::{DomainError, Entity, ItemId, ValueObject};

use crate::quantity::Quantities;

/// Lifecycle status of an item. Only `Available` items are offered for checkout
/// in the availability listing.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Available,
    Maintenance,
    Retired,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Maintenance => "maintenance",
            ItemStatus::Retired => "retired",
        }
    }
}

impl core::str::FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(ItemStatus::Available),
            "maintenance" => Ok(ItemStatus::Maintenance),
            "retired" => Ok(ItemStatus::Retired),
            other => Err(DomainError::validation(format!(
                "status must be one of: available, maintenance, retired (got '{other}')"
            ))),
        }
    }
}

/// Stock label shown next to an item in listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    OutOfStock,
    LowStock,
    Available,
}

impl Availability {
    pub fn label(&self) -> &'static str {
        match self {
            Availability::OutOfStock => "Out of Stock",
            Availability::LowStock => "Low Stock",
            Availability::Available => "Available",
        }
    }
}

pub const DEFAULT_CONDITION: &str = "good";

/// A stocked piece of equipment at one location.
///
/// `quantities` is never written by catalog updates; it only changes through
/// the item ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub location: String,
    pub quantities: Quantities,
    pub price_cents: Option<i64>,
    pub restock_date: Option<NaiveDate>,
    pub condition: String,
    pub status: ItemStatus,
    pub last_audit_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Item {
    /// Out of stock at zero, low stock under 20% of total.
    pub fn availability(&self) -> Availability {
        let q = self.quantities;
        if q.available() == 0 {
            Availability::OutOfStock
        } else if i64::from(q.available()) * 5 < i64::from(q.total()) {
            Availability::LowStock
        } else {
            Availability::Available
        }
    }

    /// Whether the item shows up in the "available for checkout" listing.
    pub fn is_checkout_ready(&self) -> bool {
        self.status == ItemStatus::Available && self.quantities.available() > 0
    }
}

/// Request to register a new item. All units start out available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub location: String,
    pub quantity_total: i32,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub restock_date: Option<NaiveDate>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        location: impl Into<String>,
        quantity_total: i32,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            location: location.into(),
            quantity_total,
            price_cents: None,
            restock_date: None,
            condition: None,
            status: None,
            notes: None,
            image_url: None,
        }
    }

    /// Validate and materialize the item row.
    pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> Result<Item, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.location.trim().is_empty() {
            return Err(DomainError::validation("location cannot be empty"));
        }
        if self.price_cents.is_some_and(|p| p < 0) {
            return Err(DomainError::validation("price cannot be negative"));
        }
        let quantities = Quantities::new_stock(self.quantity_total)
            .map_err(|_| DomainError::validation("quantity_total cannot be negative"))?;

        Ok(Item {
            id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            location: self.location.trim().to_string(),
            quantities,
            price_cents: self.price_cents,
            restock_date: self.restock_date,
            condition: self.condition.unwrap_or_else(|| DEFAULT_CONDITION.to_string()),
            status: self.status.unwrap_or_default(),
            last_audit_date: None,
            notes: self.notes,
            image_url: self.image_url,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Descriptive fields an item update may touch. `None` leaves a field as is.
///
/// Location and quantities are deliberately absent: moving stock between
/// locations is a new item, and quantities belong to the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub restock_date: Option<NaiveDate>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub last_audit_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ValueObject for ItemUpdate {}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ItemUpdate::default()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("update contains no fields"));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.condition.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(DomainError::validation("condition cannot be empty"));
        }
        if self.price_cents.is_some_and(|p| p < 0) {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(())
    }

    /// Apply the set fields to `item` and bump `updated_at`.
    pub fn apply_to(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(category) = &self.category {
            item.category = category.trim().to_string();
        }
        if let Some(price) = self.price_cents {
            item.price_cents = Some(price);
        }
        if let Some(date) = self.restock_date {
            item.restock_date = Some(date);
        }
        if let Some(condition) = &self.condition {
            item.condition = condition.clone();
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(date) = self.last_audit_date {
            item.last_audit_date = Some(date);
        }
        if let Some(notes) = &self.notes {
            item.notes = Some(notes.clone());
        }
        if let Some(url) = &self.image_url {
            item.image_url = Some(url.clone());
        }
        item.updated_at = now;
    }
}
