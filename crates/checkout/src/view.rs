//! Joined read shapes for the checkout views.
//!
//! Storage produces [`ActiveCheckoutRow`] and [`HistoryView`] by joining the
//! checkout tables with items and users; the overdue fields are derived from
//! a reference time afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kitroom_core::{ItemId, UserId};
use kitroom_inventory::{Item, User};

use crate::overdue::Overdue;
use crate::record::{ActiveCheckout, HistoryRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub location: String,
}

impl From<&Item> for ItemSummary {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            category: item.category.clone(),
            location: item.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub ldap: String,
    pub full_name: String,
    pub email: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            ldap: user.ldap.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// An open checkout joined with its item and user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCheckoutRow {
    pub checkout: ActiveCheckout,
    pub item: ItemSummary,
    pub user: UserSummary,
}

impl ActiveCheckoutRow {
    pub fn at(self, now: DateTime<Utc>) -> ActiveCheckoutView {
        let overdue = Overdue::at(self.checkout.expected_return_time, now);
        ActiveCheckoutView {
            checkout: self.checkout,
            item: self.item,
            user: self.user,
            overdue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCheckoutView {
    #[serde(flatten)]
    pub checkout: ActiveCheckout,
    pub item: ItemSummary,
    pub user: UserSummary,
    #[serde(flatten)]
    pub overdue: Overdue,
}

impl ActiveCheckoutView {
    /// Newest checkout first; ties broken by checkout id, descending.
    pub fn newest_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.checkout
            .checkout_time
            .cmp(&a.checkout.checkout_time)
            .then_with(|| b.checkout.id.cmp(&a.checkout.id))
    }

    /// Most days overdue first, then newest first.
    pub fn most_overdue_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.overdue
            .days_overdue
            .cmp(&a.overdue.days_overdue)
            .then_with(|| Self::newest_first(a, b))
    }
}

/// A history row joined with its item and user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryView {
    #[serde(flatten)]
    pub record: HistoryRecord,
    pub item: ItemSummary,
    pub user: UserSummary,
}
