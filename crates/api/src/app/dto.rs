use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use kitroom_inventory::{Item, User};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub item_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_ldap: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    /// RFC3339, or a naive timestamp taken as UTC.
    #[serde(default)]
    pub expected_return_datetime: Option<String>,
    #[serde(default)]
    pub checkout_condition: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CheckinBody {
    pub checkout_id: String,
    #[serde(default)]
    pub return_condition: Option<String>,
    #[serde(default)]
    pub return_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub ldap: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Accepts `2024-10-20T18:00:00Z`, `2024-10-20T18:00:00+02:00` and
/// `2024-10-20T18:00:00` (UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Treat `?x=` the same as an absent parameter.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// -------------------------
// Response mapping
// -------------------------

pub fn item_to_json(item: &Item) -> serde_json::Value {
    json!({
        "item_id": item.id.to_string(),
        "item_name": item.name,
        "category": item.category,
        "location": item.location,
        "quantity_total": item.quantities.total(),
        "quantity_available": item.quantities.available(),
        "quantity_checked_out": item.quantities.checked_out(),
        "price_cents": item.price_cents,
        "restock_date": item.restock_date,
        "condition": item.condition,
        "status": item.status.as_str(),
        "last_audit_date": item.last_audit_date,
        "notes": item.notes,
        "image_url": item.image_url,
        "availability_status": item.availability().label(),
    })
}

pub fn search_hit_to_json(item: &Item) -> serde_json::Value {
    json!({
        "item_id": item.id.to_string(),
        "item_name": item.name,
        "category": item.category,
        "location": item.location,
        "quantity_available": item.quantities.available(),
        "condition": item.condition,
        "status": item.status.as_str(),
    })
}

pub fn user_brief_to_json(user: &User) -> serde_json::Value {
    json!({
        "ldap": user.ldap,
        "full_name": user.full_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_accept_offsets_and_naive_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 10, 20, 18, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-10-20T18:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-20T20:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-10-20T18:00:00"), Some(expected));
        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn checkout_body_defaults_quantity_to_one() {
        let body: CheckoutBody =
            serde_json::from_value(json!({ "item_id": "x", "user_ldap": "jdoe" })).unwrap();
        assert_eq!(body.quantity, 1);
        assert!(body.user_id.is_none());
    }
}
