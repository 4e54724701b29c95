//! Postgres-backed storage engine.
//!
//! Row locks are `SELECT ... FOR UPDATE` inside a `sqlx` transaction, so a
//! concurrent transaction touching the same row blocks in the database until
//! the holder commits or rolls back. The schema lives in `migrations/`; its
//! check constraints enforce quantity conservation independently of the
//! application.
//!
//! ## Error Mapping
//!
//! See [`crate::error::map_sqlx_error`]: unique violations become
//! `Conflict`, check violations become `Constraint`, everything else is
//! `Database`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use kitroom_checkout::{
    ActiveCheckout, ActiveCheckoutRow, HistoryRecord, HistoryView, ItemSummary, UserSummary,
};
use kitroom_core::{CheckoutId, CorrelationId, HistoryId, ItemId, UserId};
use kitroom_inventory::{Item, ItemStatus, Quantities, User, UserLookup, UserRole};

use super::r#trait::{ActiveFilter, HistoryFilter, ItemFilter, Storage, StorageTx};
use crate::error::{StoreError, map_sqlx_error};

const ITEM_COLUMNS: &str = r#"
    id, name, category, location,
    quantity_total, quantity_available, quantity_checked_out,
    price_cents, restock_date, condition, status, last_audit_date,
    notes, image_url, created_at, updated_at
"#;

const USER_COLUMNS: &str = r#"
    id, ldap, full_name, email, role, department, active, created_at, updated_at
"#;

const ACTIVE_COLUMNS: &str = r#"
    id, correlation_id, item_id, user_id, quantity,
    checkout_time, expected_return_time, condition_at_checkout, notes
"#;

const HISTORY_COLUMNS: &str = r#"
    id, correlation_id, item_id, user_id, quantity,
    checkout_time, expected_return_time, return_time, is_returned, late_return,
    condition_at_checkout, return_condition, checkout_notes, return_notes
"#;

/// Postgres storage engine. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Storage for PgStorage {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgTx { tx })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| map_sqlx_error("ping", e))
    }

    #[instrument(skip(self, lookup), fields(lookup = %lookup), err)]
    async fn find_user(&self, lookup: &UserLookup) -> Result<Option<User>, StoreError> {
        let row = match lookup {
            UserLookup::Id(id) => {
                sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
            }
            UserLookup::Ldap(ldap) => {
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE ldap = $1 AND active = TRUE"
                ))
                .bind(ldap)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(|e| map_sqlx_error("find_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, ldap = %user.ldap), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, ldap, full_name, email, role, department, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.ldap)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET full_name = $2, email = $3, role = $4, department = $5, active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(user.active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }

    async fn list_users(&self, active_only: bool) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE (NOT $1 OR active) ORDER BY full_name ASC, id ASC"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter().map(user_from_row).collect()
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, location = %item.location), err)]
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                id, name, category, location,
                quantity_total, quantity_available, quantity_checked_out,
                price_cents, restock_date, condition, status, last_audit_date,
                notes, image_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.location)
        .bind(item.quantities.total())
        .bind(item.quantities.available())
        .bind(item.quantities.checked_out())
        .bind(item.price_cents)
        .bind(item.restock_date)
        .bind(&item.condition)
        .bind(item.status.as_str())
        .bind(item.last_audit_date)
        .bind(&item.notes)
        .bind(&item.image_url)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let pattern = filter.text.as_deref().map(like_pattern);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE ($1::text IS NULL OR location = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR category ILIKE $2)
              AND (NOT $3 OR (quantity_available > 0 AND status = 'available'))
            ORDER BY name ASC, id ASC
            "#
        ))
        .bind(&filter.location)
        .bind(pattern)
        .bind(filter.checkout_ready)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(item_from_row).collect()
    }

    async fn list_active(&self, filter: &ActiveFilter) -> Result<Vec<ActiveCheckoutRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.correlation_id, a.item_id, a.user_id, a.quantity,
                   a.checkout_time, a.expected_return_time, a.condition_at_checkout, a.notes,
                   i.name AS item_name, i.category, i.location,
                   u.ldap, u.full_name, u.email
            FROM active_checkouts a
            JOIN items i ON i.id = a.item_id
            JOIN users u ON u.id = a.user_id
            WHERE ($1::uuid IS NULL OR a.user_id = $1)
              AND ($2::uuid IS NULL OR a.item_id = $2)
            ORDER BY a.checkout_time DESC, a.id DESC
            "#,
        )
        .bind(filter.user_id.map(Uuid::from))
        .bind(filter.item_id.map(Uuid::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_active", e))?;

        rows.iter().map(active_row_from_row).collect()
    }

    async fn get_active(&self, id: CheckoutId) -> Result<Option<ActiveCheckoutRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT a.id, a.correlation_id, a.item_id, a.user_id, a.quantity,
                   a.checkout_time, a.expected_return_time, a.condition_at_checkout, a.notes,
                   i.name AS item_name, i.category, i.location,
                   u.ldap, u.full_name, u.email
            FROM active_checkouts a
            JOIN items i ON i.id = a.item_id
            JOIN users u ON u.id = a.user_id
            WHERE a.id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_active", e))?;

        row.as_ref().map(active_row_from_row).transpose()
    }

    async fn list_history(
        &self,
        filter: &HistoryFilter,
        limit: i64,
    ) -> Result<Vec<HistoryView>, StoreError> {
        let (user_id, item_id) = match filter {
            HistoryFilter::User(id) => (Some(*id.as_uuid()), None),
            HistoryFilter::Item(id) => (None, Some(*id.as_uuid())),
        };

        let rows = sqlx::query(
            r#"
            SELECT h.id, h.correlation_id, h.item_id, h.user_id, h.quantity,
                   h.checkout_time, h.expected_return_time, h.return_time,
                   h.is_returned, h.late_return, h.condition_at_checkout,
                   h.return_condition, h.checkout_notes, h.return_notes,
                   i.name AS item_name, i.category, i.location,
                   u.ldap, u.full_name, u.email
            FROM checkout_history h
            JOIN items i ON i.id = h.item_id
            JOIN users u ON u.id = h.user_id
            WHERE ($1::uuid IS NULL OR h.user_id = $1)
              AND ($2::uuid IS NULL OR h.item_id = $2)
            ORDER BY h.checkout_time DESC, h.id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_history", e))?;

        rows.iter()
            .map(|row| {
                Ok(HistoryView {
                    record: history_from_row(row)?,
                    item: item_summary_from_row(row)?,
                    user: user_summary_from_row(row)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StorageTx for PgTx {
    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_item", e))?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn save_item(&mut self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE items
            SET name = $2, category = $3,
                quantity_total = $4, quantity_available = $5, quantity_checked_out = $6,
                price_cents = $7, restock_date = $8, condition = $9, status = $10,
                last_audit_date = $11, notes = $12, image_url = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantities.total())
        .bind(item.quantities.available())
        .bind(item.quantities.checked_out())
        .bind(item.price_cents)
        .bind(item.restock_date)
        .bind(&item.condition)
        .bind(item.status.as_str())
        .bind(item.last_audit_date)
        .bind(&item.notes)
        .bind(&item.image_url)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_item", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(checkout_id = %id), err)]
    async fn lock_active_checkout(
        &mut self,
        id: CheckoutId,
    ) -> Result<Option<ActiveCheckout>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ACTIVE_COLUMNS} FROM active_checkouts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_active_checkout", e))?;

        row.as_ref().map(active_from_row).transpose()
    }

    async fn insert_active_checkout(&mut self, checkout: &ActiveCheckout) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO active_checkouts (
                id, correlation_id, item_id, user_id, quantity,
                checkout_time, expected_return_time, condition_at_checkout, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(checkout.id.as_uuid())
        .bind(checkout.correlation_id.as_uuid())
        .bind(checkout.item_id.as_uuid())
        .bind(checkout.user_id.as_uuid())
        .bind(checkout.quantity)
        .bind(checkout.checkout_time)
        .bind(checkout.expected_return_time)
        .bind(&checkout.condition_at_checkout)
        .bind(&checkout.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_active_checkout", e))?;
        Ok(())
    }

    async fn delete_active_checkout(&mut self, id: CheckoutId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM active_checkouts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_active_checkout", e))?;
        Ok(())
    }

    async fn insert_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO checkout_history (
                id, correlation_id, item_id, user_id, quantity,
                checkout_time, expected_return_time, return_time, is_returned, late_return,
                condition_at_checkout, return_condition, checkout_notes, return_notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.correlation_id.as_uuid())
        .bind(record.item_id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.quantity)
        .bind(record.checkout_time)
        .bind(record.expected_return_time)
        .bind(record.return_time)
        .bind(record.is_returned)
        .bind(record.late_return)
        .bind(&record.condition_at_checkout)
        .bind(&record.return_condition)
        .bind(&record.checkout_notes)
        .bind(&record.return_notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_history", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(correlation_id = %correlation_id), err)]
    async fn lock_open_history(
        &mut self,
        correlation_id: CorrelationId,
    ) -> Result<Option<HistoryRecord>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {HISTORY_COLUMNS} FROM checkout_history
            WHERE correlation_id = $1 AND is_returned = FALSE
            FOR UPDATE
            "#
        ))
        .bind(correlation_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_open_history", e))?;

        row.as_ref().map(history_from_row).transpose()
    }

    async fn update_history(&mut self, record: &HistoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE checkout_history
            SET return_time = $2, is_returned = $3, late_return = $4,
                return_condition = $5, return_notes = $6
            WHERE id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.return_time)
        .bind(record.is_returned)
        .bind(record.late_return)
        .bind(&record.return_condition)
        .bind(&record.return_notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_history", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// `%text%` with LIKE metacharacters escaped.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

// Row decoding

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::Database(format!("failed to decode row: {err}"))
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let quantities = Quantities::from_parts(
        row.try_get("quantity_total").map_err(decode)?,
        row.try_get("quantity_available").map_err(decode)?,
        row.try_get("quantity_checked_out").map_err(decode)?,
    )
    .map_err(|e| StoreError::Constraint(e.to_string()))?;
    let status: String = row.try_get("status").map_err(decode)?;

    Ok(Item {
        id: ItemId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
        quantities,
        price_cents: row.try_get("price_cents").map_err(decode)?,
        restock_date: row.try_get::<Option<NaiveDate>, _>("restock_date").map_err(decode)?,
        condition: row.try_get("condition").map_err(decode)?,
        status: status
            .parse::<ItemStatus>()
            .map_err(|e| StoreError::Database(e.to_string()))?,
        last_audit_date: row.try_get("last_audit_date").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        image_url: row.try_get("image_url").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = row.try_get("role").map_err(decode)?;
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(decode)?),
        ldap: row.try_get("ldap").map_err(decode)?,
        full_name: row.try_get("full_name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        role: role
            .parse::<UserRole>()
            .map_err(|e| StoreError::Database(e.to_string()))?,
        department: row.try_get("department").map_err(decode)?,
        active: row.try_get("active").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn active_from_row(row: &PgRow) -> Result<ActiveCheckout, StoreError> {
    Ok(ActiveCheckout {
        id: CheckoutId::from_uuid(row.try_get("id").map_err(decode)?),
        correlation_id: CorrelationId::from_uuid(row.try_get("correlation_id").map_err(decode)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        quantity: row.try_get("quantity").map_err(decode)?,
        checkout_time: row.try_get("checkout_time").map_err(decode)?,
        expected_return_time: row.try_get("expected_return_time").map_err(decode)?,
        condition_at_checkout: row.try_get("condition_at_checkout").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryRecord, StoreError> {
    Ok(HistoryRecord {
        id: HistoryId::from_uuid(row.try_get("id").map_err(decode)?),
        correlation_id: CorrelationId::from_uuid(row.try_get("correlation_id").map_err(decode)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        quantity: row.try_get("quantity").map_err(decode)?,
        checkout_time: row.try_get("checkout_time").map_err(decode)?,
        expected_return_time: row.try_get("expected_return_time").map_err(decode)?,
        return_time: row
            .try_get::<Option<DateTime<Utc>>, _>("return_time")
            .map_err(decode)?,
        is_returned: row.try_get("is_returned").map_err(decode)?,
        late_return: row.try_get("late_return").map_err(decode)?,
        condition_at_checkout: row.try_get("condition_at_checkout").map_err(decode)?,
        return_condition: row.try_get("return_condition").map_err(decode)?,
        checkout_notes: row.try_get("checkout_notes").map_err(decode)?,
        return_notes: row.try_get("return_notes").map_err(decode)?,
    })
}

fn item_summary_from_row(row: &PgRow) -> Result<ItemSummary, StoreError> {
    Ok(ItemSummary {
        id: ItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        name: row.try_get("item_name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        location: row.try_get("location").map_err(decode)?,
    })
}

fn user_summary_from_row(row: &PgRow) -> Result<UserSummary, StoreError> {
    Ok(UserSummary {
        id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        ldap: row.try_get("ldap").map_err(decode)?,
        full_name: row.try_get("full_name").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
    })
}

fn active_row_from_row(row: &PgRow) -> Result<ActiveCheckoutRow, StoreError> {
    Ok(ActiveCheckoutRow {
        checkout: active_from_row(row)?,
        item: item_summary_from_row(row)?,
        user: user_summary_from_row(row)?,
    })
}
