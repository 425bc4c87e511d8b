//! # Item Repository
//!
//! Reads and inserts for both catalogs (sub-items and products).
//!
//! ## Key Operations
//! - Resolution by id across catalogs
//! - Tracked quantity lookup (tracked vs untracked)
//! - Insert with opening stock
//! - Case-insensitive lookup by name
//! - Low-stock listing
//!
//! ## Catalog Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve("3f1c…")                                                       │
//! │       │                                                                 │
//! │       ├── SELECT … FROM sub_items WHERE id = ?   → found? return it     │
//! │       │                                                                 │
//! │       └── SELECT … FROM products  WHERE id = ?   → found? return it     │
//! │                                                                         │
//! │  Neither → None (callers raise NotFound)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This repository never writes `stock` on an existing row. Every change
//! after insert goes through [`LedgerAppender`](crate::appender::LedgerAppender).

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::item::{Item, NewItem, StockLevel};
use stockbook_core::ledger::StockDelta;
use stockbook_core::validation::{validate_name, validate_price};
use stockbook_core::{Actor, Catalog, CoreError, ValidationError};
use tracing::debug;

use crate::error::{DbError, DbResult, EngineResult};
use crate::repository::ledger::LedgerRepository;
use crate::repository::{generate_id, Tx};

/// Column list shared by every item query. `catalog` is supplied as a
/// literal per table.
const ITEM_COLUMNS: &str = "id, name, unit, category, price_minor, cost_minor, stock, \
     low_stock_threshold, is_active, created_at, updated_at, version";

fn select_items(catalog: Catalog) -> String {
    format!(
        "SELECT '{}' AS catalog, {} FROM {}",
        catalog.as_str(),
        ITEM_COLUMNS,
        catalog.table()
    )
}

/// Repository for catalog items.
///
/// ## Usage
/// ```rust,ignore
/// let items = db.items();
///
/// let tea = items.insert(NewItem::tracked(Catalog::SubItem, "Masala Tea", 2000, 10), &actor).await?;
/// let level = items.stock_level(&tea.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an item from one catalog.
    pub async fn get(&self, catalog: Catalog, id: &str) -> DbResult<Option<Item>> {
        let sql = format!("{} WHERE id = ?1", select_items(catalog));
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Finds an item by id, trying sub-items before products.
    pub async fn resolve(&self, id: &str) -> DbResult<Option<Item>> {
        for catalog in Catalog::RESOLUTION_ORDER {
            if let Some(item) = self.get(catalog, id).await? {
                debug!(id = %id, catalog = catalog.as_str(), "Resolved item");
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Like [`resolve`](Self::resolve) but a missing item is an error.
    pub async fn require(&self, id: &str) -> EngineResult<Item> {
        self.resolve(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Item", id).into())
    }

    /// Current tracked quantity, or `Untracked` when the stock field is null.
    pub async fn stock_level(&self, id: &str) -> EngineResult<StockLevel> {
        Ok(self.require(id).await?.stock_level())
    }

    /// Case-insensitive exact name match within one catalog.
    pub async fn find_by_name(&self, catalog: Catalog, name: &str) -> DbResult<Option<Item>> {
        let sql = format!("{} WHERE name = ?1 COLLATE NOCASE", select_items(catalog));
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Lists a catalog ordered by name.
    pub async fn list(&self, catalog: Catalog) -> DbResult<Vec<Item>> {
        let sql = format!("{} ORDER BY name COLLATE NOCASE", select_items(catalog));
        let items = sqlx::query_as::<_, Item>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Active tracked items at or below their threshold.
    ///
    /// Untracked items and items without a threshold never appear.
    pub async fn low_stock(&self, catalog: Catalog) -> DbResult<Vec<Item>> {
        let sql = format!(
            r#"
            {}
            WHERE stock IS NOT NULL
              AND low_stock_threshold IS NOT NULL
              AND stock <= low_stock_threshold
              AND is_active = 1
            ORDER BY stock ASC, name COLLATE NOCASE
            "#,
            select_items(catalog)
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(catalog = catalog.as_str(), count = items.len(), "Low stock items");
        Ok(items)
    }

    /// Number of rows in a catalog.
    pub async fn count(&self, catalog: Catalog) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", catalog.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a catalog item in its own transaction.
    pub async fn insert(&self, new: NewItem, actor: &Actor) -> EngineResult<Item> {
        let mut tx = self.pool.begin().await?;
        let item = Self::insert_in(&mut tx, new, actor).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Inserts a catalog item inside `tx`.
    ///
    /// A positive opening stock writes an `OPENING` adjustment row in the
    /// same transaction, so the new item reconciles immediately.
    pub async fn insert_in(tx: &mut Tx<'_>, new: NewItem, actor: &Actor) -> EngineResult<Item> {
        validate_new_item(&new)?;

        let id = generate_id();
        let now = Utc::now();
        let name = new.name.trim().to_string();

        debug!(id = %id, name = %name, catalog = new.catalog.as_str(), "Inserting item");

        let sql = format!(
            r#"
            INSERT INTO {} (
                id, name, unit, category, price_minor, cost_minor, stock,
                low_stock_threshold, is_active, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9, 0)
            RETURNING '{}' AS catalog, {}
            "#,
            new.catalog.table(),
            new.catalog.as_str(),
            ITEM_COLUMNS
        );

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(&id)
            .bind(&name)
            .bind(&new.unit)
            .bind(&new.category)
            .bind(new.price_minor)
            .bind(new.cost_minor)
            .bind(new.stock)
            .bind(new.low_stock_threshold)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("item name", name.clone()),
                other => other,
            })?;

        if let Some(opening) = new.stock.filter(|qty| *qty > 0) {
            let delta = StockDelta::opening(opening, new.cost_minor);
            LedgerRepository::append_in(tx, &item.id, item.catalog, &delta, opening, &actor.id)
                .await?;
        }

        Ok(item)
    }

    /// Finds a product by name inside `tx`, creating a tracked product at
    /// zero stock when none exists.
    ///
    /// The insert runs first and is ignored on a name clash, so the
    /// transaction holds the write lock before it reads.
    pub async fn ensure_product_in(
        tx: &mut Tx<'_>,
        name: &str,
        rate_minor: i64,
    ) -> EngineResult<Item> {
        let name = name.trim();
        validate_name("item name", name)?;
        validate_price("rate", rate_minor)?;

        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO products (
                id, name, unit, category, price_minor, cost_minor, stock,
                low_stock_threshold, is_active, created_at, updated_at, version
            ) VALUES (?1, ?2, 'pcs', NULL, ?3, ?3, 0, NULL, 1, ?4, ?4, 0)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(generate_id())
        .bind(name)
        .bind(rate_minor)
        .bind(now)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            debug!(name = %name, "Created product from stock receipt");
        }

        let sql = format!(
            "{} WHERE name = ?1 COLLATE NOCASE",
            select_items(Catalog::Product)
        );
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;

        Ok(item)
    }
}

fn validate_new_item(new: &NewItem) -> Result<(), ValidationError> {
    validate_name("item name", &new.name)?;
    validate_name("unit", &new.unit)?;
    validate_price("price", new.price_minor)?;
    validate_price("cost", new.cost_minor)?;

    if new.stock.is_some_and(|qty| qty < 0) {
        return Err(ValidationError::OutOfRange {
            field: "opening stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    if new.low_stock_threshold.is_some_and(|t| t < 0) {
        return Err(ValidationError::OutOfRange {
            field: "low stock threshold".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pool::{Database, DbConfig};
    use stockbook_core::ledger::LedgerKind;
    use stockbook_core::Role;

    fn cashier() -> Actor {
        Actor::new("u-1", "Asha", Role::Cashier)
    }

    #[tokio::test]
    async fn test_insert_and_resolve_across_catalogs() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = db.items();

        let tea = items
            .insert(NewItem::tracked(Catalog::SubItem, "Masala Tea", 2_000, 10), &cashier())
            .await
            .unwrap();
        let water = items
            .insert(NewItem::untracked(Catalog::Product, "Water 500ml", 1_500), &cashier())
            .await
            .unwrap();

        let found = items.resolve(&tea.id).await.unwrap().unwrap();
        assert_eq!(found.catalog, Catalog::SubItem);
        assert_eq!(found.stock, Some(10));

        let found = items.resolve(&water.id).await.unwrap().unwrap();
        assert_eq!(found.catalog, Catalog::Product);
        assert_eq!(found.stock, None);

        assert!(items.resolve("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_untracked_is_not_zero() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = db.items();

        let zero = items
            .insert(NewItem::tracked(Catalog::Product, "Chips", 2_000, 0), &cashier())
            .await
            .unwrap();
        let untracked = items
            .insert(NewItem::untracked(Catalog::Product, "Service", 5_000), &cashier())
            .await
            .unwrap();

        assert_eq!(items.stock_level(&zero.id).await.unwrap(), StockLevel::Tracked(0));
        assert_eq!(items.stock_level(&untracked.id).await.unwrap(), StockLevel::Untracked);

        let err = items.stock_level("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_opening_stock_writes_ledger_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db
            .items()
            .insert(
                NewItem::tracked(Catalog::SubItem, "Masala Tea", 2_000, 10).with_cost(800),
                &cashier(),
            )
            .await
            .unwrap();

        let entries = db.ledger().entries_for_item(&tea.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LedgerKind::Adjustment);
        assert_eq!(entries[0].quantity, 10);
        assert_eq!(entries[0].balance_qty, 10);
        assert_eq!(entries[0].reference_code, "OPENING");
        assert_eq!(entries[0].rate_minor, 800);

        // Zero opening stock and untracked items produce no rows
        let chips = db
            .items()
            .insert(NewItem::tracked(Catalog::Product, "Chips", 2_000, 0), &cashier())
            .await
            .unwrap();
        assert!(db.ledger().entries_for_item(&chips.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = db.items();

        items
            .insert(NewItem::tracked(Catalog::Product, "Sugar 1kg", 4_500, 0), &cashier())
            .await
            .unwrap();
        let err = items
            .insert(NewItem::tracked(Catalog::Product, "SUGAR 1KG", 4_500, 0), &cashier())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Db(DbError::UniqueViolation { .. })));

        let found = items
            .find_by_name(Catalog::Product, "sugar 1KG")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Sugar 1kg");
        assert_eq!(items.count(Catalog::Product).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejects_negative_stock_and_blank_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = db.items();

        let err = items
            .insert(NewItem::tracked(Catalog::Product, "Chips", 2_000, -1), &cashier())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        let err = items
            .insert(NewItem::tracked(Catalog::Product, "  ", 2_000, 1), &cashier())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = db.items();

        items
            .insert(
                NewItem::tracked(Catalog::SubItem, "Masala Tea", 2_000, 3).with_threshold(5),
                &cashier(),
            )
            .await
            .unwrap();
        items
            .insert(
                NewItem::tracked(Catalog::SubItem, "Coffee", 2_500, 20).with_threshold(5),
                &cashier(),
            )
            .await
            .unwrap();
        items
            .insert(NewItem::untracked(Catalog::SubItem, "Hot Water", 0), &cashier())
            .await
            .unwrap();

        let low = items.low_stock(Catalog::SubItem).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Masala Tea");
        assert!(low[0].is_low_stock());

        assert_eq!(items.list(Catalog::SubItem).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ensure_product_in_reuses_existing_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let existing = db
            .items()
            .insert(NewItem::tracked(Catalog::Product, "Sugar 1kg", 4_500, 2), &cashier())
            .await
            .unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let found = ItemRepository::ensure_product_in(&mut tx, "sugar 1kg", 4_000)
            .await
            .unwrap();
        let created = ItemRepository::ensure_product_in(&mut tx, "Tea leaves", 12_000)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(found.id, existing.id);
        assert_eq!(found.stock, Some(2));
        assert_eq!(created.stock, Some(0));
        assert_eq!(created.cost_minor, 12_000);
        assert_eq!(db.items().count(Catalog::Product).await.unwrap(), 2);
    }
}
