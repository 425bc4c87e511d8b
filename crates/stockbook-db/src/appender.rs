//! # Ledger Appender
//!
//! The single write path for item stock after insert.
//!
//! ## Atomic Stock Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_in(tx, catalog, item, delta)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE {catalog} SET stock = stock + Δ                                │
//! │   WHERE id = ? AND stock IS NOT NULL AND stock + Δ >= 0                │
//! │   RETURNING stock                                                      │
//! │       │                                                                 │
//! │       ├── row returned ──► INSERT stock_ledger (balance = stock)       │
//! │       │                                                                 │
//! │       └── no row ──► why?                                              │
//! │             ├── item missing        → NotFound                         │
//! │             ├── stock IS NULL       → untracked, no-op, no ledger row  │
//! │             ├── expected mismatch   → StateConflict (count raced)      │
//! │             └── would go negative   → InsufficientStock / StockViolation│
//! │                                                                         │
//! │  Both statements share the caller's transaction: the stock column and  │
//! │  the ledger only ever change together.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::item::{ensure_available, StockLevel};
use stockbook_core::ledger::{apply_delta, AdjustmentTarget, LedgerEntry, LedgerKind, StockDelta};
use stockbook_core::{Actor, Catalog, CoreError, ADJUSTMENT_RETRIES};
use tracing::{debug, info, warn};

use crate::error::EngineResult;
use crate::repository::item::ItemRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::Tx;

/// Applies stock deltas and appends the matching ledger rows.
#[derive(Debug, Clone)]
pub struct LedgerAppender {
    pool: SqlitePool,
}

impl LedgerAppender {
    /// Creates a new LedgerAppender.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerAppender { pool }
    }

    /// Applies `delta` to one item inside `tx`.
    ///
    /// ## Returns
    /// * `Ok(Some(entry))` - stock moved and the ledger row was appended
    /// * `Ok(None)` - untracked item or zero delta, nothing written
    ///
    /// `expected` makes the write conditional on the current quantity; a
    /// mismatch is reported as a state conflict.
    pub async fn apply_in(
        tx: &mut Tx<'_>,
        catalog: Catalog,
        item_id: &str,
        delta: &StockDelta,
        actor: &Actor,
        expected: Option<i64>,
    ) -> EngineResult<Option<LedgerEntry>> {
        if delta.quantity == 0 {
            return Ok(None);
        }

        let sql = format!(
            r#"
            UPDATE {}
            SET stock = stock + ?2, version = version + 1, updated_at = ?3
            WHERE id = ?1
              AND stock IS NOT NULL
              AND stock + ?2 >= 0
              AND (?4 IS NULL OR stock = ?4)
            RETURNING stock
            "#,
            catalog.table()
        );

        let balance: Option<i64> = sqlx::query_scalar(&sql)
            .bind(item_id)
            .bind(delta.quantity)
            .bind(Utc::now())
            .bind(expected)
            .fetch_optional(&mut **tx)
            .await?;

        match balance {
            Some(balance) => {
                let entry =
                    LedgerRepository::append_in(tx, item_id, catalog, delta, balance, &actor.id)
                        .await?;
                Ok(Some(entry))
            }
            None => Self::explain_rejection(tx, catalog, item_id, delta, expected).await,
        }
    }

    /// Works out why the conditional update matched no row.
    async fn explain_rejection(
        tx: &mut Tx<'_>,
        catalog: Catalog,
        item_id: &str,
        delta: &StockDelta,
        expected: Option<i64>,
    ) -> EngineResult<Option<LedgerEntry>> {
        let sql = format!("SELECT name, stock FROM {} WHERE id = ?1", catalog.table());
        let row: Option<(String, Option<i64>)> = sqlx::query_as(&sql)
            .bind(item_id)
            .fetch_optional(&mut **tx)
            .await?;

        let Some((name, stock)) = row else {
            return Err(CoreError::not_found("Item", item_id).into());
        };

        let Some(current) = stock else {
            debug!(item_id = %item_id, "Untracked item, stock delta skipped");
            return Ok(None);
        };

        if expected.is_some_and(|e| e != current) {
            return Err(CoreError::conflict("Item", name, "stock changed during adjustment").into());
        }

        warn!(item_id = %item_id, current, delta = delta.quantity, "Stock delta rejected");
        if delta.kind == LedgerKind::Sale {
            ensure_available(&name, StockLevel::Tracked(current), -delta.quantity)?;
        }
        apply_delta(&name, current, delta.quantity)?;

        // The guarded update only misses for the reasons above.
        Err(CoreError::conflict("Item", name, "stock update did not apply").into())
    }

    /// Applies one delta in its own transaction.
    pub async fn apply(
        &self,
        catalog: Catalog,
        item_id: &str,
        delta: &StockDelta,
        actor: &Actor,
    ) -> EngineResult<Option<LedgerEntry>> {
        let mut tx = self.pool.begin().await?;
        let entry = Self::apply_in(&mut tx, catalog, item_id, delta, actor, None).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Manual correction by delta or by physical count.
    ///
    /// A count (`SetTo`) is applied against the quantity read just before
    /// the write and retried if another writer moved stock in between.
    /// Untracked items are a no-op.
    pub async fn adjust_stock(
        &self,
        item_id: &str,
        target: AdjustmentTarget,
        note: Option<String>,
        actor: &Actor,
    ) -> EngineResult<Option<LedgerEntry>> {
        let items = ItemRepository::new(self.pool.clone());
        let mut attempt = 0;

        loop {
            attempt += 1;
            let item = items.require(item_id).await?;

            let Some(current) = item.stock else {
                debug!(item_id = %item_id, "Adjustment on untracked item skipped");
                return Ok(None);
            };

            let quantity = target.delta_from(current)?;
            let delta = StockDelta::adjustment(quantity, item.cost_minor, note.clone());
            let expected = match target {
                AdjustmentTarget::SetTo(_) => Some(current),
                AdjustmentTarget::Delta(_) => None,
            };

            let mut tx = self.pool.begin().await?;
            match Self::apply_in(&mut tx, item.catalog, item_id, &delta, actor, expected).await {
                Ok(entry) => {
                    tx.commit().await?;
                    if let Some(entry) = &entry {
                        info!(
                            item_id = %item_id,
                            delta = entry.quantity,
                            balance = entry.balance_qty,
                            actor = %actor.id,
                            "Stock adjusted"
                        );
                    }
                    return Ok(entry);
                }
                Err(err) if err.is_state_conflict() && attempt < ADJUSTMENT_RETRIES => {
                    debug!(item_id = %item_id, attempt, "Stock moved during count, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pool::{Database, DbConfig};
    use stockbook_core::item::NewItem;
    use stockbook_core::ledger::balances_are_consistent;
    use stockbook_core::Role;

    fn manager() -> Actor {
        Actor::new("u-2", "Ravi", Role::Manager)
    }

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db
            .items()
            .insert(
                NewItem::tracked(Catalog::SubItem, "Masala Tea", 2_000, 10).with_cost(800),
                &manager(),
            )
            .await
            .unwrap();
        let water = db
            .items()
            .insert(NewItem::untracked(Catalog::Product, "Water", 1_500), &manager())
            .await
            .unwrap();
        (db, tea.id, water.id)
    }

    #[tokio::test]
    async fn test_delta_moves_stock_and_appends_row() {
        let (db, tea, _) = setup().await;

        let entry = db
            .appender()
            .apply(
                Catalog::SubItem,
                &tea,
                &StockDelta::purchase(5, 700, None, "STOCK-IN"),
                &manager(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.quantity, 5);
        assert_eq!(entry.balance_qty, 15);
        assert_eq!(entry.kind, LedgerKind::Purchase);
        assert_eq!(entry.actor_id, "u-2");

        let item = db.items().resolve(&tea).await.unwrap().unwrap();
        assert_eq!(item.stock, Some(15));

        let entries = db.ledger().entries_for_item(&tea).await.unwrap();
        assert!(balances_are_consistent(&entries));
        assert!(entries[0].seq < entries[1].seq);
    }

    #[tokio::test]
    async fn test_untracked_is_a_no_op() {
        let (db, _, water) = setup().await;

        let entry = db
            .appender()
            .apply(
                Catalog::Product,
                &water,
                &StockDelta::adjustment(-100, 0, None),
                &manager(),
            )
            .await
            .unwrap();

        assert!(entry.is_none());
        assert!(db.ledger().entries_for_item(&water).await.unwrap().is_empty());
        assert_eq!(db.items().resolve(&water).await.unwrap().unwrap().stock, None);
    }

    #[tokio::test]
    async fn test_negative_result_is_rejected() {
        let (db, tea, _) = setup().await;

        let err = db
            .appender()
            .apply(
                Catalog::SubItem,
                &tea,
                &StockDelta::adjustment(-11, 0, None),
                &manager(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::StockViolation { current: 10, delta: -11, .. })));

        let err = db
            .appender()
            .apply(
                Catalog::SubItem,
                &tea,
                &StockDelta::sale(11, 2_000, "bill-1", 1),
                &manager(),
            )
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());
        assert!(err.to_string().contains("Available: 10"));

        assert_eq!(db.items().resolve(&tea).await.unwrap().unwrap().stock, Some(10));
        assert_eq!(db.ledger().entries_for_item(&tea).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_item() {
        let (db, _, _) = setup().await;

        let err = db
            .appender()
            .apply(
                Catalog::Product,
                "missing",
                &StockDelta::adjustment(1, 0, None),
                &manager(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_adjust_by_count_and_by_delta() {
        let (db, tea, water) = setup().await;
        let appender = db.appender();

        let entry = appender
            .adjust_stock(&tea, AdjustmentTarget::SetTo(4), Some("Spillage".to_string()), &manager())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.quantity, -6);
        assert_eq!(entry.balance_qty, 4);
        assert_eq!(entry.rate_minor, 800);
        assert_eq!(entry.reference_code, "ADJ");
        assert_eq!(entry.note.as_deref(), Some("Spillage"));

        let entry = appender
            .adjust_stock(&tea, AdjustmentTarget::Delta(3), None, &manager())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.balance_qty, 7);

        // Count equal to current stock records nothing
        assert!(appender
            .adjust_stock(&tea, AdjustmentTarget::SetTo(7), None, &manager())
            .await
            .unwrap()
            .is_none());

        let err = appender
            .adjust_stock(&tea, AdjustmentTarget::SetTo(-1), None, &manager())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        assert!(appender
            .adjust_stock(&water, AdjustmentTarget::SetTo(50), None, &manager())
            .await
            .unwrap()
            .is_none());

        let report = db.ledger().reconcile(&tea).await.unwrap().unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.stock, 7);
    }

    #[tokio::test]
    async fn test_expected_quantity_guard() {
        let (db, tea, _) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let err = LedgerAppender::apply_in(
            &mut tx,
            Catalog::SubItem,
            &tea,
            &StockDelta::adjustment(-2, 0, None),
            &manager(),
            Some(9),
        )
        .await
        .unwrap_err();
        assert!(err.is_state_conflict());
    }
}
