//! # Ledger Repository
//!
//! Append and query access to the `stock_ledger` table.
//!
//! ## Append-Only
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append_in(tx, ..)   INSERT … RETURNING      ✅ the only write path     │
//! │  UPDATE stock_ledger                         ❌ trigger aborts          │
//! │  DELETE FROM stock_ledger                    ❌ trigger aborts          │
//! │                                                                         │
//! │  `seq` is an AUTOINCREMENT key: strictly increasing, never reused.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers outside this crate never append directly; they go through
//! [`LedgerAppender`](crate::appender::LedgerAppender), which also moves the
//! item's stock in the same transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::ledger::{replay, LedgerEntry, Reconciliation, StockDelta};
use stockbook_core::{Catalog, CoreError};
use tracing::{debug, warn};

use crate::error::{DbResult, EngineResult};
use crate::repository::item::ItemRepository;
use crate::repository::{generate_id, Tx};

const LEDGER_COLUMNS: &str = "seq, id, item_id, catalog, kind, quantity, rate_minor, \
     balance_qty, reference_type, reference_id, reference_code, actor_id, note, created_at";

/// Repository for stock ledger rows.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends one row inside `tx` with the given post-mutation balance.
    pub(crate) async fn append_in(
        tx: &mut Tx<'_>,
        item_id: &str,
        catalog: Catalog,
        delta: &StockDelta,
        balance_qty: i64,
        actor_id: &str,
    ) -> DbResult<LedgerEntry> {
        let sql = format!(
            r#"
            INSERT INTO stock_ledger (
                id, item_id, catalog, kind, quantity, rate_minor, balance_qty,
                reference_type, reference_id, reference_code, actor_id, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING {LEDGER_COLUMNS}
            "#
        );

        let entry = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(generate_id())
            .bind(item_id)
            .bind(catalog)
            .bind(delta.kind)
            .bind(delta.quantity)
            .bind(delta.rate_minor)
            .bind(balance_qty)
            .bind(delta.reference_type)
            .bind(&delta.reference_id)
            .bind(&delta.reference_code)
            .bind(actor_id)
            .bind(&delta.note)
            .bind(Utc::now())
            .fetch_one(&mut **tx)
            .await?;

        debug!(
            seq = entry.seq,
            item_id = %item_id,
            quantity = entry.quantity,
            balance = entry.balance_qty,
            reference = %entry.reference_code,
            "Appended ledger entry"
        );
        Ok(entry)
    }

    /// Full history of one item in application order.
    pub async fn entries_for_item(&self, item_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM stock_ledger WHERE item_id = ?1 ORDER BY seq");
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Rows written for one document (bill or purchase id).
    pub async fn entries_for_reference(&self, reference_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM stock_ledger WHERE reference_id = ?1 ORDER BY seq"
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Most recent rows across all items, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM stock_ledger ORDER BY seq DESC LIMIT ?1");
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Compares one item's stock field against its ledger history.
    ///
    /// Returns `None` for untracked items.
    pub async fn reconcile(&self, item_id: &str) -> EngineResult<Option<Reconciliation>> {
        let item = ItemRepository::new(self.pool.clone())
            .resolve(item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Item", item_id))?;

        let Some(stock) = item.stock else {
            return Ok(None);
        };

        let entries = self.entries_for_item(item_id).await?;
        let report = Reconciliation {
            item_id: item.id,
            catalog: item.catalog,
            stock,
            ledger_sum: replay(&entries),
            last_balance: entries.last().map(|e| e.balance_qty),
            entry_count: entries.len() as i64,
        };

        if !report.is_consistent() {
            warn!(
                item_id = %report.item_id,
                stock = report.stock,
                ledger_sum = report.ledger_sum,
                "Stock does not reconcile with ledger"
            );
        }
        Ok(Some(report))
    }

    /// Every tracked item in both catalogs whose stock disagrees with its
    /// ledger. An empty result means the store reconciles.
    pub async fn reconcile_all(&self) -> DbResult<Vec<Reconciliation>> {
        let mut mismatches = Vec::new();

        for catalog in Catalog::RESOLUTION_ORDER {
            let sql = format!(
                r#"
                SELECT
                    i.id AS item_id,
                    '{catalog}' AS catalog,
                    i.stock AS stock,
                    COALESCE((SELECT SUM(l.quantity) FROM stock_ledger l WHERE l.item_id = i.id), 0)
                        AS ledger_sum,
                    (SELECT l.balance_qty FROM stock_ledger l WHERE l.item_id = i.id
                        ORDER BY l.seq DESC LIMIT 1) AS last_balance,
                    (SELECT COUNT(*) FROM stock_ledger l WHERE l.item_id = i.id) AS entry_count
                FROM {table} i
                WHERE i.stock IS NOT NULL
                "#,
                catalog = catalog.as_str(),
                table = catalog.table(),
            );

            let rows = sqlx::query_as::<_, Reconciliation>(&sql)
                .fetch_all(&self.pool)
                .await?;
            mismatches.extend(rows.into_iter().filter(|r| !r.is_consistent()));
        }

        if mismatches.is_empty() {
            debug!("All tracked items reconcile");
        } else {
            warn!(count = mismatches.len(), "Items out of balance with ledger");
        }
        Ok(mismatches)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
