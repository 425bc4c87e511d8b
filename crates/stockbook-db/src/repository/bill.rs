//! # Bill Repository
//!
//! Persistence for bills and bill lines.
//!
//! ## Bill Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleService::create_sale ──► insert_in ──► Completed                  │
//! │                                                │                        │
//! │  SaleService::cancel_sale ──► mark_cancelled_in┘──► Cancelled           │
//! │                              (guarded: WHERE status = 'completed')      │
//! │                                                                         │
//! │  mark_printed  any status, idempotent                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Bills, their lines and the ledger rows they cause are only ever written
//! inside one service transaction. Nothing here touches stock.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::bill::{Bill, BillLine, BillStatus, BillTotals};
use stockbook_core::{CoreError, CustomerInfo, PaymentMode, PaymentPart};
use tracing::debug;

use crate::error::{DbResult, EngineResult};
use crate::repository::Tx;

const BILL_COLUMNS: &str = "id, bill_number, order_id, customer_name, customer_phone, \
     subtotal_minor, discount_minor, tax_minor, round_off_minor, grand_total_minor, \
     payment_mode, payment_parts, status, is_printed, created_by, created_at, \
     cancelled_by, cancelled_at";

const LINE_COLUMNS: &str = "id, bill_id, line_no, item_id, catalog, item_name, unit, quantity, \
     unit_price_minor, line_total_minor, cost_price_minor";

/// Flat `bills` row; lines and JSON columns are attached in [`BillRow::into_bill`].
#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: String,
    bill_number: i64,
    order_id: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    subtotal_minor: i64,
    discount_minor: i64,
    tax_minor: i64,
    round_off_minor: i64,
    grand_total_minor: i64,
    payment_mode: PaymentMode,
    payment_parts: String,
    status: BillStatus,
    is_printed: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BillRow {
    fn into_bill(self, lines: Vec<BillLine>) -> DbResult<Bill> {
        let payment_parts: Vec<PaymentPart> = serde_json::from_str(&self.payment_parts)?;

        Ok(Bill {
            id: self.id,
            bill_number: self.bill_number,
            order_id: self.order_id,
            customer: CustomerInfo {
                name: self.customer_name,
                phone: self.customer_phone,
            },
            lines,
            totals: BillTotals {
                subtotal_minor: self.subtotal_minor,
                discount_minor: self.discount_minor,
                tax_minor: self.tax_minor,
                round_off_minor: self.round_off_minor,
                grand_total_minor: self.grand_total_minor,
            },
            payment_mode: self.payment_mode,
            payment_parts,
            status: self.status,
            is_printed: self.is_printed,
            created_by: self.created_by,
            created_at: self.created_at,
            cancelled_by: self.cancelled_by,
            cancelled_at: self.cancelled_at,
        })
    }
}

/// Repository for bills.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    /// Creates a new BillRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// Gets a bill with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Bill>> {
        let mut conn = self.pool.acquire().await?;
        fetch_bill(&mut conn, BillKey::Id(id)).await
    }

    /// Gets a bill by its sequential number.
    pub async fn get_by_number(&self, bill_number: i64) -> DbResult<Option<Bill>> {
        let mut conn = self.pool.acquire().await?;
        fetch_bill(&mut conn, BillKey::Number(bill_number)).await
    }

    /// Bills produced from an order (at most one).
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<Bill>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE order_id = ?1 ORDER BY bill_number");
        let rows = sqlx::query_as::<_, BillRow>(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

        let mut bills = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, &row.id).await?;
            bills.push(row.into_bill(lines)?);
        }
        Ok(bills)
    }

    /// Sets the printed flag. Repeating it is a no-op.
    pub async fn mark_printed(&self, id: &str) -> EngineResult<()> {
        let result = sqlx::query("UPDATE bills SET is_printed = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Bill", id).into());
        }

        debug!(id = %id, "Marked bill printed");
        Ok(())
    }

    /// Inserts a bill and its lines inside `tx`.
    pub(crate) async fn insert_in(tx: &mut Tx<'_>, bill: &Bill) -> DbResult<()> {
        debug!(id = %bill.id, bill_number = bill.bill_number, lines = bill.lines.len(), "Inserting bill");

        let payment_parts = serde_json::to_string(&bill.payment_parts)?;

        sqlx::query(
            r#"
            INSERT INTO bills (
                id, bill_number, order_id, customer_name, customer_phone,
                subtotal_minor, discount_minor, tax_minor, round_off_minor, grand_total_minor,
                payment_mode, payment_parts, status, is_printed, created_by, created_at,
                cancelled_by, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, NULL, NULL)
            "#,
        )
        .bind(&bill.id)
        .bind(bill.bill_number)
        .bind(&bill.order_id)
        .bind(&bill.customer.name)
        .bind(&bill.customer.phone)
        .bind(bill.totals.subtotal_minor)
        .bind(bill.totals.discount_minor)
        .bind(bill.totals.tax_minor)
        .bind(bill.totals.round_off_minor)
        .bind(bill.totals.grand_total_minor)
        .bind(bill.payment_mode)
        .bind(payment_parts)
        .bind(bill.status)
        .bind(bill.is_printed)
        .bind(&bill.created_by)
        .bind(bill.created_at)
        .execute(&mut **tx)
        .await?;

        for line in &bill.lines {
            sqlx::query(
                r#"
                INSERT INTO bill_lines (
                    id, bill_id, line_no, item_id, catalog, item_name, unit, quantity,
                    unit_price_minor, line_total_minor, cost_price_minor
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&line.id)
            .bind(&line.bill_id)
            .bind(line.line_no)
            .bind(&line.item_id)
            .bind(line.catalog)
            .bind(&line.item_name)
            .bind(&line.unit)
            .bind(line.quantity)
            .bind(line.unit_price_minor)
            .bind(line.line_total_minor)
            .bind(line.cost_price_minor)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Flips a Completed bill to Cancelled inside `tx`.
    ///
    /// Returns false when the bill is missing or no longer Completed; the
    /// caller decides which error that is.
    pub(crate) async fn mark_cancelled_in(
        tx: &mut Tx<'_>,
        id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET status = 'cancelled', cancelled_by = ?2, cancelled_at = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(actor_id)
        .bind(at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reads a bill inside `tx`.
    pub(crate) async fn get_in(tx: &mut Tx<'_>, id: &str) -> DbResult<Option<Bill>> {
        fetch_bill(&mut **tx, BillKey::Id(id)).await
    }
}

/// Lookup key for a single bill.
#[derive(Debug, Clone, Copy)]
enum BillKey<'a> {
    Id(&'a str),
    Number(i64),
}

async fn fetch_bill(conn: &mut SqliteConnection, key: BillKey<'_>) -> DbResult<Option<Bill>> {
    let sql = match key {
        BillKey::Id(_) => format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1"),
        BillKey::Number(_) => format!("SELECT {BILL_COLUMNS} FROM bills WHERE bill_number = ?1"),
    };
    let query = sqlx::query_as::<_, BillRow>(&sql);
    let query = match key {
        BillKey::Id(id) => query.bind(id),
        BillKey::Number(number) => query.bind(number),
    };
    let row = query.fetch_optional(&mut *conn).await?;

    match row {
        Some(row) => {
            let lines = fetch_lines(conn, &row.id).await?;
            Ok(Some(row.into_bill(lines)?))
        }
        None => Ok(None),
    }
}

async fn fetch_lines(conn: &mut SqliteConnection, bill_id: &str) -> DbResult<Vec<BillLine>> {
    let sql = format!("SELECT {LINE_COLUMNS} FROM bill_lines WHERE bill_id = ?1 ORDER BY line_no");
    let lines = sqlx::query_as::<_, BillLine>(&sql)
        .bind(bill_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================
