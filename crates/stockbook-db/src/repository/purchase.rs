//! # Purchase Repository
//!
//! Persistence for purchases and their free-text lines.
//!
//! Payment updates carry the version the caller read; a concurrent update
//! bumps it and the stale writer gets `false` back.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::purchase::{PaymentStatus, Purchase, PurchaseLine, TaxLine};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::Tx;

const PURCHASE_COLUMNS: &str = "id, purchase_number, sequence, supplier_id, invoice_number, \
     invoice_date, invoice_amount_minor, tax_lines, tax_total_minor, paid_amount_minor, \
     pending_amount_minor, payment_status, is_local, created_by, created_at, updated_at, version";

const LINE_COLUMNS: &str =
    "id, purchase_id, line_no, item_name, quantity, rate_minor, total_minor";

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    purchase_number: String,
    sequence: i64,
    supplier_id: String,
    invoice_number: Option<String>,
    invoice_date: Option<String>,
    invoice_amount_minor: i64,
    tax_lines: String,
    tax_total_minor: i64,
    paid_amount_minor: i64,
    pending_amount_minor: i64,
    payment_status: PaymentStatus,
    is_local: bool,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl PurchaseRow {
    fn into_purchase(self, lines: Vec<PurchaseLine>) -> DbResult<Purchase> {
        let tax_lines: Vec<TaxLine> = serde_json::from_str(&self.tax_lines)?;

        Ok(Purchase {
            id: self.id,
            purchase_number: self.purchase_number,
            sequence: self.sequence,
            supplier_id: self.supplier_id,
            invoice_number: self.invoice_number,
            invoice_date: self.invoice_date,
            lines,
            invoice_amount_minor: self.invoice_amount_minor,
            tax_lines,
            tax_total_minor: self.tax_total_minor,
            paid_amount_minor: self.paid_amount_minor,
            pending_amount_minor: self.pending_amount_minor,
            payment_status: self.payment_status,
            is_local: self.is_local,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

/// Repository for purchases.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets a purchase with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        fetch_purchase(&mut conn, id).await
    }

    /// Inserts a purchase and its lines inside `tx`.
    pub(crate) async fn insert_in(tx: &mut Tx<'_>, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            purchase_number = %purchase.purchase_number,
            "Inserting purchase"
        );

        let tax_lines = serde_json::to_string(&purchase.tax_lines)?;

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, purchase_number, sequence, supplier_id, invoice_number, invoice_date,
                invoice_amount_minor, tax_lines, tax_total_minor, paid_amount_minor,
                pending_amount_minor, payment_status, is_local, created_by, created_at,
                updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.purchase_number)
        .bind(purchase.sequence)
        .bind(&purchase.supplier_id)
        .bind(&purchase.invoice_number)
        .bind(&purchase.invoice_date)
        .bind(purchase.invoice_amount_minor)
        .bind(tax_lines)
        .bind(purchase.tax_total_minor)
        .bind(purchase.paid_amount_minor)
        .bind(purchase.pending_amount_minor)
        .bind(purchase.payment_status)
        .bind(purchase.is_local)
        .bind(&purchase.created_by)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .bind(purchase.version)
        .execute(&mut **tx)
        .await?;

        for line in &purchase.lines {
            sqlx::query(
                r#"
                INSERT INTO purchase_lines (
                    id, purchase_id, line_no, item_name, quantity, rate_minor, total_minor
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&line.id)
            .bind(&line.purchase_id)
            .bind(line.line_no)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.rate_minor)
            .bind(line.total_minor)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Writes new payment amounts if the row is still at `expected_version`.
    pub(crate) async fn update_payment_in(
        tx: &mut Tx<'_>,
        id: &str,
        expected_version: i64,
        paid_minor: i64,
        pending_minor: i64,
        status: PaymentStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET paid_amount_minor = ?3,
                pending_amount_minor = ?4,
                payment_status = ?5,
                updated_at = ?6,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(paid_minor)
        .bind(pending_minor)
        .bind(status)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reads a purchase inside `tx`.
    pub(crate) async fn get_in(tx: &mut Tx<'_>, id: &str) -> DbResult<Option<Purchase>> {
        fetch_purchase(&mut **tx, id).await
    }
}

async fn fetch_purchase(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Purchase>> {
    let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1");
    let row = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let lines = fetch_lines(conn, &row.id).await?;
            Ok(Some(row.into_purchase(lines)?))
        }
        None => Ok(None),
    }
}

async fn fetch_lines(conn: &mut SqliteConnection, purchase_id: &str) -> DbResult<Vec<PurchaseLine>> {
    let sql = format!(
        "SELECT {LINE_COLUMNS} FROM purchase_lines WHERE purchase_id = ?1 ORDER BY line_no"
    );
    let lines = sqlx::query_as::<_, PurchaseLine>(&sql)
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}
