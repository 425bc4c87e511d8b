//! # Order Repository
//!
//! Persistence for orders and order lines.
//!
//! Status writes are compare-and-set: each guarded UPDATE names the status
//! it expects to replace, and reports whether it won.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::order::{Order, OrderLine, OrderStatus};
use stockbook_core::CustomerInfo;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::Tx;

const ORDER_COLUMNS: &str = "id, order_number, customer_name, customer_phone, subtotal_minor, \
     status, created_by, created_at, updated_at, completed_by, completed_at, bill_id, version";

const LINE_COLUMNS: &str = "id, order_id, line_no, item_id, catalog, item_name, quantity, \
     unit_price_minor, line_total_minor";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: i64,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    subtotal_minor: i64,
    status: OrderStatus,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_by: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    bill_id: Option<String>,
    version: i64,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            customer: CustomerInfo {
                name: self.customer_name,
                phone: self.customer_phone,
            },
            lines,
            subtotal_minor: self.subtotal_minor,
            status: self.status,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_by: self.completed_by,
            completed_at: self.completed_at,
            bill_id: self.bill_id,
            version: self.version,
        }
    }
}

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Orders still in the workflow (pending, preparing, ready), oldest first.
    pub async fn list_open(&self) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status IN ('pending', 'preparing', 'ready') ORDER BY order_number"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, &row.id).await?;
            orders.push(row.into_order(lines));
        }
        Ok(orders)
    }

    /// Inserts an order and its lines inside `tx`.
    pub(crate) async fn insert_in(tx: &mut Tx<'_>, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, customer_name, customer_phone, subtotal_minor, status,
                created_by, created_at, updated_at, completed_by, completed_at, bill_id, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, NULL, NULL, 0)
            "#,
        )
        .bind(&order.id)
        .bind(order.order_number)
        .bind(&order.customer.name)
        .bind(&order.customer.phone)
        .bind(order.subtotal_minor)
        .bind(order.status)
        .bind(&order.created_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut **tx)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, line_no, item_id, catalog, item_name, quantity,
                    unit_price_minor, line_total_minor
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&line.id)
            .bind(&line.order_id)
            .bind(line.line_no)
            .bind(&line.item_id)
            .bind(line.catalog)
            .bind(&line.item_name)
            .bind(line.quantity)
            .bind(line.unit_price_minor)
            .bind(line.line_total_minor)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Moves an order from `from` to `to`. False if the status had changed.
    pub(crate) async fn update_status_in(
        tx: &mut Tx<'_>,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?3, updated_at = ?4, version = version + 1
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves a non-terminal order to a terminal status (`Completed` by
    /// conversion, `Cancelled` by hand), stamping who closed it and when.
    ///
    /// False if it is already completed or cancelled, or missing.
    pub(crate) async fn close_in(
        tx: &mut Tx<'_>,
        id: &str,
        closing: OrderStatus,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2, completed_by = ?3, completed_at = ?4,
                updated_at = ?4, version = version + 1
            WHERE id = ?1 AND status NOT IN ('completed', 'cancelled')
            "#,
        )
        .bind(id)
        .bind(closing)
        .bind(actor_id)
        .bind(at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Links the bill produced by conversion.
    pub(crate) async fn set_bill_in(tx: &mut Tx<'_>, id: &str, bill_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE orders SET bill_id = ?2 WHERE id = ?1")
            .bind(id)
            .bind(bill_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Reads an order inside `tx`.
    pub(crate) async fn get_in(tx: &mut Tx<'_>, id: &str) -> DbResult<Option<Order>> {
        fetch_order(&mut **tx, id).await
    }
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let lines = fetch_lines(conn, &row.id).await?;
            Ok(Some(row.into_order(lines)))
        }
        None => Ok(None),
    }
}

async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
    let sql = format!("SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY line_no");
    let lines = sqlx::query_as::<_, OrderLine>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::generate_id;
    use stockbook_core::Catalog;

    fn sample_order(order_number: i64) -> Order {
        let id = generate_id();
        let now = Utc::now();
        Order {
            id: id.clone(),
            order_number,
            customer: CustomerInfo::default(),
            lines: vec![OrderLine {
                id: generate_id(),
                order_id: id,
                line_no: 1,
                item_id: "item-1".to_string(),
                catalog: Catalog::SubItem,
                item_name: "Masala Tea".to_string(),
                quantity: 3,
                unit_price_minor: 2_000,
                line_total_minor: 6_000,
            }],
            subtotal_minor: 6_000,
            status: OrderStatus::Pending,
            created_by: "u-1".to_string(),
            created_at: now,
            updated_at: now,
            completed_by: None,
            completed_at: None,
            bill_id: None,
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_status_updates_are_compare_and_set() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = sample_order(1);

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert_in(&mut tx, &order).await.unwrap();
        assert!(OrderRepository::update_status_in(
            &mut tx,
            &order.id,
            OrderStatus::Pending,
            OrderStatus::Preparing
        )
        .await
        .unwrap());
        // Stale expectation loses
        assert!(!OrderRepository::update_status_in(
            &mut tx,
            &order.id,
            OrderStatus::Pending,
            OrderStatus::Ready
        )
        .await
        .unwrap());
        tx.commit().await.unwrap();

        let fetched = db.order_records().get(&order.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OrderStatus::Preparing);
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_claim_wins_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = sample_order(1);

        let mut tx = db.pool().begin().await.unwrap();
        OrderRepository::insert_in(&mut tx, &order).await.unwrap();
        assert!(OrderRepository::close_in(
            &mut tx,
            &order.id,
            OrderStatus::Completed,
            "u-1",
            Utc::now()
        )
        .await
        .unwrap());
        assert!(!OrderRepository::close_in(
            &mut tx,
            &order.id,
            OrderStatus::Cancelled,
            "u-1",
            Utc::now()
        )
        .await
        .unwrap());
        tx.commit().await.unwrap();

        assert!(db.order_records().list_open().await.unwrap().is_empty());
    }
}
