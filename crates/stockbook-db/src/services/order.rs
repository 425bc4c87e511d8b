//! # Order Service
//!
//! Order workflow and the order-to-bill converter.
//!
//! ## Order Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pending ──► Preparing ──► Ready                                       │
//! │     │            │           │                                          │
//! │     │            │           └──── convert_order_to_bill ──► Completed │
//! │     │            └──────────────── convert_order_to_bill ──► Completed │
//! │     └───────────────────────────── convert_order_to_bill ──► Completed │
//! │                                                                         │
//! │  any non-terminal ── cancel_order ──► Cancelled                        │
//! │                                                                         │
//! │  Orders hold stock only as a check: nothing is decremented until the   │
//! │  order becomes a bill.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conversion
//! The order is claimed with a guarded `UPDATE … WHERE status NOT IN
//! ('completed', 'cancelled')` as the first write. The bill is then written
//! through the same path as a direct sale, so stock is validated a second
//! time against current quantities, not the ones seen when the order was
//! placed.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::bill::{Bill, Pricing};
use stockbook_core::order::{NewOrder, Order, OrderLine, OrderStatus};
use stockbook_core::validation::{validate_lines, validate_percent, validate_price, validate_quantity};
use stockbook_core::{Actor, CoreError, DocumentType, Money, PaymentInfo, Percent};
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::repository::item::ItemRepository;
use crate::repository::order::OrderRepository;
use crate::repository::sequence::SequenceRepository;
use crate::repository::{generate_id, Tx};
use crate::services::sale::{prepare_sale, write_bill_in};

/// Order orchestrator.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: SqlitePool,
}

impl OrderService {
    /// Creates a new OrderService.
    pub fn new(pool: SqlitePool) -> Self {
        OrderService { pool }
    }

    /// Gets an order with its lines.
    pub async fn get(&self, order_id: &str) -> EngineResult<Order> {
        OrderRepository::new(self.pool.clone())
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id).into())
    }

    /// Places an order at live catalog prices.
    ///
    /// Tracked stock is checked but not reserved.
    pub async fn create_order(&self, new: NewOrder, actor: &Actor) -> EngineResult<Order> {
        validate_lines(&new.lines)?;

        let items = ItemRepository::new(self.pool.clone());
        let order_id = generate_id();
        let mut lines = Vec::with_capacity(new.lines.len());
        let mut requested: HashMap<String, i64> = HashMap::new();

        for (line, line_no) in new.lines.iter().zip(1..) {
            validate_quantity(line.quantity)?;
            let item = items.require(&line.item_id).await?;

            let unit_price_minor = line.unit_price_minor.unwrap_or(item.price_minor);
            validate_price("unit price", unit_price_minor)?;

            let wanted = requested.entry(item.id.clone()).or_insert(0);
            *wanted += line.quantity;
            item.ensure_available(*wanted)?;

            lines.push(OrderLine {
                id: generate_id(),
                order_id: order_id.clone(),
                line_no,
                item_id: item.id,
                catalog: item.catalog,
                item_name: item.name,
                quantity: line.quantity,
                unit_price_minor,
                line_total_minor: Money::from_minor(unit_price_minor).times(line.quantity).minor(),
            });
        }

        let subtotal: Money = lines.iter().map(|l| Money::from_minor(l.line_total_minor)).sum();

        let mut tx = self.pool.begin().await?;
        let order_number = SequenceRepository::next_in(&mut tx, DocumentType::Order).await?;
        let now = Utc::now();
        let order = Order {
            id: order_id,
            order_number,
            customer: new.customer,
            lines,
            subtotal_minor: subtotal.minor(),
            status: OrderStatus::Pending,
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
            completed_by: None,
            completed_at: None,
            bill_id: None,
            version: 0,
        };
        OrderRepository::insert_in(&mut tx, &order).await?;
        tx.commit().await?;

        info!(order_number, subtotal = order.subtotal_minor, actor = %actor.id, "Order created");
        Ok(order)
    }

    /// Moves an order forward in the workflow.
    ///
    /// `Cancelled` is delegated to [`cancel_order`](Self::cancel_order).
    /// `Completed` is rejected; only conversion reaches it.
    pub async fn advance_order(
        &self,
        order_id: &str,
        next: OrderStatus,
        actor: &Actor,
    ) -> EngineResult<Order> {
        if next == OrderStatus::Cancelled {
            return self.cancel_order(order_id, actor).await;
        }

        let order = self.get(order_id).await?;
        order.ensure_transition(next)?;

        let mut tx = self.pool.begin().await?;
        if !OrderRepository::update_status_in(&mut tx, order_id, order.status, next).await? {
            return Err(CoreError::conflict(
                "Order",
                order.order_number.to_string(),
                "status changed concurrently",
            )
            .into());
        }
        let order = Self::reload_in(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_number = order.order_number, status = next.as_str(), "Order advanced");
        Ok(order)
    }

    /// Cancels a non-terminal order. No stock moves.
    pub async fn cancel_order(&self, order_id: &str, actor: &Actor) -> EngineResult<Order> {
        let mut tx = self.pool.begin().await?;

        let closed = OrderRepository::close_in(
            &mut tx,
            order_id,
            OrderStatus::Cancelled,
            &actor.id,
            Utc::now(),
        )
        .await?;
        let order = Self::reload_in(&mut tx, order_id).await?;

        if !closed {
            warn!(order_number = order.order_number, status = order.status.as_str(), "Cancel rejected");
            return Err(CoreError::conflict(
                "Order",
                order.order_number.to_string(),
                format!("cannot cancel a {} order", order.status.as_str()),
            )
            .into());
        }

        tx.commit().await?;

        info!(order_number = order.order_number, actor = %actor.id, "Order cancelled");
        Ok(order)
    }

    /// Turns an order into a Completed bill at the order's captured prices.
    ///
    /// ## Steps (one transaction)
    /// 1. Claim the order (first write, guarded on non-terminal status)
    /// 2. Allocate a bill number and write the bill
    /// 3. Decrement tracked stock through the ledger appender
    /// 4. Link the bill to the order
    ///
    /// Insufficient stock at conversion time rejects the whole operation and
    /// leaves the order as it was.
    pub async fn convert_order_to_bill(
        &self,
        order_id: &str,
        payment: PaymentInfo,
        discount: Percent,
        actor: &Actor,
    ) -> EngineResult<Bill> {
        validate_percent("discount", discount)?;

        let order = self.get(order_id).await?;
        order.ensure_convertible()?;

        let items = ItemRepository::new(self.pool.clone());
        let pricing = Pricing::with_discount_percent(discount);
        let prepared = prepare_sale(&items, &order.to_sale_lines(), &pricing, &payment).await?;

        let mut tx = self.pool.begin().await?;

        let claimed = OrderRepository::close_in(
            &mut tx,
            order_id,
            OrderStatus::Completed,
            &actor.id,
            Utc::now(),
        )
        .await?;
        if !claimed {
            let current = Self::reload_in(&mut tx, order_id).await?;
            warn!(order_number = current.order_number, status = current.status.as_str(), "Conversion rejected");
            current.ensure_convertible()?;
            return Err(CoreError::conflict(
                "Order",
                current.order_number.to_string(),
                "status changed during conversion",
            )
            .into());
        }

        let bill = write_bill_in(&mut tx, &prepared, order.customer.clone(), Some(order_id), actor)
            .await?;
        OrderRepository::set_bill_in(&mut tx, order_id, &bill.id).await?;

        tx.commit().await?;

        info!(
            order_number = order.order_number,
            bill_number = bill.bill_number,
            grand_total = bill.totals.grand_total_minor,
            actor = %actor.id,
            "Order converted to bill"
        );
        Ok(bill)
    }

    async fn reload_in(tx: &mut Tx<'_>, order_id: &str) -> EngineResult<Order> {
        OrderRepository::get_in(tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
