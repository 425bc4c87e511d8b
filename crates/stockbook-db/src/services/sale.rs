//! # Sale Service
//!
//! Creates and cancels bills together with their stock movements.
//!
//! ## Create Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(NewSale, actor)                                           │
//! │       │                                                                 │
//! │       ▼  pool reads, nothing written yet                               │
//! │  prepare_sale: validate lines ─► resolve items ─► Σ qty per item       │
//! │               ─► stock check ─► totals ─► payment breakdown            │
//! │       │                                                                 │
//! │       ▼  BEGIN                                                          │
//! │  next bill number (counter upsert, takes the write lock)               │
//! │  INSERT bill + lines                                                   │
//! │  for each tracked line: LedgerAppender::apply_in(Sale, -qty)           │
//! │       │                                                                 │
//! │       ▼  COMMIT  (any failure above rolls back everything)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stock check in `prepare_sale` fails fast with the available
//! quantity. The guarded update in the appender re-checks atomically, so a
//! sale that raced another writer still cannot drive stock negative.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::bill::{Bill, BillLine, BillStatus, BillTotals, NewSale, Pricing, SaleLine};
use stockbook_core::item::Item;
use stockbook_core::ledger::StockDelta;
use stockbook_core::totals::compute_bill_totals;
use stockbook_core::validation::{validate_lines, validate_payment, validate_price, validate_quantity};
use stockbook_core::{
    Actor, CoreError, CustomerInfo, DocumentType, Money, PaymentInfo, PaymentMode, PaymentPart,
};
use tracing::{info, warn};

use crate::appender::LedgerAppender;
use crate::error::EngineResult;
use crate::repository::bill::BillRepository;
use crate::repository::item::ItemRepository;
use crate::repository::sequence::SequenceRepository;
use crate::repository::{generate_id, Tx};

// =============================================================================
// Prepared Sale
// =============================================================================

/// A sale line with its item resolved and its price fixed.
#[derive(Debug, Clone)]
pub(crate) struct PreparedLine {
    pub item: Item,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub line_total: Money,
}

/// Everything needed to write a bill, computed before the transaction.
#[derive(Debug, Clone)]
pub(crate) struct PreparedSale {
    pub lines: Vec<PreparedLine>,
    pub totals: BillTotals,
    pub payment_mode: PaymentMode,
    pub payment_parts: Vec<PaymentPart>,
}

/// Validates a sale request against the live catalog.
///
/// Quantities for the same item on several lines are summed before the
/// stock check, so two lines of 3 against a stock of 5 are rejected.
pub(crate) async fn prepare_sale(
    items: &ItemRepository,
    lines: &[SaleLine],
    pricing: &Pricing,
    payment: &PaymentInfo,
) -> EngineResult<PreparedSale> {
    validate_lines(lines)?;

    let mut prepared = Vec::with_capacity(lines.len());
    let mut requested: HashMap<String, i64> = HashMap::new();

    for line in lines {
        validate_quantity(line.quantity)?;
        let item = items.require(&line.item_id).await?;

        let unit_price_minor = line.unit_price_minor.unwrap_or(item.price_minor);
        validate_price("unit price", unit_price_minor)?;

        *requested.entry(item.id.clone()).or_insert(0) += line.quantity;
        prepared.push(PreparedLine {
            line_total: Money::from_minor(unit_price_minor).times(line.quantity),
            item,
            quantity: line.quantity,
            unit_price_minor,
        });
    }

    for line in &prepared {
        if let Some(total) = requested.remove(&line.item.id) {
            if let Err(err) = line.item.ensure_available(total) {
                warn!(item_id = %line.item.id, requested = total, "Sale rejected: {err}");
                return Err(err.into());
            }
        }
    }

    let totals = compute_bill_totals(prepared.iter().map(|l| l.line_total), pricing)?;
    let payment_parts = validate_payment(payment, totals.grand_total_minor)?;

    Ok(PreparedSale {
        lines: prepared,
        totals,
        payment_mode: payment.mode,
        payment_parts,
    })
}

/// Writes a prepared bill and its stock movements inside `tx`.
///
/// Allocating the bill number is the first write, so the number is only
/// consumed if the whole transaction commits.
pub(crate) async fn write_bill_in(
    tx: &mut Tx<'_>,
    prepared: &PreparedSale,
    customer: CustomerInfo,
    order_id: Option<&str>,
    actor: &Actor,
) -> EngineResult<Bill> {
    let bill_number = SequenceRepository::next_in(tx, DocumentType::Bill).await?;
    let bill_id = generate_id();

    let lines = prepared
        .lines
        .iter()
        .zip(1..)
        .map(|(line, line_no)| BillLine {
            id: generate_id(),
            bill_id: bill_id.clone(),
            line_no,
            item_id: line.item.id.clone(),
            catalog: line.item.catalog,
            item_name: line.item.name.clone(),
            unit: line.item.unit.clone(),
            quantity: line.quantity,
            unit_price_minor: line.unit_price_minor,
            line_total_minor: line.line_total.minor(),
            cost_price_minor: line.item.cost_minor,
        })
        .collect();

    let bill = Bill {
        id: bill_id,
        bill_number,
        order_id: order_id.map(str::to_string),
        customer,
        lines,
        totals: prepared.totals,
        payment_mode: prepared.payment_mode,
        payment_parts: prepared.payment_parts.clone(),
        status: BillStatus::Completed,
        is_printed: false,
        created_by: actor.id.clone(),
        created_at: Utc::now(),
        cancelled_by: None,
        cancelled_at: None,
    };

    BillRepository::insert_in(tx, &bill).await?;

    for line in &bill.lines {
        let delta = StockDelta::sale(line.quantity, line.unit_price_minor, &bill.id, bill_number);
        LedgerAppender::apply_in(tx, line.catalog, &line.item_id, &delta, actor, None).await?;
    }

    Ok(bill)
}

// =============================================================================
// Sale Service
// =============================================================================

/// Sale transaction orchestrator.
#[derive(Debug, Clone)]
pub struct SaleService {
    pool: SqlitePool,
}

impl SaleService {
    /// Creates a new SaleService.
    pub fn new(pool: SqlitePool) -> Self {
        SaleService { pool }
    }

    /// Records a sale as a Completed bill and decrements tracked stock.
    ///
    /// All-or-nothing: if any line fails, no bill, no number and no stock
    /// change survive.
    pub async fn create_sale(&self, sale: NewSale, actor: &Actor) -> EngineResult<Bill> {
        let items = ItemRepository::new(self.pool.clone());
        let prepared = prepare_sale(&items, &sale.lines, &sale.pricing, &sale.payment).await?;

        let mut tx = self.pool.begin().await?;
        let bill = write_bill_in(&mut tx, &prepared, sale.customer, None, actor).await?;
        tx.commit().await?;

        info!(
            bill_number = bill.bill_number,
            grand_total = bill.totals.grand_total_minor,
            lines = bill.lines.len(),
            actor = %actor.id,
            "Bill created"
        );
        Ok(bill)
    }

    /// Cancels a Completed bill and returns its quantities to stock.
    ///
    /// Missing and already-cancelled bills are rejected before any write.
    /// The status flip is the first write and is guarded on `completed`,
    /// so of two concurrent cancels exactly one restores stock.
    pub async fn cancel_sale(&self, bill_id: &str, actor: &Actor) -> EngineResult<Bill> {
        let current = BillRepository::new(self.pool.clone())
            .get_by_id(bill_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Bill", bill_id))?;
        if let Err(e) = current.ensure_cancellable() {
            warn!(bill_number = current.bill_number, status = current.status.as_str(), "Cancel rejected");
            return Err(e.into());
        }

        let mut tx = self.pool.begin().await?;

        let cancelled = BillRepository::mark_cancelled_in(&mut tx, bill_id, &actor.id, Utc::now())
            .await?;
        let bill = BillRepository::get_in(&mut tx, bill_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Bill", bill_id))?;

        if !cancelled {
            warn!(bill_number = bill.bill_number, status = bill.status.as_str(), "Cancel lost race");
            bill.ensure_cancellable()?;
            return Err(CoreError::conflict(
                "Bill",
                bill.bill_number.to_string(),
                "status changed during cancel",
            )
            .into());
        }

        for line in &bill.lines {
            let delta = StockDelta::sale_reversal(
                line.quantity,
                line.unit_price_minor,
                &bill.id,
                bill.bill_number,
            );
            LedgerAppender::apply_in(&mut tx, line.catalog, &line.item_id, &delta, actor, None)
                .await?;
        }

        tx.commit().await?;

        info!(bill_number = bill.bill_number, actor = %actor.id, "Bill cancelled");
        Ok(bill)
    }

    /// Sets the printed flag on a bill.
    pub async fn mark_printed(&self, bill_id: &str) -> EngineResult<()> {
        BillRepository::new(self.pool.clone()).mark_printed(bill_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
