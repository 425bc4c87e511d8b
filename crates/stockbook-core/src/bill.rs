//! # Bills
//!
//! Sale documents and the requests that create them.
//!
//! ## Bill Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create_sale / convert_order_to_bill                                  │
//! │            │                                                            │
//! │            ▼                                                            │
//! │      ┌───────────┐   cancel_sale    ┌───────────┐                      │
//! │      │ Completed │ ───────────────► │ Cancelled │  (terminal)          │
//! │      └───────────┘                  └───────────┘                      │
//! │                                                                         │
//! │      Returned is terminal as well. Bills are never deleted and their   │
//! │      number is never reused.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Percent};
use crate::types::{Catalog, CustomerInfo, PaymentInfo, PaymentMode, PaymentPart};

// =============================================================================
// Bill Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Completed,
    Cancelled,
    Returned,
}

impl BillStatus {
    #[inline]
    pub const fn can_cancel(&self) -> bool {
        matches!(self, BillStatus::Completed)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Completed => "completed",
            BillStatus::Cancelled => "cancelled",
            BillStatus::Returned => "returned",
        }
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Bill-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Percentage of the subtotal.
    Percent(Percent),
    /// Flat amount in minor units; may not exceed the subtotal.
    Amount(i64),
}

/// Discount and tax applied on top of the line totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pricing {
    #[serde(default)]
    pub discount: Discount,
    /// Applied to the discounted subtotal.
    #[serde(default)]
    pub tax_rate: Percent,
}

impl Pricing {
    pub fn with_discount_percent(discount: Percent) -> Self {
        Pricing {
            discount: if discount.is_zero() {
                Discount::None
            } else {
                Discount::Percent(discount)
            },
            tax_rate: Percent::zero(),
        }
    }
}

/// Derived bill amounts. Always produced by
/// [`compute_bill_totals`](crate::totals::compute_bill_totals), never taken
/// from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillTotals {
    pub subtotal_minor: i64,
    pub discount_minor: i64,
    pub tax_minor: i64,
    /// `grand_total - (subtotal - discount + tax)`; may be negative.
    pub round_off_minor: i64,
    pub grand_total_minor: i64,
}

impl BillTotals {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_minor(self.grand_total_minor)
    }

    /// Total before rounding to a whole currency unit.
    #[inline]
    pub fn pre_round_minor(&self) -> i64 {
        self.subtotal_minor - self.discount_minor + self.tax_minor
    }
}

// =============================================================================
// Bill
// =============================================================================

/// One line of a bill with the prices captured at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BillLine {
    pub id: String,
    pub bill_id: String,
    pub line_no: i64,
    pub item_id: String,
    pub catalog: Catalog,
    pub item_name: String,
    pub unit: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
    /// Item cost when the bill was created; later cost edits do not touch it.
    pub cost_price_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Bill {
    pub id: String,
    pub bill_number: i64,
    /// Set when the bill was produced from an order.
    pub order_id: Option<String>,
    pub customer: CustomerInfo,
    pub lines: Vec<BillLine>,
    pub totals: BillTotals,
    pub payment_mode: PaymentMode,
    pub payment_parts: Vec<PaymentPart>,
    pub status: BillStatus,
    pub is_printed: bool,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Bill {
    /// Rejects cancellation unless the bill is still Completed.
    pub fn ensure_cancellable(&self) -> CoreResult<()> {
        if self.status.can_cancel() {
            Ok(())
        } else {
            Err(CoreError::conflict(
                "Bill",
                self.bill_number.to_string(),
                format!("cannot cancel a {} bill", self.status.as_str()),
            ))
        }
    }
}

// =============================================================================
// Sale Requests
// =============================================================================

/// A requested sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub item_id: String,
    pub quantity: i64,
    /// Overrides the catalog price; `None` uses the live price.
    #[serde(default)]
    pub unit_price_minor: Option<i64>,
}

impl SaleLine {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            item_id: item_id.into(),
            quantity,
            unit_price_minor: None,
        }
    }

    pub fn at_price(mut self, unit_price_minor: i64) -> Self {
        self.unit_price_minor = Some(unit_price_minor);
        self
    }
}

/// Payload for `create_sale`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub lines: Vec<SaleLine>,
    #[serde(default)]
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub pricing: Pricing,
}

impl NewSale {
    pub fn cash(lines: Vec<SaleLine>) -> Self {
        NewSale {
            lines,
            customer: CustomerInfo::default(),
            payment: PaymentInfo::single(PaymentMode::Cash),
            pricing: Pricing::default(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
