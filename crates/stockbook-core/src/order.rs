//! # Orders
//!
//! Kitchen/counter orders that later become bills.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──► Preparing ──► Ready ──► Completed   (converter only)     │
//! │      │            │           │                                         │
//! │      └────────────┴───────────┴─────► Cancelled   (any non-terminal)   │
//! │                                                                         │
//! │   Steps may be skipped forward, never backward.                        │
//! │   Completed and Cancelled stamp completed_by + completed_at.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::bill::SaleLine;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Catalog, CustomerInfo};

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    const fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Preparing => 1,
            OrderStatus::Ready => 2,
            OrderStatus::Completed | OrderStatus::Cancelled => 3,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a manual workflow step may move from `self` to `next`.
    ///
    /// Completed is excluded; only bill conversion reaches it.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            OrderStatus::Completed => false,
            _ => next.rank() > self.rank(),
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// One order line, priced against the catalog when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub line_no: i64,
    pub item_id: String,
    pub catalog: Catalog,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub order_number: i64,
    pub customer: CustomerInfo,
    pub lines: Vec<OrderLine>,
    pub subtotal_minor: i64,
    pub status: OrderStatus,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub completed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The bill produced by conversion.
    pub bill_id: Option<String>,
    pub version: i64,
}

impl Order {
    pub fn subtotal(&self) -> Money {
        Money::from_minor(self.subtotal_minor)
    }

    /// Lines translated into sale requests at their captured prices.
    pub fn to_sale_lines(&self) -> Vec<SaleLine> {
        self.lines
            .iter()
            .map(|l| SaleLine::new(&l.item_id, l.quantity).at_price(l.unit_price_minor))
            .collect()
    }

    pub fn ensure_transition(&self, next: OrderStatus) -> CoreResult<()> {
        if self.status.can_advance_to(next) {
            Ok(())
        } else {
            Err(CoreError::conflict(
                "Order",
                self.order_number.to_string(),
                format!("cannot move from {} to {}", self.status.as_str(), next.as_str()),
            ))
        }
    }

    /// Conversion accepts any non-terminal order.
    pub fn ensure_convertible(&self) -> CoreResult<()> {
        match self.status {
            OrderStatus::Cancelled => Err(CoreError::conflict(
                "Order",
                self.order_number.to_string(),
                "cannot convert a cancelled order",
            )),
            OrderStatus::Completed => Err(CoreError::conflict(
                "Order",
                self.order_number.to_string(),
                "order already has a bill",
            )),
            _ => Ok(()),
        }
    }
}

/// Payload for `create_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub lines: Vec<SaleLine>,
    #[serde(default)]
    pub customer: CustomerInfo,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_workflow() {
        use OrderStatus::*;

        assert!(Pending.can_advance_to(Preparing));
        assert!(Pending.can_advance_to(Ready));
        assert!(Preparing.can_advance_to(Ready));

        assert!(!Ready.can_advance_to(Preparing));
        assert!(!Preparing.can_advance_to(Pending));
        assert!(!Pending.can_advance_to(Pending));
    }

    #[test]
    fn test_completed_only_via_conversion() {
        use OrderStatus::*;

        assert!(!Pending.can_advance_to(Completed));
        assert!(!Ready.can_advance_to(Completed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use OrderStatus::*;

        assert!(Ready.can_advance_to(Cancelled));
        assert!(!Cancelled.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Cancelled));
        assert!(!Cancelled.can_advance_to(Cancelled));
    }
}
