//! # Catalog Items
//!
//! The stock-relevant view of a catalog entry.
//!
//! ## Tri-State Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock column        StockLevel              Behaviour                 │
//! │  ────────────        ──────────              ─────────                 │
//! │  NULL                Untracked               never validated,          │
//! │                                              never decremented,        │
//! │                                              no ledger rows            │
//! │  0                   Tracked(0)              every sale rejected       │
//! │  7                   Tracked(7)              sales up to 7 accepted    │
//! │                                                                         │
//! │  Untracked is NOT zero. Collapsing the two is a bug.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Catalog;

// =============================================================================
// Stock Level
// =============================================================================

/// Result of asking the store how much of an item is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum StockLevel {
    Tracked(i64),
    Untracked,
}

impl StockLevel {
    #[inline]
    pub fn from_column(stock: Option<i64>) -> Self {
        match stock {
            Some(qty) => StockLevel::Tracked(qty),
            None => StockLevel::Untracked,
        }
    }

    /// The tracked quantity, or `None` for untracked items.
    #[inline]
    pub const fn quantity(&self) -> Option<i64> {
        match self {
            StockLevel::Tracked(qty) => Some(*qty),
            StockLevel::Untracked => None,
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// A sellable catalog entry (sub-item or product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: String,
    pub catalog: Catalog,
    pub name: String,
    /// Unit of measure ("pcs", "cup", "kg").
    pub unit: String,
    pub category: Option<String>,
    pub price_minor: i64,
    pub cost_minor: i64,
    /// `None` disables stock tracking for this item.
    pub stock: Option<i64>,
    /// Only meaningful when `stock` is present.
    pub low_stock_threshold: Option<i64>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Bumped on every stock write.
    pub version: i64,
}

impl Item {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_minor(self.cost_minor)
    }

    #[inline]
    pub fn stock_level(&self) -> StockLevel {
        StockLevel::from_column(self.stock)
    }

    /// True when tracked, a threshold is set, and stock is at or below it.
    pub fn is_low_stock(&self) -> bool {
        match (self.stock, self.low_stock_threshold) {
            (Some(stock), Some(threshold)) => stock <= threshold,
            _ => false,
        }
    }

    /// Checks that `requested` units can be taken from this item.
    ///
    /// Untracked items always pass.
    pub fn ensure_available(&self, requested: i64) -> CoreResult<()> {
        ensure_available(&self.name, self.stock_level(), requested)
    }
}

/// Availability rule shared by sales, orders and conversions.
pub fn ensure_available(name: &str, level: StockLevel, requested: i64) -> CoreResult<()> {
    match level {
        StockLevel::Untracked => Ok(()),
        StockLevel::Tracked(available) if requested <= available => Ok(()),
        StockLevel::Tracked(available) => Err(CoreError::InsufficientStock {
            item: name.to_string(),
            available,
            requested,
        }),
    }
}

// =============================================================================
// New Item
// =============================================================================

/// Payload for inserting a catalog entry.
///
/// A positive opening `stock` is recorded as an opening adjustment in the
/// ledger so the item reconciles from its first row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewItem {
    pub catalog: Catalog,
    pub name: String,
    pub unit: String,
    pub category: Option<String>,
    pub price_minor: i64,
    pub cost_minor: i64,
    pub stock: Option<i64>,
    pub low_stock_threshold: Option<i64>,
}

impl NewItem {
    /// A tracked item with the given opening quantity.
    pub fn tracked(catalog: Catalog, name: impl Into<String>, price_minor: i64, stock: i64) -> Self {
        NewItem {
            catalog,
            name: name.into(),
            unit: "pcs".to_string(),
            category: None,
            price_minor,
            cost_minor: 0,
            stock: Some(stock),
            low_stock_threshold: None,
        }
    }

    /// An item with stock tracking disabled.
    pub fn untracked(catalog: Catalog, name: impl Into<String>, price_minor: i64) -> Self {
        NewItem {
            stock: None,
            ..NewItem::tracked(catalog, name, price_minor, 0)
        }
    }

    pub fn with_cost(mut self, cost_minor: i64) -> Self {
        self.cost_minor = cost_minor;
        self
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
