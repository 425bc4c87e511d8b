//! # Stock Ledger
//!
//! Types and pure rules for the append-only stock ledger.
//!
//! ## Reconciliation Property
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  seq  kind        qty   balance                                        │
//! │  ───  ──────────  ────  ───────                                        │
//! │  1    adjustment  +10   10        opening stock                        │
//! │  2    sale         -8    2        bill #1                              │
//! │  3    return       +8   10        bill #1 cancelled                    │
//! │                                                                         │
//! │  Σ qty from zero = 10 = item.stock = last balance                      │
//! │                                                                         │
//! │  Rows are never edited or deleted. Corrections are new rows.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Catalog;

// =============================================================================
// Ledger Kind
// =============================================================================

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Purchase,
    Sale,
    Adjustment,
    Return,
}

/// What kind of document a ledger row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Bill,
    Purchase,
    Manual,
}

// =============================================================================
// Stock Delta (request)
// =============================================================================

/// A requested stock mutation, handed to the ledger appender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDelta {
    /// Signed quantity; negative is outflow.
    pub quantity: i64,
    pub kind: LedgerKind,
    /// Unit rate recorded on the ledger row.
    pub rate_minor: i64,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    /// Human-readable reference such as `BILL-12`.
    pub reference_code: String,
    pub note: Option<String>,
}

impl StockDelta {
    pub fn sale(quantity: i64, rate_minor: i64, bill_id: &str, bill_number: i64) -> Self {
        StockDelta {
            quantity: -quantity,
            kind: LedgerKind::Sale,
            rate_minor,
            reference_type: ReferenceType::Bill,
            reference_id: Some(bill_id.to_string()),
            reference_code: bill_code(bill_number),
            note: None,
        }
    }

    pub fn sale_reversal(quantity: i64, rate_minor: i64, bill_id: &str, bill_number: i64) -> Self {
        StockDelta {
            quantity,
            kind: LedgerKind::Return,
            rate_minor,
            reference_type: ReferenceType::Bill,
            reference_id: Some(bill_id.to_string()),
            reference_code: format!("{}-CANCEL", bill_code(bill_number)),
            note: Some("Bill cancelled".to_string()),
        }
    }

    pub fn purchase(
        quantity: i64,
        rate_minor: i64,
        purchase_id: Option<&str>,
        reference_code: impl Into<String>,
    ) -> Self {
        StockDelta {
            quantity,
            kind: LedgerKind::Purchase,
            rate_minor,
            reference_type: ReferenceType::Purchase,
            reference_id: purchase_id.map(str::to_string),
            reference_code: reference_code.into(),
            note: None,
        }
    }

    pub fn adjustment(quantity: i64, rate_minor: i64, note: Option<String>) -> Self {
        StockDelta {
            quantity,
            kind: LedgerKind::Adjustment,
            rate_minor,
            reference_type: ReferenceType::Manual,
            reference_id: None,
            reference_code: ADJUSTMENT_CODE.to_string(),
            note,
        }
    }

    pub fn opening(quantity: i64, rate_minor: i64) -> Self {
        StockDelta {
            reference_code: OPENING_CODE.to_string(),
            note: Some("Opening stock".to_string()),
            ..StockDelta::adjustment(quantity, rate_minor, None)
        }
    }
}

pub const ADJUSTMENT_CODE: &str = "ADJ";
pub const OPENING_CODE: &str = "OPENING";

/// Reference code for a bill number.
pub fn bill_code(bill_number: i64) -> String {
    format!("BILL-{bill_number}")
}

/// Computes the post-mutation balance, rejecting negative results.
pub fn apply_delta(item: &str, current: i64, delta: i64) -> CoreResult<i64> {
    let next = current + delta;
    if next < 0 {
        return Err(CoreError::StockViolation {
            item: item.to_string(),
            current,
            delta,
        });
    }
    Ok(next)
}

// =============================================================================
// Adjustment Target
// =============================================================================

/// A manual correction: either a relative change or an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "quantity", rename_all = "snake_case")]
pub enum AdjustmentTarget {
    Delta(i64),
    /// Physical count; the recorded delta is `target - current`.
    SetTo(i64),
}

impl AdjustmentTarget {
    /// Signed delta to record given the current tracked quantity.
    pub fn delta_from(&self, current: i64) -> CoreResult<i64> {
        match *self {
            AdjustmentTarget::Delta(delta) => Ok(delta),
            AdjustmentTarget::SetTo(target) if target < 0 => {
                Err(ValidationError::OutOfRange {
                    field: "stock count".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into())
            }
            AdjustmentTarget::SetTo(target) => Ok(target - current),
        }
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One immutable row of the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    /// Store-assigned, strictly increasing across the whole ledger.
    pub seq: i64,
    pub item_id: String,
    pub catalog: Catalog,
    pub kind: LedgerKind,
    pub quantity: i64,
    pub rate_minor: i64,
    /// Item stock immediately after this row was applied.
    pub balance_qty: i64,
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
    pub reference_code: String,
    pub actor_id: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Replays signed quantities from zero.
pub fn replay(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.quantity).sum()
}

/// Checks that each row's balance equals the running sum up to that row.
pub fn balances_are_consistent(entries: &[LedgerEntry]) -> bool {
    let mut running = 0;
    entries.iter().all(|e| {
        running += e.quantity;
        running == e.balance_qty
    })
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Comparison of an item's stock field against its ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Reconciliation {
    pub item_id: String,
    pub catalog: Catalog,
    pub stock: i64,
    pub ledger_sum: i64,
    pub last_balance: Option<i64>,
    pub entry_count: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stock == self.ledger_sum && self.last_balance.unwrap_or(0) == self.stock
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: i64, quantity: i64, balance_qty: i64) -> LedgerEntry {
        LedgerEntry {
            id: format!("entry-{seq}"),
            seq,
            item_id: "item-a".to_string(),
            catalog: Catalog::Product,
            kind: LedgerKind::Adjustment,
            quantity,
            rate_minor: 0,
            balance_qty,
            reference_type: ReferenceType::Manual,
            reference_id: None,
            reference_code: ADJUSTMENT_CODE.to_string(),
            actor_id: "u1".to_string(),
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_delta_rejects_negative() {
        assert_eq!(apply_delta("A", 10, -8).unwrap(), 2);
        assert_eq!(apply_delta("A", 2, -2).unwrap(), 0);
        assert!(matches!(
            apply_delta("A", 2, -5),
            Err(CoreError::StockViolation { current: 2, delta: -5, .. })
        ));
    }

    #[test]
    fn test_sale_delta_is_outflow() {
        let delta = StockDelta::sale(8, 2000, "bill-id", 1);
        assert_eq!(delta.quantity, -8);
        assert_eq!(delta.kind, LedgerKind::Sale);
        assert_eq!(delta.reference_code, "BILL-1");

        let reversal = StockDelta::sale_reversal(8, 2000, "bill-id", 1);
        assert_eq!(reversal.quantity, 8);
        assert_eq!(reversal.kind, LedgerKind::Return);
        assert_eq!(reversal.reference_code, "BILL-1-CANCEL");
    }

    #[test]
    fn test_adjustment_target() {
        assert_eq!(AdjustmentTarget::Delta(-3).delta_from(10).unwrap(), -3);
        assert_eq!(AdjustmentTarget::SetTo(4).delta_from(10).unwrap(), -6);
        assert_eq!(AdjustmentTarget::SetTo(12).delta_from(10).unwrap(), 2);
        assert!(AdjustmentTarget::SetTo(-1).delta_from(10).is_err());
    }

    #[test]
    fn test_replay_and_balances() {
        let entries = vec![entry(1, 10, 10), entry(2, -8, 2), entry(3, 8, 10)];
        assert_eq!(replay(&entries), 10);
        assert!(balances_are_consistent(&entries));

        let broken = vec![entry(1, 10, 10), entry(2, -8, 3)];
        assert!(!balances_are_consistent(&broken));
    }

    #[test]
    fn test_reconciliation_consistency() {
        let ok = Reconciliation {
            item_id: "a".to_string(),
            catalog: Catalog::Product,
            stock: 10,
            ledger_sum: 10,
            last_balance: Some(10),
            entry_count: 3,
        };
        assert!(ok.is_consistent());

        let drifted = Reconciliation { stock: 9, ..ok.clone() };
        assert!(!drifted.is_consistent());

        let empty = Reconciliation {
            stock: 0,
            ledger_sum: 0,
            last_balance: None,
            entry_count: 0,
            ..ok
        };
        assert!(empty.is_consistent());
    }
}
