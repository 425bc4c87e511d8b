//! # Purchases & Suppliers
//!
//! Incoming goods and the supplier balances they drive.
//!
//! ## Payment Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  due = invoice + tax                                                   │
//! │                                                                         │
//! │  paid == 0            → Pending                                        │
//! │  0 < paid < due       → Partial                                        │
//! │  paid >= due          → Paid                                           │
//! │                                                                         │
//! │  pending = max(due - paid, 0), recomputed on every save by [`settle`]. │
//! │  The supplier's pending total moves by exactly the change in pending.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Percent};

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub const fn from_amounts(paid_minor: i64, due_minor: i64) -> Self {
        if paid_minor >= due_minor {
            PaymentStatus::Paid
        } else if paid_minor <= 0 {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Partial
        }
    }
}

/// Derived amounts for a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub pending_minor: i64,
    pub status: PaymentStatus,
}

/// Recomputes pending amount and status from the amount due and the paid
/// amount.
///
/// Paying at or above the amount due settles the purchase with nothing
/// pending. Negative amounts are rejected.
pub fn settle(due_minor: i64, paid_minor: i64) -> CoreResult<Settlement> {
    if due_minor < 0 {
        return Err(ValidationError::OutOfRange {
            field: "amount due".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }
    if paid_minor < 0 {
        return Err(ValidationError::OutOfRange {
            field: "paid amount".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }
    Ok(Settlement {
        pending_minor: due_minor.saturating_sub(paid_minor).max(0),
        status: PaymentStatus::from_amounts(paid_minor, due_minor),
    })
}

// =============================================================================
// Tax
// =============================================================================

/// A named tax component requested for a purchase ("CGST", "SGST").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRateSpec {
    pub name: String,
    pub rate: Percent,
}

/// A computed tax component stored on the purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxLine {
    pub name: String,
    pub rate_bps: u32,
    pub amount_minor: i64,
}

/// Tax components on the invoice amount. Local purchases carry none.
pub fn compute_tax_lines(invoice: Money, rates: &[TaxRateSpec], is_local: bool) -> Vec<TaxLine> {
    if is_local {
        return Vec::new();
    }
    rates
        .iter()
        .map(|spec| TaxLine {
            name: spec.name.clone(),
            rate_bps: spec.rate.bps(),
            amount_minor: invoice.percent(spec.rate).minor(),
        })
        .collect()
}

// =============================================================================
// Numbering
// =============================================================================

/// Formats a purchase sequence value, e.g. `PUR-0003`.
///
/// ```rust
/// use stockbook_core::purchase::format_purchase_number;
///
/// assert_eq!(format_purchase_number("PUR-", 4, 3), "PUR-0003");
/// assert_eq!(format_purchase_number("PUR-", 4, 12345), "PUR-12345");
/// ```
pub fn format_purchase_number(prefix: &str, width: usize, sequence: i64) -> String {
    format!("{prefix}{sequence:0width$}")
}

// =============================================================================
// Purchase
// =============================================================================

/// A free-text purchase line. Not linked to a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseLine {
    pub id: String,
    pub purchase_id: String,
    pub line_no: i64,
    pub item_name: String,
    pub quantity: i64,
    pub rate_minor: i64,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    /// Formatted number, e.g. `PUR-0003`.
    pub purchase_number: String,
    pub sequence: i64,
    pub supplier_id: String,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub invoice_amount_minor: i64,
    pub tax_lines: Vec<TaxLine>,
    pub tax_total_minor: i64,
    pub paid_amount_minor: i64,
    pub pending_amount_minor: i64,
    pub payment_status: PaymentStatus,
    pub is_local: bool,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Purchase {
    /// Amount due to the supplier: invoice plus tax.
    pub fn gross_minor(&self) -> i64 {
        self.invoice_amount_minor + self.tax_total_minor
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseLine {
    pub item_name: String,
    pub quantity: i64,
    pub rate_minor: i64,
}

impl NewPurchaseLine {
    pub fn new(item_name: impl Into<String>, quantity: i64, rate_minor: i64) -> Self {
        NewPurchaseLine {
            item_name: item_name.into(),
            quantity,
            rate_minor,
        }
    }

    pub fn total(&self) -> Money {
        Money::from_minor(self.rate_minor).times(self.quantity)
    }
}

/// Payload for `create_purchase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchase {
    pub supplier_id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    pub lines: Vec<NewPurchaseLine>,
    /// Defaults to the sum of line totals.
    #[serde(default)]
    pub invoice_amount_minor: Option<i64>,
    #[serde(default)]
    pub paid_amount_minor: i64,
    #[serde(default)]
    pub tax_rates: Vec<TaxRateSpec>,
    #[serde(default)]
    pub is_local: bool,
}

impl NewPurchase {
    pub fn new(supplier_id: impl Into<String>, lines: Vec<NewPurchaseLine>) -> Self {
        NewPurchase {
            supplier_id: supplier_id.into(),
            invoice_number: None,
            invoice_date: None,
            lines,
            invoice_amount_minor: None,
            paid_amount_minor: 0,
            tax_rates: Vec::new(),
            is_local: true,
        }
    }

    /// Supplied invoice amount or the sum of line totals.
    pub fn effective_invoice(&self) -> Money {
        match self.invoice_amount_minor {
            Some(amount) => Money::from_minor(amount),
            None => self.lines.iter().map(NewPurchaseLine::total).sum(),
        }
    }
}

// =============================================================================
// Supplier
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub total_purchased_minor: i64,
    pub total_pending_minor: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_from_amounts() {
        assert_eq!(PaymentStatus::from_amounts(0, 1000), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_amounts(400, 1000), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::from_amounts(1000, 1000), PaymentStatus::Paid);
        // A zero invoice is settled by definition.
        assert_eq!(PaymentStatus::from_amounts(0, 0), PaymentStatus::Paid);
    }

    #[test]
    fn test_settle() {
        let s = settle(1000, 400).unwrap();
        assert_eq!(s.pending_minor, 600);
        assert_eq!(s.status, PaymentStatus::Partial);

        let s = settle(1000, 1000).unwrap();
        assert_eq!(s.pending_minor, 0);
        assert_eq!(s.status, PaymentStatus::Paid);

        // Overpaying settles with nothing pending
        let s = settle(1000, 1200).unwrap();
        assert_eq!(s.pending_minor, 0);
        assert_eq!(s.status, PaymentStatus::Paid);

        assert!(settle(1000, -1).is_err());
        assert!(settle(-1, 0).is_err());
    }

    #[test]
    fn test_tax_lines_skip_local() {
        let rates = vec![
            TaxRateSpec {
                name: "CGST".to_string(),
                rate: Percent::from_bps(900),
            },
            TaxRateSpec {
                name: "SGST".to_string(),
                rate: Percent::from_bps(900),
            },
        ];
        let invoice = Money::from_minor(100_000);

        assert!(compute_tax_lines(invoice, &rates, true).is_empty());

        let lines = compute_tax_lines(invoice, &rates, false);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].amount_minor, 9_000);
        assert_eq!(lines[1].rate_bps, 900);
    }

    #[test]
    fn test_effective_invoice_defaults_to_line_sum() {
        let mut purchase = NewPurchase::new(
            "s1",
            vec![
                NewPurchaseLine::new("Sugar 1kg", 10, 4_500),
                NewPurchaseLine::new("Tea leaves", 2, 12_000),
            ],
        );
        assert_eq!(purchase.effective_invoice().minor(), 69_000);

        purchase.invoice_amount_minor = Some(70_000);
        assert_eq!(purchase.effective_invoice().minor(), 70_000);
    }
}
