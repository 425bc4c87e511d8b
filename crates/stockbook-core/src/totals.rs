//! # Totals
//!
//! The single place bill and purchase amounts are derived. Every save
//! recomputes from lines and rates; caller-supplied derived fields are
//! never trusted.
//!
//! ## Bill Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines ──► subtotal = Σ unit × qty                                     │
//! │              │                                                          │
//! │              ├── discount  (percent of subtotal, or flat ≤ subtotal)   │
//! │              ▼                                                          │
//! │           taxable = subtotal - discount                                 │
//! │              │                                                          │
//! │              ├── tax       (percent of taxable)                         │
//! │              ▼                                                          │
//! │           pre_round = taxable + tax                                     │
//! │              │                                                          │
//! │              ▼                                                          │
//! │           grand = round_to_major(pre_round)                             │
//! │           round_off = grand - pre_round                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::bill::{BillTotals, Discount, Pricing};
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_percent;
use crate::MAX_DOCUMENT_TOTAL_MINOR;

/// Computes the authoritative totals for a set of line totals.
///
/// ```rust
/// use stockbook_core::bill::Pricing;
/// use stockbook_core::money::{Money, Percent};
/// use stockbook_core::totals::compute_bill_totals;
///
/// let lines = [Money::from_major(150), Money::from_major(20)];
/// let totals = compute_bill_totals(lines, &Pricing::with_discount_percent(Percent::from_bps(1000))).unwrap();
/// assert_eq!(totals.grand_total_minor, 15300);
/// assert_eq!(totals.round_off_minor, 0);
/// ```
pub fn compute_bill_totals<I>(line_totals: I, pricing: &Pricing) -> CoreResult<BillTotals>
where
    I: IntoIterator<Item = Money>,
{
    let subtotal = line_totals
        .into_iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line))
        .filter(|subtotal| subtotal.minor() <= MAX_DOCUMENT_TOTAL_MINOR)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "subtotal".to_string(),
            min: 0,
            max: MAX_DOCUMENT_TOTAL_MINOR,
        })?;

    let discount = match pricing.discount {
        Discount::None => Money::zero(),
        Discount::Percent(rate) => {
            validate_percent("discount", rate)?;
            subtotal.percent(rate)
        }
        Discount::Amount(amount) => {
            if amount < 0 || amount > subtotal.minor() {
                return Err(ValidationError::OutOfRange {
                    field: "discount".to_string(),
                    min: 0,
                    max: subtotal.minor(),
                }
                .into());
            }
            Money::from_minor(amount)
        }
    };

    validate_percent("tax rate", pricing.tax_rate)?;
    let taxable = subtotal - discount;
    let tax = taxable.percent(pricing.tax_rate);
    let pre_round = taxable + tax;
    let grand = pre_round.round_to_major();

    Ok(BillTotals {
        subtotal_minor: subtotal.minor(),
        discount_minor: discount.minor(),
        tax_minor: tax.minor(),
        round_off_minor: (grand - pre_round).minor(),
        grand_total_minor: grand.minor(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
