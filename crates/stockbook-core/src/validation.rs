//! # Validation Module
//!
//! Business-rule input checks for Stockbook.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Entry point (HTTP / IPC collaborator)                        │
//! │  └── Structural checks (fields present, types correct)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Lines non-empty, quantities positive                              │
//! │  └── Payment breakdown covers the grand total                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (balance_qty >= 0)                      │
//! │  └── UNIQUE sequence numbers                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockbook_core::validation::{validate_lines, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_lines::<u8>(&[]).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Percent;
use crate::types::{PaymentInfo, PaymentMode, PaymentPart};
use crate::{MAX_DOCUMENT_LINES, MAX_DOCUMENT_TOTAL_MINOR, MAX_LINE_QUANTITY, MAX_PRICE_MINOR};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an item or supplier name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price, rate or amount in minor units.
///
/// ## Rules
/// - Zero is allowed
/// - Must not exceed MAX_PRICE_MINOR
pub fn validate_price(field: &str, minor: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_MINOR).contains(&minor) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_MINOR,
        });
    }

    Ok(())
}

/// Validates a document-level amount (invoice, paid) in minor units.
///
/// Bounded by MAX_DOCUMENT_TOTAL_MINOR rather than the per-unit price cap.
pub fn validate_amount(field: &str, minor: i64) -> ValidationResult<()> {
    if !(0..=MAX_DOCUMENT_TOTAL_MINOR).contains(&minor) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_DOCUMENT_TOTAL_MINOR,
        });
    }

    Ok(())
}

/// Validates a rate is within 0-100%.
pub fn validate_percent(field: &str, rate: Percent) -> ValidationResult<()> {
    if rate.bps() > Percent::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Percent::FULL_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that a document has at least one line and not too many.
pub fn validate_lines<T>(lines: &[T]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines.len() > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Payment Validators
// =============================================================================

/// Produces the stored payment breakdown for a bill.
///
/// ## Rules
/// - Single-mode payments get one part covering the grand total; any
///   supplied parts must agree with it
/// - Split payments need at least one part, every part positive and not
///   itself `Split`, summing exactly to the grand total
///
/// ## User Workflow
/// ```text
/// Grand total 153.00, Split: Cash 100.00 + UPI 53.00
///      │
///      ▼
/// validate_payment(&info, 15300) ← THIS FUNCTION
///      │
///      ├── part is Split?        → InvalidFormat
///      ├── part amount <= 0?     → MustBePositive
///      ├── Σ parts != 15300?     → Mismatch
///      │
///      └── OK → [Cash 10000, Upi 5300]
/// ```
pub fn validate_payment(
    payment: &PaymentInfo,
    grand_total_minor: i64,
) -> ValidationResult<Vec<PaymentPart>> {
    if payment.mode != PaymentMode::Split && payment.parts.is_empty() {
        return Ok(vec![PaymentPart {
            mode: payment.mode,
            amount_minor: grand_total_minor,
        }]);
    }

    if payment.parts.is_empty() {
        return Err(ValidationError::Required {
            field: "payment parts".to_string(),
        });
    }

    for part in &payment.parts {
        if part.mode == PaymentMode::Split {
            return Err(ValidationError::InvalidFormat {
                field: "payment parts".to_string(),
                reason: "a part cannot itself be split".to_string(),
            });
        }
        if part.amount_minor <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "payment part amount".to_string(),
            });
        }
    }

    let paid = payment
        .parts
        .iter()
        .try_fold(0i64, |acc, p| acc.checked_add(p.amount_minor))
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "payment total".to_string(),
            min: 0,
            max: grand_total_minor,
        })?;
    if paid != grand_total_minor {
        return Err(ValidationError::Mismatch {
            field: "payment total".to_string(),
            expected: grand_total_minor,
            actual: paid,
        });
    }

    Ok(payment.parts.clone())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn part(mode: PaymentMode, amount_minor: i64) -> PaymentPart {
        PaymentPart { mode, amount_minor }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Masala Tea").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price_and_percent() {
        assert!(validate_price("price", 0).is_ok());
        assert!(validate_price("price", MAX_PRICE_MINOR).is_ok());
        assert!(validate_price("price", -1).is_err());
        assert!(matches!(
            validate_price("price", i64::MAX / 2),
            Err(ValidationError::OutOfRange { max: MAX_PRICE_MINOR, .. })
        ));
        assert!(validate_amount("paid amount", MAX_PRICE_MINOR * 3).is_ok());
        assert!(validate_amount("paid amount", i64::MAX).is_err());
        assert!(validate_amount("paid amount", -5).is_err());
        assert!(validate_percent("discount", Percent::from_bps(10_000)).is_ok());
        assert!(validate_percent("discount", Percent::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_lines() {
        assert!(validate_lines(&[1]).is_ok());
        assert!(matches!(
            validate_lines::<i32>(&[]),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_single_mode_payment_fills_grand_total() {
        let parts = validate_payment(&PaymentInfo::single(PaymentMode::Upi), 15300).unwrap();
        assert_eq!(parts, vec![part(PaymentMode::Upi, 15300)]);
    }

    #[test]
    fn test_split_payment() {
        let info = PaymentInfo {
            mode: PaymentMode::Split,
            parts: vec![part(PaymentMode::Cash, 10_000), part(PaymentMode::Upi, 5_300)],
        };
        assert_eq!(validate_payment(&info, 15_300).unwrap().len(), 2);

        let err = validate_payment(&info, 15_400).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Mismatch {
                expected: 15_400,
                actual: 15_300,
                ..
            }
        ));

        let empty = PaymentInfo::single(PaymentMode::Split);
        assert!(validate_payment(&empty, 15_300).is_err());

        let nested = PaymentInfo {
            mode: PaymentMode::Split,
            parts: vec![part(PaymentMode::Split, 15_300)],
        };
        assert!(validate_payment(&nested, 15_300).is_err());

        let zero = PaymentInfo {
            mode: PaymentMode::Split,
            parts: vec![part(PaymentMode::Cash, 15_300), part(PaymentMode::Card, 0)],
        };
        assert!(validate_payment(&zero, 15_300).is_err());

        let huge = PaymentInfo {
            mode: PaymentMode::Split,
            parts: vec![part(PaymentMode::Cash, i64::MAX), part(PaymentMode::Card, i64::MAX)],
        };
        assert!(matches!(
            validate_payment(&huge, 15_300),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_single_mode_with_mismatched_part_rejected() {
        let info = PaymentInfo {
            mode: PaymentMode::Cash,
            parts: vec![part(PaymentMode::Cash, 100)],
        };
        assert!(validate_payment(&info, 15_300).is_err());
    }
}
