//! # Shared Domain Types
//!
//! Small types shared by every document in Stockbook.
//!
//! ## Dual-Key Identity Pattern
//! Every document has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - A human-facing number from its own sequence stream
//!   (bill #12, order #7, purchase PUR-0003)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Actor
// =============================================================================

/// Role of the authenticated actor, supplied by the auth collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
}

/// The authenticated user performing an operation.
///
/// Stamped onto every bill, order, purchase and ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Which catalog an item lives in.
///
/// Both catalogs are structurally identical. Resolution by id tries
/// [`Catalog::SubItem`] first and falls back to [`Catalog::Product`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Catalog {
    /// Prepared sub-items (made in-house, e.g. "Masala Tea").
    SubItem,
    /// Inventory products (bought in, e.g. "Bottled Water 500ml").
    Product,
}

impl Catalog {
    /// Resolution order for item lookups.
    pub const RESOLUTION_ORDER: [Catalog; 2] = [Catalog::SubItem, Catalog::Product];

    /// Stored discriminator, matching the sqlx encoding.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Catalog::SubItem => "sub_item",
            Catalog::Product => "product",
        }
    }

    /// Backing table name.
    pub const fn table(&self) -> &'static str {
        match self {
            Catalog::SubItem => "sub_items",
            Catalog::Product => "products",
        }
    }
}

// =============================================================================
// Document Type
// =============================================================================

/// A numbering stream. Each type has its own independent sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Bill,
    Order,
    Purchase,
}

impl DocumentType {
    /// Key of the counter row for this stream.
    pub const fn key(&self) -> &'static str {
        match self {
            DocumentType::Bill => "bill",
            DocumentType::Order => "order",
            DocumentType::Purchase => "purchase",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Optional walk-in customer details printed on the bill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a bill was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    /// Several modes; the breakdown must cover the grand total.
    Split,
}

impl PaymentMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Card => "card",
            PaymentMode::Upi => "upi",
            PaymentMode::Split => "split",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMode::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMode::Card),
            "upi" | "online" => Ok(PaymentMode::Upi),
            "split" | "mixed" => Ok(PaymentMode::Split),
            _ => Err(ValidationError::NotAllowed {
                field: "payment mode".to_string(),
                allowed: vec![
                    "cash".to_string(),
                    "card".to_string(),
                    "upi".to_string(),
                    "split".to_string(),
                ],
            }),
        }
    }
}

/// One tender within a bill's payment breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentPart {
    pub mode: PaymentMode,
    pub amount_minor: i64,
}

/// Payment details supplied with a sale.
///
/// For a single-mode payment `parts` may be left empty; it is filled with
/// one part covering the grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInfo {
    pub mode: PaymentMode,
    #[serde(default)]
    pub parts: Vec<PaymentPart>,
}

impl PaymentInfo {
    pub fn single(mode: PaymentMode) -> Self {
        PaymentInfo {
            mode,
            parts: Vec::new(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_mode_parsing() {
        assert_eq!("cash".parse::<PaymentMode>().unwrap(), PaymentMode::Cash);
        assert_eq!(" UPI ".parse::<PaymentMode>().unwrap(), PaymentMode::Upi);
        assert_eq!("debit".parse::<PaymentMode>().unwrap(), PaymentMode::Card);
        assert_eq!("split".parse::<PaymentMode>().unwrap(), PaymentMode::Split);
        assert!("cheque".parse::<PaymentMode>().is_err());
    }

    #[test]
    fn test_catalog_resolution_order() {
        assert_eq!(Catalog::RESOLUTION_ORDER[0], Catalog::SubItem);
        assert_eq!(Catalog::SubItem.table(), "sub_items");
        assert_eq!(Catalog::Product.table(), "products");
        assert_eq!(Catalog::SubItem.as_str(), "sub_item");
    }

    #[test]
    fn test_document_type_keys_are_distinct() {
        assert_ne!(DocumentType::Bill.key(), DocumentType::Order.key());
        assert_ne!(DocumentType::Order.key(), DocumentType::Purchase.key());
        assert_eq!(DocumentType::Purchase.to_string(), "purchase");
    }
}
