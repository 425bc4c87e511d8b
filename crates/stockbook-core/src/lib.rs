//! # stockbook-core: Pure Domain Logic for Stockbook
//!
//! The inventory and transaction ledger rules for a small point-of-sale
//! back office, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Entry points (HTTP / IPC, auth, catalog CRUD)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ validated payloads + Actor             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  stockbook-db (services)                        │   │
//! │  │   SaleService · OrderService · PurchaseService · LedgerAppender │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  item   │ │ ledger  │ │  bill   │ │  order  │ │purchase │  │   │
//! │  │   │ stock   │ │ entries │ │ status  │ │workflow │ │ settle  │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │        money · totals · validation · error · types              │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Shared types (Actor, Catalog, PaymentMode, ...)
//! - [`money`] - Money and Percent with integer arithmetic
//! - [`item`] - Catalog items and the tracked/untracked stock level
//! - [`ledger`] - Stock ledger entries, deltas and reconciliation
//! - [`bill`] - Bills and sale requests
//! - [`order`] - Orders and their workflow
//! - [`purchase`] - Purchases, tax lines and suppliers
//! - [`totals`] - Bill totals (discount, tax, rounding)
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::item::{ensure_available, StockLevel};
//!
//! assert!(ensure_available("Masala Tea", StockLevel::Untracked, 500).is_ok());
//!
//! let err = ensure_available("Masala Tea", StockLevel::Tracked(2), 5).unwrap_err();
//! assert!(err.to_string().contains("Available: 2"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bill;
pub mod error;
pub mod item;
pub mod ledger;
pub mod money;
pub mod order;
pub mod purchase;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single bill, order or purchase.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Maximum quantity on a single line.
///
/// ## Business Reason
/// Catches typos (10000 instead of 10) before they hit stock.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Largest unit price, rate or single amount accepted, in minor units.
///
/// Together with [`MAX_LINE_QUANTITY`] and [`MAX_DOCUMENT_LINES`] this keeps
/// every line total and document total far inside `i64`.
pub const MAX_PRICE_MINOR: i64 = 10_000_000_000;

/// Largest subtotal a single document can reach under the line limits.
pub const MAX_DOCUMENT_TOTAL_MINOR: i64 =
    MAX_PRICE_MINOR * MAX_LINE_QUANTITY * MAX_DOCUMENT_LINES as i64;

/// Optimistic retries for a count-based stock adjustment.
pub const ADJUSTMENT_RETRIES: usize = 3;
