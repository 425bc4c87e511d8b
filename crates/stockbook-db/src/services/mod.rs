//! # Transaction Services
//!
//! Multi-step operations that must commit or roll back as one unit.
//!
//! ## Shape of Every Service Call
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Validate input and read current state on the pool                  │
//! │  2. BEGIN                                                               │
//! │  3. First statement writes (counter bump or status guard)              │
//! │  4. Document rows, ledger rows via LedgerAppender::apply_in            │
//! │  5. COMMIT, or drop the transaction on any error                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`sale`] - Bill creation and cancellation
//! - [`order`] - Order workflow and order-to-bill conversion
//! - [`purchase`] - Supplier purchases, payments and stock receipts

pub mod order;
pub mod purchase;
pub mod sale;
