//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service (sale / order / purchase)                                     │
//! │       │                                                                 │
//! │       │  pool reads: ItemRepository::resolve(id)                       │
//! │       │  tx writes:  BillRepository::insert_in(&mut tx, &bill)         │
//! │       ▼                                                                 │
//! │  Repositories                                                          │
//! │  ├── methods on &self     → run on the pool (one statement)            │
//! │  └── `*_in(tx, ..)` fns   → run inside the caller's transaction        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SequenceRepository`](sequence::SequenceRepository) - Per-document counters
//! - [`ItemRepository`](item::ItemRepository) - Sub-items and products
//! - [`LedgerRepository`](ledger::LedgerRepository) - Ledger queries and reconciliation
//! - [`BillRepository`](bill::BillRepository) - Bills and bill lines
//! - [`OrderRepository`](order::OrderRepository) - Orders and order lines
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - Purchases and lines
//! - [`SupplierRepository`](supplier::SupplierRepository) - Suppliers and balances

pub mod bill;
pub mod item;
pub mod ledger;
pub mod order;
pub mod purchase;
pub mod sequence;
pub mod supplier;

/// A write transaction on the Stockbook database.
pub type Tx<'c> = sqlx::Transaction<'c, sqlx::Sqlite>;

/// Generates a new row ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
