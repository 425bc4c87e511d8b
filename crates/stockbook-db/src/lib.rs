//! # stockbook-db: Persistence and Transaction Services for Stockbook
//!
//! This crate owns the SQLite store and every operation that moves stock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Data Flow                              │
//! │                                                                         │
//! │  Caller (POS terminal, back office, seed binary)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │   Appender    │    │ Repositories │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SaleService   │───►│ stock UPDATE  │───►│ ItemRepo     │  │   │
//! │  │   │ OrderService  │    │ + ledger row  │    │ LedgerRepo   │  │   │
//! │  │   │ PurchaseSvc   │    │ in one tx     │    │ BillRepo ... │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   WAL mode, append-only stock_ledger, sequence_counters         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and service accessors
//! - [`config`] - TOML engine configuration and tracing setup
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Persistence and engine error types
//! - [`repository`] - Row-level access per table
//! - [`appender`] - The only writer of stock quantities
//! - [`services`] - Sale, order and purchase orchestration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, DbConfig};
//! use stockbook_core::bill::{NewSale, SaleLine};
//!
//! let db = Database::new(DbConfig::new("stockbook.db")).await?;
//!
//! let bill = db
//!     .sales()
//!     .create_sale(NewSale::cash(vec![SaleLine::new(&tea_id, 2)]), &cashier)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod appender;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod services;

// =============================================================================
// Re-exports
// =============================================================================

pub use appender::LedgerAppender;
pub use config::{init_tracing, EngineConfig, NumberingConfig};
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use pool::{Database, DbConfig};

// Repository and service re-exports for convenience
pub use repository::bill::BillRepository;
pub use repository::item::ItemRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::order::OrderRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sequence::SequenceRepository;
pub use repository::supplier::SupplierRepository;
pub use services::order::OrderService;
pub use services::purchase::PurchaseService;
pub use services::sale::SaleService;
