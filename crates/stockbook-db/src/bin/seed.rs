//! # Seed Data Generator
//!
//! Populates the database with a demo menu, retail stock and suppliers.
//!
//! ## Usage
//! ```bash
//! # Seed the database named in the engine config
//! cargo run -p stockbook-db --bin seed
//!
//! # Specify database path
//! cargo run -p stockbook-db --bin seed -- --db ./data/stockbook.db
//!
//! # Use a specific config file
//! cargo run -p stockbook-db --bin seed -- --config ./stockbook.toml
//! ```
//!
//! ## Generated Data
//! - Sub-items: the kitchen menu (tea, paratha, ...), some untracked
//! - Products: packaged goods with opening stock and low-stock thresholds
//! - Suppliers: two vendors with zero balances
//!
//! Every tracked item gets an `OPENING` ledger row, so a freshly seeded
//! database reconciles cleanly.

use std::env;
use std::path::PathBuf;

use stockbook_core::item::NewItem;
use stockbook_core::purchase::NewSupplier;
use stockbook_core::{Actor, Catalog, Role};
use stockbook_db::{init_tracing, Database, EngineConfig};

/// Menu items: (name, price, cost, opening stock). `None` stock is untracked.
const MENU: &[(&str, i64, i64, Option<i64>)] = &[
    ("Masala Tea", 8_000, 3_000, None),
    ("Green Tea", 6_000, 2_000, None),
    ("Aloo Paratha", 15_000, 6_000, Some(40)),
    ("Chicken Roll", 35_000, 18_000, Some(25)),
    ("Samosa", 5_000, 2_000, Some(60)),
    ("Club Sandwich", 45_000, 22_000, Some(15)),
];

/// Packaged goods: (name, unit, price, cost, opening stock, threshold).
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("Bottled Water 500ml", "btl", 6_000, 4_000, 120, 24),
    ("Cola 345ml", "can", 10_000, 7_500, 96, 24),
    ("Potato Chips", "pkt", 7_000, 5_000, 48, 12),
    ("Chocolate Bar", "pcs", 12_000, 9_000, 36, 10),
    ("Juice Box 200ml", "pcs", 8_000, 6_000, 6, 12),
];

const SUPPLIERS: &[(&str, Option<&str>)] = &[
    ("Karachi Traders", Some("+92-21-5550101")),
    ("Lahore Dairy", None),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   Engine config file (stockbook.toml)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config.logging);

    println!("🌱 Stockbook Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing =
        db.items().count(Catalog::SubItem).await? + db.items().count(Catalog::Product).await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = Actor::new("seed", "Seed", Role::Admin);
    let items = db.items();

    println!();
    println!("Seeding menu...");
    for (name, price, cost, stock) in MENU {
        let new = match stock {
            Some(qty) => NewItem::tracked(Catalog::SubItem, *name, *price, *qty),
            None => NewItem::untracked(Catalog::SubItem, *name, *price),
        };
        if let Err(e) = items.insert(new.with_cost(*cost), &admin).await {
            eprintln!("Failed to insert {}: {}", name, e);
        }
    }

    println!("Seeding products...");
    for (name, unit, price, cost, stock, threshold) in PRODUCTS {
        let new = NewItem::tracked(Catalog::Product, *name, *price, *stock)
            .with_unit(*unit)
            .with_cost(*cost)
            .with_threshold(*threshold);
        if let Err(e) = items.insert(new, &admin).await {
            eprintln!("Failed to insert {}: {}", name, e);
        }
    }

    println!("Seeding suppliers...");
    for (name, phone) in SUPPLIERS {
        let new = NewSupplier {
            name: name.to_string(),
            phone: phone.map(str::to_string),
        };
        if let Err(e) = db.suppliers().create(new).await {
            eprintln!("Failed to insert supplier {}: {}", name, e);
        }
    }

    println!();
    println!(
        "✓ {} menu items, {} products",
        items.count(Catalog::SubItem).await?,
        items.count(Catalog::Product).await?
    );

    let low = items.low_stock(Catalog::Product).await?;
    println!("  Low stock: {} product(s)", low.len());

    // Verify ledger
    let mismatches = db.ledger().reconcile_all().await?;
    if mismatches.is_empty() {
        println!("✓ Ledger reconciles");
    } else {
        println!("⚠ {} item(s) do not reconcile", mismatches.len());
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
