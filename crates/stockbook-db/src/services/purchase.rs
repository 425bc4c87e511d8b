//! # Purchase Service
//!
//! Supplier purchases, payment updates and stock receipts.
//!
//! ## Two Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_purchase   raw-material invoice                                │
//! │    ├── lines are free text, no stock moves                             │
//! │    ├── purchase number PUR-NNNN from the purchase counter              │
//! │    ├── amount due = invoice + tax, paid >= due settles                 │
//! │    └── supplier totals += due / pending                                │
//! │                                                                         │
//! │  receive_stock     finished goods into tracked inventory               │
//! │    ├── product matched by name (case-insensitive), products only       │
//! │    ├── missing product created tracked at 0                            │
//! │    └── LedgerAppender::apply_in(Purchase, +qty)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::ledger::{LedgerEntry, StockDelta};
use stockbook_core::purchase::{
    compute_tax_lines, format_purchase_number, settle, NewPurchase, Purchase, PurchaseLine,
};
use stockbook_core::validation::{
    validate_amount, validate_lines, validate_name, validate_percent, validate_price,
    validate_quantity,
};
use stockbook_core::{Actor, Catalog, CoreError, DocumentType};
use tracing::{debug, info};

use crate::appender::LedgerAppender;
use crate::config::NumberingConfig;
use crate::error::EngineResult;
use crate::repository::item::ItemRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sequence::SequenceRepository;
use crate::repository::supplier::SupplierRepository;
use crate::repository::generate_id;

/// Reference code for stock received without a purchase document.
pub const STOCK_IN_CODE: &str = "STOCK-IN";

/// Purchase orchestrator.
#[derive(Debug, Clone)]
pub struct PurchaseService {
    pool: SqlitePool,
    numbering: NumberingConfig,
}

impl PurchaseService {
    /// Creates a new PurchaseService.
    pub fn new(pool: SqlitePool, numbering: NumberingConfig) -> Self {
        PurchaseService { pool, numbering }
    }

    /// Gets a purchase with its lines.
    pub async fn get(&self, purchase_id: &str) -> EngineResult<Purchase> {
        PurchaseRepository::new(self.pool.clone())
            .get(purchase_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Purchase", purchase_id).into())
    }

    /// Records a supplier invoice and updates the supplier's balances.
    ///
    /// The invoice amount defaults to the sum of line totals. Tax lines are
    /// computed on the invoice amount only for non-local purchases. The
    /// amount due is invoice plus tax; the supplier's purchased total grows
    /// by that amount and its pending total by the purchase's pending.
    pub async fn create_purchase(&self, new: NewPurchase, actor: &Actor) -> EngineResult<Purchase> {
        validate_lines(&new.lines)?;
        for line in &new.lines {
            validate_name("item name", &line.item_name)?;
            validate_quantity(line.quantity)?;
            validate_price("rate", line.rate_minor)?;
        }
        for rate in &new.tax_rates {
            validate_name("tax name", &rate.name)?;
            validate_percent("tax rate", rate.rate)?;
        }

        if let Some(amount) = new.invoice_amount_minor {
            validate_amount("invoice amount", amount)?;
        }
        validate_amount("paid amount", new.paid_amount_minor)?;

        let invoice = new.effective_invoice();
        let tax_lines = compute_tax_lines(invoice, &new.tax_rates, new.is_local);
        let tax_total_minor: i64 = tax_lines.iter().map(|t| t.amount_minor).sum();
        let settlement = settle(invoice.minor() + tax_total_minor, new.paid_amount_minor)?;

        SupplierRepository::new(self.pool.clone())
            .get(&new.supplier_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Supplier", &new.supplier_id))?;

        let mut tx = self.pool.begin().await?;

        let sequence = SequenceRepository::next_in(&mut tx, DocumentType::Purchase).await?;
        let purchase_number = format_purchase_number(
            &self.numbering.purchase_prefix,
            self.numbering.purchase_width,
            sequence,
        );
        let purchase_id = generate_id();
        let now = Utc::now();

        let lines = new
            .lines
            .iter()
            .zip(1..)
            .map(|(line, line_no)| PurchaseLine {
                id: generate_id(),
                purchase_id: purchase_id.clone(),
                line_no,
                item_name: line.item_name.trim().to_string(),
                quantity: line.quantity,
                rate_minor: line.rate_minor,
                total_minor: line.total().minor(),
            })
            .collect();

        let purchase = Purchase {
            id: purchase_id,
            purchase_number,
            sequence,
            supplier_id: new.supplier_id,
            invoice_number: new.invoice_number,
            invoice_date: new.invoice_date,
            lines,
            invoice_amount_minor: invoice.minor(),
            tax_lines,
            tax_total_minor,
            paid_amount_minor: new.paid_amount_minor,
            pending_amount_minor: settlement.pending_minor,
            payment_status: settlement.status,
            is_local: new.is_local,
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
            version: 0,
        };

        PurchaseRepository::insert_in(&mut tx, &purchase).await?;

        SupplierRepository::apply_totals_in(
            &mut tx,
            &purchase.supplier_id,
            purchase.gross_minor(),
            purchase.pending_amount_minor,
        )
        .await?;

        tx.commit().await?;

        info!(
            purchase_number = %purchase.purchase_number,
            invoice = purchase.invoice_amount_minor,
            tax = purchase.tax_total_minor,
            paid = purchase.paid_amount_minor,
            actor = %actor.id,
            "Purchase created"
        );
        Ok(purchase)
    }

    /// Sets a new paid amount and recomputes pending amount and status.
    ///
    /// Paying the full amount due, or more, marks the purchase Paid. The
    /// supplier's pending total moves by the change in the purchase's
    /// pending amount.
    pub async fn update_payment(
        &self,
        purchase_id: &str,
        new_paid_minor: i64,
        actor: &Actor,
    ) -> EngineResult<Purchase> {
        validate_amount("paid amount", new_paid_minor)?;
        let purchase = self.get(purchase_id).await?;
        let settlement = settle(purchase.gross_minor(), new_paid_minor)?;

        let mut tx = self.pool.begin().await?;

        let updated = PurchaseRepository::update_payment_in(
            &mut tx,
            purchase_id,
            purchase.version,
            new_paid_minor,
            settlement.pending_minor,
            settlement.status,
        )
        .await?;
        if !updated {
            return Err(CoreError::conflict(
                "Purchase",
                purchase.purchase_number,
                "modified concurrently",
            )
            .into());
        }

        let pending_change = settlement.pending_minor - purchase.pending_amount_minor;
        SupplierRepository::apply_totals_in(&mut tx, &purchase.supplier_id, 0, pending_change)
            .await?;

        let purchase = PurchaseRepository::get_in(&mut tx, purchase_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Purchase", purchase_id))?;

        tx.commit().await?;

        info!(
            purchase_number = %purchase.purchase_number,
            paid = purchase.paid_amount_minor,
            pending = purchase.pending_amount_minor,
            actor = %actor.id,
            "Purchase payment updated"
        );
        Ok(purchase)
    }

    /// Receives finished goods into tracked product stock.
    ///
    /// The product is matched by name; when none exists a tracked product
    /// at zero stock is created first. Only the product catalog is searched:
    /// a sub-item with the same name is a separate menu entry and its stock
    /// is never credited here. `purchase_id` links the ledger row to a
    /// purchase document and uses its number as the reference code.
    ///
    /// Returns `None` when the matched product does not track stock.
    pub async fn receive_stock(
        &self,
        item_name: &str,
        quantity: i64,
        rate_minor: i64,
        purchase_id: Option<&str>,
        actor: &Actor,
    ) -> EngineResult<Option<LedgerEntry>> {
        validate_name("item name", item_name)?;
        validate_quantity(quantity)?;
        validate_price("rate", rate_minor)?;

        let reference_code = match purchase_id {
            Some(id) => self.get(id).await?.purchase_number,
            None => STOCK_IN_CODE.to_string(),
        };
        let delta = StockDelta::purchase(quantity, rate_minor, purchase_id, reference_code);

        let mut tx = self.pool.begin().await?;
        let item = ItemRepository::ensure_product_in(&mut tx, item_name, rate_minor).await?;
        let entry =
            LedgerAppender::apply_in(&mut tx, Catalog::Product, &item.id, &delta, actor, None)
                .await?;
        tx.commit().await?;

        match &entry {
            Some(entry) => info!(
                item_id = %item.id,
                delta = entry.quantity,
                balance = entry.balance_qty,
                reference = %entry.reference_code,
                "Stock received"
            ),
            None => debug!(item_id = %item.id, "Received stock for untracked product"),
        }
        Ok(entry)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pool::{Database, DbConfig};
    use stockbook_core::item::NewItem;
    use stockbook_core::ledger::LedgerKind;
    use stockbook_core::purchase::{NewPurchaseLine, NewSupplier, PaymentStatus, TaxRateSpec};
    use stockbook_core::{Percent, Role};

    fn manager() -> Actor {
        Actor::new("u-2", "Ravi", Role::Manager)
    }

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let supplier = db
            .suppliers()
            .create(NewSupplier {
                name: "Karachi Traders".to_string(),
                phone: None,
            })
            .await
            .unwrap();
        (db, supplier.id)
    }

    fn raw_materials(supplier_id: &str) -> NewPurchase {
        let mut purchase = NewPurchase::new(
            supplier_id,
            vec![
                NewPurchaseLine::new("Sugar 1kg", 10, 5_000),
                NewPurchaseLine::new("Milk 1L", 25, 2_000),
            ],
        );
        purchase.invoice_amount_minor = Some(100_000);
        purchase.paid_amount_minor = 40_000;
        purchase
    }

    #[tokio::test]
    async fn test_partial_payment_then_settled() {
        let (db, supplier_id) = setup().await;
        let purchases = db.purchases();

        let purchase = purchases
            .create_purchase(raw_materials(&supplier_id), &manager())
            .await
            .unwrap();
        assert_eq!(purchase.purchase_number, "PUR-0001");
        assert_eq!(purchase.pending_amount_minor, 60_000);
        assert_eq!(purchase.payment_status, PaymentStatus::Partial);
        assert!(purchase.tax_lines.is_empty());

        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_purchased_minor, 100_000);
        assert_eq!(supplier.total_pending_minor, 60_000);

        let paid = purchases
            .update_payment(&purchase.id, 100_000, &manager())
            .await
            .unwrap();
        assert_eq!(paid.pending_amount_minor, 0);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.version, 1);

        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_pending_minor, 0);
        assert_eq!(supplier.total_purchased_minor, 100_000);

        // Raw-material purchases never touch stock
        assert!(db.ledger().recent(10).await.unwrap().is_empty());
    }

    fn taxed_import(supplier_id: &str) -> NewPurchase {
        let mut purchase = NewPurchase::new(
            supplier_id,
            vec![NewPurchaseLine::new("Cardamom 1kg", 2, 50_000)],
        );
        purchase.is_local = false;
        purchase.invoice_amount_minor = Some(100_000);
        purchase.tax_rates = vec![
            TaxRateSpec {
                name: "CGST".to_string(),
                rate: Percent::from_bps(900),
            },
            TaxRateSpec {
                name: "SGST".to_string(),
                rate: Percent::from_bps(900),
            },
        ];
        purchase
    }

    #[tokio::test]
    async fn test_taxed_purchase_can_be_settled() {
        let (db, supplier_id) = setup().await;
        let purchases = db.purchases();
        let purchase = purchases
            .create_purchase(taxed_import(&supplier_id), &manager())
            .await
            .unwrap();
        assert_eq!(purchase.tax_total_minor, 18_000);
        assert_eq!(purchase.pending_amount_minor, 118_000);

        // Paying the invoice alone leaves the tax outstanding
        let partial = purchases
            .update_payment(&purchase.id, 100_000, &manager())
            .await
            .unwrap();
        assert_eq!(partial.pending_amount_minor, 18_000);
        assert_eq!(partial.payment_status, PaymentStatus::Partial);
        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_pending_minor, 18_000);

        let paid = purchases
            .update_payment(&purchase.id, 118_000, &manager())
            .await
            .unwrap();
        assert_eq!(paid.pending_amount_minor, 0);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_purchased_minor, 118_000);
        assert_eq!(supplier.total_pending_minor, 0);

        let stored = db.purchase_records().get(&purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.paid_amount_minor, 118_000);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_overpayment_settles_without_negative_balance() {
        let (db, supplier_id) = setup().await;
        let purchases = db.purchases();
        let purchase = purchases
            .create_purchase(taxed_import(&supplier_id), &manager())
            .await
            .unwrap();

        let paid = purchases
            .update_payment(&purchase.id, 120_000, &manager())
            .await
            .unwrap();
        assert_eq!(paid.pending_amount_minor, 0);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_pending_minor, 0);

        // Lowering the payment again reopens exactly the shortfall
        let reopened = purchases
            .update_payment(&purchase.id, 110_000, &manager())
            .await
            .unwrap();
        assert_eq!(reopened.pending_amount_minor, 8_000);
        assert_eq!(reopened.payment_status, PaymentStatus::Partial);
        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_pending_minor, 8_000);
    }

    #[tokio::test]
    async fn test_invalid_paid_amount_is_rejected() {
        let (db, supplier_id) = setup().await;
        let purchases = db.purchases();
        let purchase = purchases
            .create_purchase(raw_materials(&supplier_id), &manager())
            .await
            .unwrap();

        for amount in [-1, i64::MAX] {
            let err = purchases
                .update_payment(&purchase.id, amount, &manager())
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
        }

        let unchanged = purchases.get(&purchase.id).await.unwrap();
        assert_eq!(unchanged.paid_amount_minor, 40_000);
        assert_eq!(unchanged.version, 0);
        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_pending_minor, 60_000);
    }

    #[tokio::test]
    async fn test_invoice_defaults_and_tax_lines() {
        let (db, supplier_id) = setup().await;

        let mut purchase = NewPurchase::new(
            &supplier_id,
            vec![NewPurchaseLine::new("Tea leaves", 4, 25_000)],
        );
        purchase.is_local = false;
        purchase.tax_rates = vec![
            TaxRateSpec {
                name: "CGST".to_string(),
                rate: Percent::from_bps(900),
            },
            TaxRateSpec {
                name: "SGST".to_string(),
                rate: Percent::from_bps(900),
            },
        ];

        let purchase = db.purchases().create_purchase(purchase, &manager()).await.unwrap();
        assert_eq!(purchase.invoice_amount_minor, 100_000);
        assert_eq!(purchase.tax_lines.len(), 2);
        assert_eq!(purchase.tax_total_minor, 18_000);
        assert_eq!(purchase.payment_status, PaymentStatus::Pending);

        let supplier = db.suppliers().get(&supplier_id).await.unwrap().unwrap();
        assert_eq!(supplier.total_purchased_minor, 118_000);
        assert_eq!(supplier.total_pending_minor, 118_000);

        let stored = db.purchases().get(&purchase.id).await.unwrap();
        assert_eq!(stored.tax_lines, purchase.tax_lines);
        assert_eq!(stored.lines, purchase.lines);
    }

    #[tokio::test]
    async fn test_purchase_numbers_follow_config() {
        let db = Database::new(DbConfig::in_memory().numbering(NumberingConfig {
            purchase_prefix: "PO/".to_string(),
            purchase_width: 2,
        }))
        .await
        .unwrap();
        let supplier = db
            .suppliers()
            .create(NewSupplier {
                name: "Lahore Dairy".to_string(),
                phone: None,
            })
            .await
            .unwrap();

        for expected in ["PO/01", "PO/02"] {
            let purchase = db
                .purchases()
                .create_purchase(raw_materials(&supplier.id), &manager())
                .await
                .unwrap();
            assert_eq!(purchase.purchase_number, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_supplier_consumes_no_number() {
        let (db, _) = setup().await;

        let err = db
            .purchases()
            .create_purchase(raw_materials("missing"), &manager())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));
        assert_eq!(db.sequences().current(DocumentType::Purchase).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_stock_creates_then_reuses_product() {
        let (db, supplier_id) = setup().await;
        let purchases = db.purchases();

        let entry = purchases
            .receive_stock("Bottled Water 500ml", 24, 800, None, &manager())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.kind, LedgerKind::Purchase);
        assert_eq!(entry.balance_qty, 24);
        assert_eq!(entry.reference_code, STOCK_IN_CODE);

        let purchase = purchases
            .create_purchase(raw_materials(&supplier_id), &manager())
            .await
            .unwrap();
        let entry = purchases
            .receive_stock("bottled water 500ML", 6, 750, Some(purchase.id.as_str()), &manager())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.balance_qty, 30);
        assert_eq!(entry.reference_code, "PUR-0001");
        assert_eq!(entry.reference_id.as_deref(), Some(purchase.id.as_str()));

        assert_eq!(db.items().count(Catalog::Product).await.unwrap(), 1);
        let product = db
            .items()
            .find_by_name(Catalog::Product, "Bottled Water 500ml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock, Some(30));
        assert!(db.ledger().reconcile(&product.id).await.unwrap().unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_receive_stock_for_untracked_product() {
        let (db, _) = setup().await;
        db.items()
            .insert(NewItem::untracked(Catalog::Product, "Ice", 500), &manager())
            .await
            .unwrap();

        let entry = db
            .purchases()
            .receive_stock("ice", 10, 100, None, &manager())
            .await
            .unwrap();
        assert!(entry.is_none());
        assert!(db.ledger().recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_stock_ignores_same_named_sub_item() {
        let (db, _) = setup().await;
        let samosa = db
            .items()
            .insert(NewItem::tracked(Catalog::SubItem, "Samosa", 5_000, 5), &manager())
            .await
            .unwrap();

        let entry = db
            .purchases()
            .receive_stock("samosa", 12, 3_000, None, &manager())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.catalog, Catalog::Product);
        assert_eq!(entry.balance_qty, 12);

        let kitchen = db.items().resolve(&samosa.id).await.unwrap().unwrap();
        assert_eq!(kitchen.catalog, Catalog::SubItem);
        assert_eq!(kitchen.stock, Some(5));

        let product = db
            .items()
            .find_by_name(Catalog::Product, "Samosa")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(product.id, samosa.id);
        assert_eq!(product.stock, Some(12));
        assert!(db.ledger().reconcile_all().await.unwrap().is_empty());
    }
}
