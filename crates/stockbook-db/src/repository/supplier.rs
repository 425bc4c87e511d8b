//! # Supplier Repository
//!
//! Suppliers and their running purchase balances.
//!
//! `total_purchased_minor` and `total_pending_minor` are only changed by
//! [`apply_totals_in`](SupplierRepository::apply_totals_in), inside the
//! purchase transaction that causes the change.

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::purchase::{NewSupplier, Supplier};
use stockbook_core::validation::validate_name;
use stockbook_core::CoreError;
use tracing::debug;

use crate::error::{DbResult, EngineResult};
use crate::repository::{generate_id, Tx};

const SUPPLIER_COLUMNS: &str =
    "id, name, phone, total_purchased_minor, total_pending_minor, created_at, updated_at";

/// Repository for suppliers.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    /// Creates a new SupplierRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    /// Creates a supplier with zero balances.
    pub async fn create(&self, new: NewSupplier) -> EngineResult<Supplier> {
        validate_name("supplier name", &new.name)?;

        let id = generate_id();
        let now = Utc::now();
        debug!(id = %id, name = %new.name, "Creating supplier");

        let sql = format!(
            r#"
            INSERT INTO suppliers (
                id, name, phone, total_purchased_minor, total_pending_minor, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, 0, ?4, ?4)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        );
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(&id)
            .bind(new.name.trim())
            .bind(&new.phone)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(supplier)
    }

    /// Gets a supplier by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1");
        let supplier = sqlx::query_as::<_, Supplier>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    /// Lists suppliers by name.
    pub async fn list(&self) -> DbResult<Vec<Supplier>> {
        let sql = format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name COLLATE NOCASE");
        let suppliers = sqlx::query_as::<_, Supplier>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(suppliers)
    }

    /// Adds signed deltas to a supplier's totals inside `tx`.
    pub(crate) async fn apply_totals_in(
        tx: &mut Tx<'_>,
        id: &str,
        purchased_delta: i64,
        pending_delta: i64,
    ) -> EngineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET total_purchased_minor = total_purchased_minor + ?2,
                total_pending_minor = total_pending_minor + ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(purchased_delta)
        .bind(pending_delta)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Supplier", id).into());
        }

        debug!(id = %id, purchased_delta, pending_delta, "Applied supplier totals");
        Ok(())
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

    #[tokio::test]
    async fn test_create_and_adjust_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let supplier = db
            .suppliers()
            .create(NewSupplier {
                name: "Karachi Traders".to_string(),
                phone: Some("0300-0000000".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(supplier.total_purchased_minor, 0);

        let mut tx = db.pool().begin().await.unwrap();
        SupplierRepository::apply_totals_in(&mut tx, &supplier.id, 1_000, 600)
            .await
            .unwrap();
        SupplierRepository::apply_totals_in(&mut tx, &supplier.id, 0, -600)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let fetched = db.suppliers().get(&supplier.id).await.unwrap().unwrap();
        assert_eq!(fetched.total_purchased_minor, 1_000);
        assert_eq!(fetched.total_pending_minor, 0);
    }

    #[tokio::test]
    async fn test_unknown_supplier() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let err = SupplierRepository::apply_totals_in(&mut tx, "missing", 1, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotFound { .. })));

        let err = db
            .suppliers()
            .create(NewSupplier {
                name: " ".to_string(),
                phone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
    }
}
