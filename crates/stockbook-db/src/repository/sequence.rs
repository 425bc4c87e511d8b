//! # Sequence Allocator
//!
//! Gap-free, collision-free numbering per document type.
//!
//! ## Counter Row Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: SELECT MAX(bill_number) + 1 FROM bills                       │
//! │     Two writers read the same max and both insert N+1.                 │
//! │                                                                         │
//! │  ✅ CORRECT: one atomic upsert on a counter row                         │
//! │     INSERT INTO sequence_counters VALUES ('bill', 1, now)              │
//! │     ON CONFLICT DO UPDATE SET last_value = last_value + 1              │
//! │     RETURNING last_value                                               │
//! │                                                                         │
//! │  The upsert runs inside the transaction that inserts the document.     │
//! │  Rollback of the document rolls back the increment, so no number is    │
//! │  ever skipped. SQLite holds the write lock from this statement until   │
//! │  commit, so no two writers see the same value.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use stockbook_core::DocumentType;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::Tx;

/// Repository for sequence counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next number for `document_type` inside `tx`.
    ///
    /// Returns 1 for the first document of a type.
    pub async fn next_in(tx: &mut Tx<'_>, document_type: DocumentType) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequence_counters (document_type, last_value, updated_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT (document_type) DO UPDATE SET
                last_value = last_value + 1,
                updated_at = excluded.updated_at
            RETURNING last_value
            "#,
        )
        .bind(document_type.key())
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        debug!(document_type = %document_type, value, "Allocated sequence number");
        Ok(value)
    }

    /// Allocates and commits the next number on its own.
    ///
    /// The number is consumed even if the caller never uses it. Document
    /// services call [`next_in`](Self::next_in) instead.
    pub async fn next_number(&self, document_type: DocumentType) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let value = Self::next_in(&mut tx, document_type).await?;
        tx.commit().await?;
        Ok(value)
    }

    /// The last number handed out, or 0 if none.
    pub async fn current(&self, document_type: DocumentType) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM sequence_counters WHERE document_type = ?1",
        )
        .bind(document_type.key())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_streams_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        assert_eq!(seq.current(DocumentType::Bill).await.unwrap(), 0);
        assert_eq!(seq.next_number(DocumentType::Bill).await.unwrap(), 1);
        assert_eq!(seq.next_number(DocumentType::Bill).await.unwrap(), 2);
        assert_eq!(seq.next_number(DocumentType::Order).await.unwrap(), 1);
        assert_eq!(seq.next_number(DocumentType::Purchase).await.unwrap(), 1);
        assert_eq!(seq.current(DocumentType::Bill).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rollback_leaves_no_gap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let n = SequenceRepository::next_in(&mut tx, DocumentType::Bill)
            .await
            .unwrap();
        assert_eq!(n, 1);
        tx.rollback().await.unwrap();

        assert_eq!(db.sequences().next_number(DocumentType::Bill).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocation_is_dense() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(
            DbConfig::new(dir.path().join("seq.db"))
                .max_connections(8)
                .busy_timeout(std::time::Duration::from_secs(30)),
        )
        .await
        .unwrap();

        const N: i64 = 40;
        let mut handles = Vec::new();
        for _ in 0..N {
            let seq = db.sequences();
            handles.push(tokio::spawn(async move {
                seq.next_number(DocumentType::Bill).await
            }));
        }

        let mut seen = BTreeSet::new();
        for handle in handles {
            let n = handle.await.unwrap().unwrap();
            assert!(seen.insert(n), "duplicate sequence number {n}");
        }

        let expected: BTreeSet<i64> = (1..=N).collect();
        assert_eq!(seen, expected);
    }
}
