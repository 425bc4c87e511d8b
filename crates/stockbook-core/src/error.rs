//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  ├── DbError          - Persistence failures (retryable)               │
//! │  └── EngineError      - CoreError | DbError, returned by services      │
//! │                                                                         │
//! │  Every CoreError is raised BEFORE any write is committed.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation (empty line list, bad payment breakdown, ...).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// An item, bill, order, purchase or supplier does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Requested quantity exceeds the tracked quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale: Masala Tea × 5
    ///      │
    ///      ▼
    /// Stock check: tracked, current = 2
    ///      │
    ///      ▼
    /// InsufficientStock { item: "Masala Tea", available: 2, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient stock for Masala Tea. Available: 2, requested: 5"
    /// ```
    #[error("Insufficient stock for {item}. Available: {available}, requested: {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// A stock delta would drive a tracked quantity below zero.
    #[error("Stock for {item} cannot go below zero (current {current}, change {delta})")]
    StockViolation {
        item: String,
        current: i64,
        delta: i64,
    },

    /// The document is not in a state that allows the operation
    /// (re-cancelling a bill, converting a cancelled order, ...).
    #[error("{entity} {id}: {reason}")]
    StateConflict {
        entity: String,
        id: String,
        reason: String,
    },
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::StateConflict {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are raised before business logic runs and are always safe to retry
/// after the caller corrects the payload.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, unknown payment mode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two amounts that must agree do not.
    #[error("{field} must equal {expected}, got {actual}")]
    Mismatch {
        field: String,
        expected: i64,
        actual: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_available() {
        let err = CoreError::InsufficientStock {
            item: "Masala Tea".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Masala Tea. Available: 2, requested: 5"
        );
        assert!(err.to_string().contains("Available: 2"));
    }

    #[test]
    fn test_state_conflict_message() {
        let err = CoreError::conflict("Bill", "42", "already cancelled");
        assert_eq!(err.to_string(), "Bill 42: already cancelled");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "lines".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: lines is required");
    }
}
