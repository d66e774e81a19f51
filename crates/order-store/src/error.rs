use thiserror::Error;

use crate::OrderId;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order row matched the given id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A line item failed validation before anything was written.
    #[error("Invalid line item: {0}")]
    Validation(String),

    /// A database error occurred. Any open transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write failed for a reason other than the driver.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The store has been closed.
    #[error("Order store is closed")]
    Closed,
}

impl StoreError {
    /// Returns true if the caller must assume nothing was written.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::WriteFailed(_) | StoreError::Closed
        )
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
