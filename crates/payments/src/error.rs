use common::OrderId;
use thiserror::Error;

/// Errors returned by a transaction store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction not found for order {0}")]
    NotFound(OrderId),

    #[error("Invalid transaction: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Injected failure from the in-memory store.
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Errors that can occur while handling a payment notification.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The body could not be parsed into a notification.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Signature or header checks failed. Nothing was written.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The transaction could not be recorded.
    #[error("Persistence error: {0}")]
    Persistence(#[from] LedgerError),
}

/// Why an order status push did not land.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The order does not exist; retrying will not help.
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order service unavailable: {0}")]
    Unavailable(String),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SinkError::NotFound(_))
    }
}

/// Convenience type alias for ledger results.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;
