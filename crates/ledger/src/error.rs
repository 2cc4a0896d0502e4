use thiserror::Error;

use crate::PurchaseId;

/// Errors that can occur when reading or writing the purchase ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The purchase was not found in the ledger.
    #[error("Purchase not found: {0}")]
    NotFound(PurchaseId),

    /// A stored payment status could not be interpreted.
    #[error("Unknown payment status: {0}")]
    UnknownStatus(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The ledger is not accepting writes.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
