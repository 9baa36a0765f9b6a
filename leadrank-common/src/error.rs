//! Common error types for LeadRank

use thiserror::Error;

/// Common result type for LeadRank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the LeadRank crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Monthly lead quota reached; the write was rolled back
    #[error("Monthly lead quota reached: {used}/{limit}")]
    QuotaExceeded { used: i64, limit: i64 },

    /// Tenant workspace has been deactivated
    #[error("Tenant is inactive: {0}")]
    TenantInactive(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may safely retry the failed operation.
    ///
    /// Covers the storage-transient class only (lock contention, pool
    /// exhaustion). Quota and validation failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(sqlx::Error::Database(db_err)) => {
                let msg = db_err.message();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            _ => false,
        }
    }
}
