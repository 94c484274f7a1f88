use chrono::NaiveDate;

/// Infrastructure fault raised by a storage capability. Always aborts
/// the enclosing transaction and is surfaced unmodified, never retried.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database failure: {0}")]
    Database(String),

    #[error("Transaction aborted: {0}")]
    Transaction(String),
}

impl StorageError {
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    pub fn transaction(err: impl std::fmt::Display) -> Self {
        Self::Transaction(err.to_string())
    }
}

/// Fulfillment engine error taxonomy.
///
/// `InsufficientStock` is a business rejection, not a system fault: in
/// batch mode it becomes a per-order rejected outcome, in single-order
/// mode it surfaces to the caller. Everything else propagates unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown reference: {0}")]
    Reference(String),

    #[error("Insufficient ingredient: {0}")]
    InsufficientStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type EngineResult<T> = Result<T, EngineError>;
