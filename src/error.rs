//! Error types for kvcounter
//!
//! Provides a unified error type for the counters and the store they run on.

use thiserror::Error;

/// Result type alias using Error
pub type Result<T> = std::result::Result<T, Error>;

/// Why one write of a cancelled transaction was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    /// The write was not the cause of the cancellation
    None,

    /// The write's condition evaluated false against the persisted item
    ConditionalCheckFailed,

    /// The write was rejected for lack of throughput
    ThrottlingError,
}

/// Unified error type for kvcounter operations
#[derive(Debug, Error)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Conflict Errors
    // -------------------------------------------------------------------------
    /// A transaction was cancelled, with one reason per write.
    /// When a reason is `ConditionalCheckFailed` this is the conflict signal
    /// that the retry loop recovers from.
    #[error("Transaction cancelled: {}", format_reasons(.reasons))]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    /// A single conditional write was rejected.
    #[error("Conditional check failed on table '{table}'")]
    ConditionalCheckFailed { table: String },

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Item size {size} bytes exceeds limit of {limit} bytes")]
    ItemTooLarge { size: usize, limit: usize },

    #[error("Transaction of {count} writes exceeds limit of {limit}")]
    TransactionTooLarge { count: usize, limit: usize },

    #[error("Throughput exceeded on table '{table}'")]
    ThroughputExceeded { table: String },

    // -------------------------------------------------------------------------
    // Precondition Errors
    // -------------------------------------------------------------------------
    #[error("Item for table '{table}' is missing key attribute '{attribute}'")]
    MissingKeyAttribute { table: String, attribute: String },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Attribute '{attribute}' does not hold a valid counter: {reason}")]
    InvalidCounter { attribute: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for the optimistic-concurrency loss that warrants a fresh attempt
    ///
    /// Only a cancellation caused by a failed condition counts; cancellations
    /// for any other reason are returned to the caller.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::TransactionCanceled { reasons } => {
                reasons.contains(&CancellationReason::ConditionalCheckFailed)
            }
            _ => false,
        }
    }

    /// True for any error caused by a condition evaluating false, whether
    /// inside a transaction or on a single write
    pub fn is_condition_failure(&self) -> bool {
        self.is_conflict() || matches!(self, Error::ConditionalCheckFailed { .. })
    }

    /// True for item-size, transaction-size and throughput errors
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Error::ItemTooLarge { .. }
                | Error::TransactionTooLarge { .. }
                | Error::ThroughputExceeded { .. }
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

fn format_reasons(reasons: &[CancellationReason]) -> String {
    let codes: Vec<&str> = reasons
        .iter()
        .map(|r| match r {
            CancellationReason::None => "None",
            CancellationReason::ConditionalCheckFailed => "ConditionalCheckFailed",
            CancellationReason::ThrottlingError => "ThrottlingError",
        })
        .collect();
    format!("[{}]", codes.join(", "))
}
