//! Fair value engine error types

use crate::store::StoreError;
use thiserror::Error;

/// Errors raised while setting up or driving groups.
///
/// Per-tick failures (stale legs, unsupported methods, publish errors) are
/// not errors: they degrade to a zero fair value or a log line.
#[derive(Error, Debug)]
pub enum FairValueError {
    /// Store request failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No live configuration published for the symbol
    #[error("No live configuration for symbol {0}")]
    ConfigNotFound(String),

    /// Live configuration exists but cannot be parsed
    #[error("Invalid live configuration for symbol {symbol}: {message}")]
    InvalidConfig { symbol: String, message: String },

    /// A group loop can only be started once
    #[error("Loop of {0} already started")]
    AlreadyStarted(String),

    /// Stop called on a loop that never ran
    #[error("Loop of {0} is not running")]
    NotStarted(String),

    /// The loop task panicked or was aborted
    #[error("Loop task failed: {0}")]
    Join(String),
}
