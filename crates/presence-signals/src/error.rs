//! Per-source acquisition errors

use thiserror::Error;

/// Why a single source produced no reading
///
/// These never escape the aggregator; they are downgraded to an absent field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The source gave up waiting on its hardware
    #[error("Signal acquisition timed out")]
    TimedOut,

    /// The user or platform refused access
    #[error("Permission denied for signal source")]
    PermissionDenied,

    /// The hardware or reading is not available
    #[error("Signal unavailable: {0}")]
    Unavailable(String),

    /// The source returned data that could not be decoded
    #[error("Malformed signal reading: {0}")]
    Malformed(String),
}
