//! Commit error taxonomy

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::AttendanceKey;

/// Reasons a commit can be rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    /// The outcome did not establish presence
    #[error("Presence was not verified; run a new evaluation")]
    NotVerified,

    /// The outcome's validity window has passed
    #[error("Proof of presence expired at {expired_at}; run a new evaluation")]
    ExpiredProof {
        /// End of the validity window
        expired_at: DateTime<Utc>,
    },

    /// A record for the key already exists
    #[error("Attendance already marked for {key}")]
    AlreadyMarked {
        /// The conflicting key
        key: AttendanceKey,
    },

    /// The ledger's storage failed
    #[error("Ledger storage error: {0}")]
    Storage(String),
}

impl CommitError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CommitError::NotVerified => "not_verified",
            CommitError::ExpiredProof { .. } => "expired_proof",
            CommitError::AlreadyMarked { .. } => "already_marked",
            CommitError::Storage(_) => "storage",
        }
    }
}
