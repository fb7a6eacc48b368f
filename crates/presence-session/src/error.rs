//! Session error types

use presence_domain::{CommitError, SessionId};
use thiserror::Error;

use crate::SessionState;

/// Errors surfaced by the presence service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// No active geofence is configured for the course
    #[error("No active geofence configured for course {0}")]
    ConfigurationMissing(String),

    /// The referenced session does not exist (or was swept)
    #[error("Unknown presence session {0}")]
    UnknownSession(SessionId),

    /// The requested action is not allowed in the session's current state
    #[error("Cannot {action} a session in state {from}")]
    InvalidTransition {
        /// State the session was in
        from: SessionState,
        /// Action that was attempted
        action: &'static str,
    },

    /// The outcome token failed verification
    #[error("Invalid outcome token")]
    InvalidToken,

    /// The ledger rejected the commit
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ConfigurationMissing(_) => "configuration_missing",
            SessionError::UnknownSession(_) => "unknown_session",
            SessionError::InvalidTransition { .. } => "invalid_transition",
            SessionError::InvalidToken => "invalid_token",
            SessionError::Commit(e) => e.code(),
            SessionError::Internal(_) => "internal",
        }
    }
}
