//! The per-attempt presence session state machine
//!
//! ```text
//! Idle -> Evaluating -> Verified ----> Committing -> Committed
//!             ^      \-> Unverified                \-> CommitFailed
//!             |_____________/
//! ```
//!
//! `Committed` and `CommitFailed` are terminal. A terminal session never
//! reaches the ledger again; asking it to commit replays its result.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use presence_domain::{
    AttendanceKey, AttendanceRecord, CommitError, MarkedBy, SessionId, VerificationOutcome,
};

use crate::SessionError;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing attempted yet
    Idle,
    /// Signals are being acquired and evaluated
    Evaluating,
    /// Presence established; a commit may follow
    Verified,
    /// Presence not established; evaluation may be retried
    Unverified,
    /// The ledger is being asked for a record
    Committing,
    /// A record was created
    Committed,
    /// The ledger refused the commit
    CommitFailed,
}

impl SessionState {
    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Evaluating => "evaluating",
            SessionState::Verified => "verified",
            SessionState::Unverified => "unverified",
            SessionState::Committing => "committing",
            SessionState::Committed => "committed",
            SessionState::CommitFailed => "commit_failed",
        }
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Committed | SessionState::CommitFailed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated verification attempt
#[derive(Debug, Clone)]
pub struct PresenceSession {
    id: SessionId,
    subject_id: String,
    course_id: String,
    marked_by: MarkedBy,
    state: SessionState,
    outcome: Option<VerificationOutcome>,
    attempts: u32,
    record: Option<AttendanceRecord>,
    failure: Option<CommitError>,
    created_at: DateTime<Utc>,
}

impl PresenceSession {
    /// Create an idle session
    pub fn new(
        subject_id: impl Into<String>,
        course_id: impl Into<String>,
        marked_by: MarkedBy,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            subject_id: subject_id.into(),
            course_id: course_id.into(),
            marked_by,
            state: SessionState::Idle,
            outcome: None,
            attempts: 0,
            record: None,
            failure: None,
            created_at,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Subject being verified
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Course being attended
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Who will be recorded as marking
    pub fn marked_by(&self) -> &MarkedBy {
        &self.marked_by
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Latest outcome, if an evaluation has finished
    pub fn outcome(&self) -> Option<&VerificationOutcome> {
        self.outcome.as_ref()
    }

    /// Number of evaluations started
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The committed record, once `Committed`
    pub fn record(&self) -> Option<&AttendanceRecord> {
        self.record.as_ref()
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Instant after which the session may be discarded
    pub fn stale_after(&self, retention: Duration) -> DateTime<Utc> {
        let anchor = self
            .outcome
            .as_ref()
            .map(|o| o.expires_at())
            .unwrap_or(self.created_at);
        anchor + retention
    }

    /// `Idle | Unverified -> Evaluating`
    pub fn begin_evaluation(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Unverified => {
                self.state = SessionState::Evaluating;
                self.outcome = None;
                self.attempts += 1;
                Ok(())
            }
            from => Err(SessionError::InvalidTransition {
                from,
                action: "evaluate",
            }),
        }
    }

    /// `Evaluating -> Verified | Unverified`
    pub fn finish_evaluation(&mut self, outcome: VerificationOutcome) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Evaluating {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action: "finish evaluating",
            });
        }

        self.state = if outcome.is_verified() {
            SessionState::Verified
        } else {
            SessionState::Unverified
        };
        self.outcome = Some(outcome);
        Ok(self.state)
    }

    /// `Verified -> Committing`; hands back the outcome to commit
    pub fn begin_commit(&mut self) -> Result<VerificationOutcome, SessionError> {
        match (self.state, &self.outcome) {
            (SessionState::Verified, Some(outcome)) => {
                let outcome = outcome.clone();
                self.state = SessionState::Committing;
                Ok(outcome)
            }
            (from, _) => Err(SessionError::InvalidTransition {
                from,
                action: "commit",
            }),
        }
    }

    /// `Committing -> Committed | CommitFailed`
    pub fn finish_commit(
        &mut self,
        result: Result<AttendanceRecord, CommitError>,
    ) -> Result<AttendanceRecord, SessionError> {
        if self.state != SessionState::Committing {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action: "finish committing",
            });
        }

        match result {
            Ok(record) => {
                self.state = SessionState::Committed;
                self.record = Some(record.clone());
                Ok(record)
            }
            Err(e) => {
                self.state = SessionState::CommitFailed;
                self.failure = Some(e.clone());
                Err(SessionError::Commit(e))
            }
        }
    }

    /// Result of a repeated commit on a terminal session
    ///
    /// A committed session answers `AlreadyMarked`; a failed one repeats its
    /// failure. Neither touches the ledger.
    pub fn replay_commit(&self) -> SessionError {
        match (&self.record, &self.failure) {
            (Some(record), _) => SessionError::Commit(CommitError::AlreadyMarked { key: record.key() }),
            (None, Some(failure)) => SessionError::Commit(failure.clone()),
            (None, None) => SessionError::InvalidTransition {
                from: self.state,
                action: "commit",
            },
        }
    }

    /// The ledger key this session would write
    pub fn key_on(&self, date: chrono::NaiveDate) -> AttendanceKey {
        AttendanceKey::new(self.subject_id.clone(), self.course_id.clone(), date)
    }
}
