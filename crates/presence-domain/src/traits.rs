//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the presence core and its
//! infrastructure. Implementations live in other crates.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    AttendanceKey, AttendanceRecord, AttendanceWindow, CommitError, CoursePolicy, MarkedBy,
    VerificationOutcome,
};

/// Everything the ledger needs to turn an outcome into a record
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// The outcome being committed
    pub outcome: VerificationOutcome,
    /// Subject being marked
    pub subject_id: String,
    /// Course being attended
    pub course_id: String,
    /// Calendar day of the mark
    pub today: NaiveDate,
    /// Commit time, compared against the outcome's expiry
    pub now: DateTime<Utc>,
    /// Who is marking
    pub marked_by: MarkedBy,
    /// Class window for present/late derivation
    pub window: Option<AttendanceWindow>,
}

impl CommitRequest {
    /// The ledger key this request would occupy
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey::new(self.subject_id.clone(), self.course_id.clone(), self.today)
    }
}

/// The commit authority for attendance records
///
/// Implemented by the infrastructure layer (presence-ledger). Implementations
/// must make the existence check and the insert a single atomic operation so
/// that concurrent commits for one key have exactly one winner.
pub trait AttendanceLedger {
    /// Error type for read operations
    type Error: std::fmt::Display;

    /// Commit an outcome, creating exactly one record per key
    fn commit(&self, request: CommitRequest) -> Result<AttendanceRecord, CommitError>;

    /// Look up the record for a key
    fn find(&self, key: &AttendanceKey) -> Result<Option<AttendanceRecord>, Self::Error>;

    /// All records of a course on a day, ordered by mark time
    fn records_for(
        &self,
        course_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, Self::Error>;
}

/// Read-only source of course geofences
///
/// Implemented by whoever owns course administration.
pub trait GeofenceProvider {
    /// The active policy for a course, if one is configured
    fn course_policy(&self, course_id: &str) -> Option<CoursePolicy>;

    /// All courses with an active geofence
    fn course_ids(&self) -> Vec<String>;
}
