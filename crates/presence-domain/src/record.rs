//! Durable attendance records

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

use crate::{EvidenceDigest, Method, RecordId};

/// Attendance status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    /// Marked within the grace window
    Present,
    /// Marked after the grace window
    Late,
    /// Materialised by reconciliation; never produced by a commit
    Absent,
}

impl AttendanceStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "late" => Some(AttendanceStatus::Late),
            "absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

/// Who performed the mark
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkedBy {
    /// The subject marked their own attendance
    Subject,
    /// A proctor marked on the subject's behalf
    Proctor(String),
}

impl MarkedBy {
    /// Storage form: `subject` or `proctor:<id>`
    pub fn to_storage(&self) -> String {
        match self {
            MarkedBy::Subject => "subject".to_string(),
            MarkedBy::Proctor(id) => format!("proctor:{}", id),
        }
    }

    /// Parse the storage form
    pub fn from_storage(s: &str) -> Option<Self> {
        if s == "subject" {
            return Some(MarkedBy::Subject);
        }
        match s.strip_prefix("proctor:") {
            Some(id) if !id.is_empty() => Some(MarkedBy::Proctor(id.to_string())),
            _ => None,
        }
    }
}

/// The ledger's uniqueness key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttendanceKey {
    /// Subject identifier
    pub subject_id: String,
    /// Course identifier
    pub course_id: String,
    /// Calendar day
    pub date: NaiveDate,
}

impl AttendanceKey {
    /// Create a new key
    pub fn new(subject_id: impl Into<String>, course_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            subject_id: subject_id.into(),
            course_id: course_id.into(),
            date,
        }
    }
}

impl fmt::Display for AttendanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject_id, self.course_id, self.date)
    }
}

/// A class session's opening time and grace period, resolved to a day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceWindow {
    /// When the class session starts
    pub opens_at: DateTime<Utc>,
    /// Grace period after the start
    pub grace: Duration,
}

impl AttendanceWindow {
    /// Status for a mark made at `marked_at`
    ///
    /// Never returns [`AttendanceStatus::Absent`].
    pub fn status_for(&self, marked_at: DateTime<Utc>) -> AttendanceStatus {
        if marked_at <= self.opens_at + self.grace {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Late
        }
    }
}

/// Status for a mark, given an optional window
pub fn derive_status(window: Option<&AttendanceWindow>, marked_at: DateTime<Utc>) -> AttendanceStatus {
    window
        .map(|w| w.status_for(marked_at))
        .unwrap_or(AttendanceStatus::Present)
}

/// A durable attendance record
///
/// Immutable once created; administrative correction happens elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    /// Unique identifier
    pub record_id: RecordId,
    /// Subject identifier
    pub subject_id: String,
    /// Course identifier
    pub course_id: String,
    /// Calendar day
    pub date: NaiveDate,
    /// Present or late
    pub status: AttendanceStatus,
    /// When the commit happened
    pub marked_at: DateTime<Utc>,
    /// Who marked it
    pub marked_by: MarkedBy,
    /// Method of the outcome that was committed
    pub verification_method: Method,
    /// Summary of the evidence used
    pub evidence_digest: EvidenceDigest,
}

impl AttendanceRecord {
    /// The ledger key of this record
    pub fn key(&self) -> AttendanceKey {
        AttendanceKey::new(self.subject_id.clone(), self.course_id.clone(), self.date)
    }
}
