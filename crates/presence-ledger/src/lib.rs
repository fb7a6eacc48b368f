//! Presence Ledger
//!
//! SQLite-backed implementation of [`AttendanceLedger`].
//!
//! The ledger is the single commit authority for attendance. Its uniqueness
//! guarantee comes from a `UNIQUE (subject_id, course_id, date)` constraint and
//! an `INSERT ... ON CONFLICT DO NOTHING`, so the existence check and the
//! insert are one statement. Concurrent commits for the same key, from any
//! number of connections or processes, produce exactly one record.
//!
//! # Examples
//!
//! ```no_run
//! use presence_ledger::SqliteLedger;
//!
//! let ledger = SqliteLedger::new(":memory:").unwrap();
//! // Ledger is now ready for commits
//! ```

#![warn(missing_docs)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use presence_domain::record::derive_status;
use presence_domain::traits::{AttendanceLedger, CommitRequest};
use presence_domain::{
    AttendanceKey, AttendanceRecord, AttendanceStatus, CommitError, EvidenceDigest, MarkedBy,
    Method, RecordId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

/// Schema version stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "record_id, subject_id, course_id, date, status, marked_at, \
     marked_by, verification_method, evidence_summary, evidence_fingerprint";

/// Errors that can occur during ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The database was written by a newer schema
    #[error("Unsupported schema version {found} (expected at most {supported})")]
    UnsupportedSchema {
        /// Version found in the file
        found: i32,
        /// Highest version this build understands
        supported: i32,
    },

    /// A thread panicked while holding the connection
    #[error("Ledger connection lock poisoned")]
    Poisoned,
}

/// SQLite-based implementation of [`AttendanceLedger`]
///
/// # Thread Safety
///
/// The connection sits behind a mutex so one ledger can be shared across
/// threads. Separate ledgers opened on the same file are also safe; SQLite's
/// locking plus the unique constraint arbitrate between them.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) a ledger at the given path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // In-memory databases answer "memory"; either way the reply is unused
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), LedgerError> {
        let conn = self.lock()?;

        let found: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(LedgerError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(include_str!("schema.sql"))?;
        if found < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!(from = found, to = SCHEMA_VERSION, "Ledger schema initialized");
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Insert a record unless its key is taken; returns rows inserted
    fn insert(&self, record: &AttendanceRecord) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO attendance (record_id, subject_id, course_id, date, status, marked_at,
                                     marked_by, verification_method, evidence_summary, evidence_fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (subject_id, course_id, date) DO NOTHING",
            params![
                Self::record_id_to_bytes(record.record_id),
                &record.subject_id,
                &record.course_id,
                record.date.to_string(),
                record.status.as_str(),
                record.marked_at.timestamp_millis(),
                record.marked_by.to_storage(),
                record.verification_method.as_str(),
                &record.evidence_digest.summary,
                &record.evidence_digest.fingerprint,
            ],
        )?;
        Ok(inserted)
    }

    /// Number of records in the ledger
    pub fn count(&self) -> Result<usize, LedgerError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Convert RecordId to bytes for storage
    fn record_id_to_bytes(id: RecordId) -> Vec<u8> {
        id.value().to_be_bytes().to_vec()
    }

    /// Convert bytes to RecordId
    fn bytes_to_record_id(bytes: &[u8]) -> Result<RecordId, LedgerError> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidData(format!("Expected 16 bytes for RecordId, got {}", bytes.len()))
        })?;
        Ok(RecordId::from_value(u128::from_be_bytes(arr)))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
        fn invalid(column: usize, e: LedgerError) -> rusqlite::Error {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        }

        let id_bytes: Vec<u8> = row.get(0)?;
        let record_id = Self::bytes_to_record_id(&id_bytes).map_err(|e| invalid(0, e))?;

        let date: String = row.get(3)?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| invalid(3, LedgerError::InvalidData(format!("Bad date {}: {}", date, e))))?;

        let status: String = row.get(4)?;
        let status = AttendanceStatus::parse(&status)
            .ok_or_else(|| invalid(4, LedgerError::InvalidData(format!("Unknown status: {}", status))))?;

        let millis: i64 = row.get(5)?;
        let marked_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| invalid(5, LedgerError::InvalidData(format!("Bad timestamp: {}", millis))))?;

        let marked_by: String = row.get(6)?;
        let marked_by = MarkedBy::from_storage(&marked_by)
            .ok_or_else(|| invalid(6, LedgerError::InvalidData(format!("Unknown marker: {}", marked_by))))?;

        let method: String = row.get(7)?;
        let verification_method = Method::parse(&method)
            .ok_or_else(|| invalid(7, LedgerError::InvalidData(format!("Unknown method: {}", method))))?;

        Ok(AttendanceRecord {
            record_id,
            subject_id: row.get(1)?,
            course_id: row.get(2)?,
            date,
            status,
            marked_at,
            marked_by,
            verification_method,
            evidence_digest: EvidenceDigest {
                summary: row.get(8)?,
                fingerprint: row.get(9)?,
            },
        })
    }
}

impl AttendanceLedger for SqliteLedger {
    type Error = LedgerError;

    fn commit(&self, request: CommitRequest) -> Result<AttendanceRecord, CommitError> {
        let outcome = &request.outcome;
        if !outcome.is_verified() {
            return Err(CommitError::NotVerified);
        }
        if outcome.is_expired_at(request.now) {
            return Err(CommitError::ExpiredProof {
                expired_at: outcome.expires_at(),
            });
        }

        // Stored at millisecond precision; keep the returned record identical
        let marked_at =
            DateTime::<Utc>::from_timestamp_millis(request.now.timestamp_millis()).unwrap_or(request.now);

        let record = AttendanceRecord {
            record_id: RecordId::new(),
            subject_id: request.subject_id.clone(),
            course_id: request.course_id.clone(),
            date: request.today,
            status: derive_status(request.window.as_ref(), marked_at),
            marked_at,
            marked_by: request.marked_by.clone(),
            verification_method: outcome.method(),
            evidence_digest: EvidenceDigest::from_snapshot(outcome.snapshot()),
        };

        let inserted = self
            .insert(&record)
            .map_err(|e| CommitError::Storage(e.to_string()))?;
        if inserted == 0 {
            debug!(key = %request.key(), "Commit lost to an existing record");
            return Err(CommitError::AlreadyMarked { key: request.key() });
        }

        info!(
            record_id = %record.record_id,
            key = %record.key(),
            status = record.status.as_str(),
            method = record.verification_method.as_str(),
            "Attendance committed"
        );
        Ok(record)
    }

    fn find(&self, key: &AttendanceKey) -> Result<Option<AttendanceRecord>, Self::Error> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM attendance WHERE subject_id = ?1 AND course_id = ?2 AND date = ?3",
                    SELECT_COLUMNS
                ),
                params![&key.subject_id, &key.course_id, key.date.to_string()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn records_for(
        &self,
        course_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM attendance WHERE course_id = ?1 AND date = ?2 ORDER BY marked_at, record_id",
            SELECT_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![course_id, date.to_string()], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
