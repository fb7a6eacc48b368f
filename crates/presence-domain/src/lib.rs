//! Presence Domain Layer
//!
//! Core value types and collaborator traits for proof-of-presence attendance.
//! Every other crate in the workspace depends on this one; it performs no I/O.
//!
//! ## Key Concepts
//!
//! - **LocationSnapshot**: The evidence gathered for one evaluation attempt
//! - **Geofence**: The registered spatial and network boundary of a classroom
//! - **VerificationOutcome**: A time-boxed verdict over a snapshot
//! - **AttendanceRecord**: The durable, once-per-day result of a commit
//!
//! ## Architecture
//!
//! - Pure value types and decision helpers only
//! - Infrastructure implementations (SQLite ledger, signal sources, HTTP) live
//!   in other crates
//! - Trait definitions for every external interaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod confidence;
pub mod error;
pub mod evidence;
pub mod geofence;
pub mod ids;
pub mod outcome;
pub mod record;
pub mod snapshot;
pub mod traits;

// Re-exports for convenience
pub use confidence::ConfidenceTier;
pub use error::CommitError;
pub use evidence::EvidenceDigest;
pub use geofence::{ClassSchedule, CoursePolicy, FenceShape, GeoPoint, Geofence};
pub use ids::{RecordId, SessionId};
pub use outcome::{Method, VerificationOutcome};
pub use record::{AttendanceKey, AttendanceRecord, AttendanceStatus, AttendanceWindow, MarkedBy};
pub use snapshot::{AcquisitionReport, Coordinates, LocationSnapshot, SignalKind, SignalStatus};
