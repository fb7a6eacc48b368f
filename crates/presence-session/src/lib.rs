//! Presence Session
//!
//! Orchestrates one verification attempt from signal acquisition to ledger
//! commit.
//!
//! ## Flow
//!
//! 1. [`PresenceService::evaluate`] looks up the course geofence, acquires a
//!    snapshot, evaluates it, and moves the session to `Verified` or
//!    `Unverified`. Verified outcomes receive a signed outcome token.
//! 2. [`PresenceService::commit`] resolves the token to its session, locks it,
//!    and asks the ledger for a record. The session ends `Committed` or
//!    `CommitFailed` and is never written again.
//!
//! Sessions live in a [`SessionTable`]; a [`SessionSweeper`] drops them once
//! their outcome has expired and the retention period has passed.

#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod service;
mod state;
mod sweeper;
mod table;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ServiceConfig, SweeperConfig};
pub use error::SessionError;
pub use service::{EvaluateRequest, Evaluation, PresenceService, SnapshotHints};
pub use state::{PresenceSession, SessionState};
pub use sweeper::SessionSweeper;
pub use table::{SessionTable, SharedSession};
pub use token::{OutcomeClaims, OutcomeTokens};
