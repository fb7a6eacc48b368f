//! Integration tests for presence-ledger
//!
//! These tests exercise the commit rules and the once-per-day guarantee.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use presence_domain::traits::{AttendanceLedger, CommitRequest};
use presence_domain::{
    AttendanceKey, AttendanceStatus, AttendanceWindow, CommitError, ConfidenceTier, Coordinates,
    LocationSnapshot, MarkedBy, Method, VerificationOutcome,
};
use presence_ledger::SqliteLedger;

fn issued() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 9, 2, 0).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 14).unwrap()
}

fn verified_outcome() -> VerificationOutcome {
    let snapshot = LocationSnapshot::empty()
        .with_coordinates(Coordinates::new(37.4275, -122.1697, 6.0))
        .with_wifi("Lab-201");
    VerificationOutcome::verified(
        Method::Gps,
        ConfidenceTier::High,
        "GPS position inside classroom geofence (9.0 m margin)".to_string(),
        snapshot,
        issued(),
        Duration::seconds(120),
    )
}

fn create_request(subject: &str, outcome: VerificationOutcome, now: DateTime<Utc>) -> CommitRequest {
    CommitRequest {
        outcome,
        subject_id: subject.to_string(),
        course_id: "CS201".to_string(),
        today: today(),
        now,
        marked_by: MarkedBy::Subject,
        window: None,
    }
}

#[test]
fn test_commit_and_find() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let now = issued() + Duration::seconds(10);

    let record = ledger
        .commit(create_request("s-1", verified_outcome(), now))
        .unwrap();

    assert_eq!(record.status, AttendanceStatus::Present);
    assert_eq!(record.verification_method, Method::Gps);
    assert_eq!(record.marked_at, now);
    assert_eq!(record.evidence_digest.summary, "gps(±6m) wifi");

    let found = ledger.find(&record.key()).unwrap();
    assert_eq!(found, Some(record));
}

#[test]
fn test_second_commit_is_already_marked() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let now = issued() + Duration::seconds(5);

    ledger
        .commit(create_request("s-1", verified_outcome(), now))
        .unwrap();
    let second = ledger.commit(create_request("s-1", verified_outcome(), now + Duration::seconds(1)));

    assert_eq!(
        second,
        Err(CommitError::AlreadyMarked {
            key: AttendanceKey::new("s-1", "CS201", today())
        })
    );
    assert_eq!(ledger.count().unwrap(), 1);
}

#[test]
fn test_not_verified_is_rejected() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let outcome = VerificationOutcome::unverified(
        "GPS unavailable; WiFi unavailable; no Bluetooth beacons detected".to_string(),
        LocationSnapshot::empty(),
        issued(),
        Duration::seconds(120),
    );

    let result = ledger.commit(create_request("s-1", outcome, issued()));

    assert_eq!(result, Err(CommitError::NotVerified));
    assert_eq!(ledger.count().unwrap(), 0);
}

#[test]
fn test_expired_proof_is_rejected() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let outcome = verified_outcome();
    let expiry = outcome.expires_at();

    let result = ledger.commit(create_request("s-1", outcome, expiry + Duration::seconds(1)));

    assert_eq!(result, Err(CommitError::ExpiredProof { expired_at: expiry }));
    assert_eq!(ledger.count().unwrap(), 0);
}

#[test]
fn test_commit_at_exact_expiry_succeeds() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let outcome = verified_outcome();
    let expiry = outcome.expires_at();

    assert!(ledger.commit(create_request("s-1", outcome, expiry)).is_ok());
}

#[test]
fn test_not_verified_checked_before_expiry() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let outcome = VerificationOutcome::unverified(
        "no signal".to_string(),
        LocationSnapshot::empty(),
        issued(),
        Duration::seconds(120),
    );

    let result = ledger.commit(create_request("s-1", outcome, issued() + Duration::hours(1)));
    assert_eq!(result, Err(CommitError::NotVerified));
}

#[test]
fn test_late_status_and_proctor_marker() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let mut request = create_request("s-2", verified_outcome(), issued() + Duration::seconds(30));
    request.marked_by = MarkedBy::Proctor("t-7".to_string());
    request.window = Some(AttendanceWindow {
        opens_at: Utc.with_ymd_and_hms(2026, 9, 14, 8, 45, 0).unwrap(),
        grace: Duration::minutes(10),
    });

    let record = ledger.commit(request).unwrap();
    assert_eq!(record.status, AttendanceStatus::Late);

    let found = ledger.find(&record.key()).unwrap().unwrap();
    assert_eq!(found.marked_by, MarkedBy::Proctor("t-7".to_string()));
    assert_eq!(found.status, AttendanceStatus::Late);
}

#[test]
fn test_records_for_course_day() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let base = issued() + Duration::seconds(1);

    for (offset, subject) in ["s-3", "s-1", "s-2"].iter().enumerate() {
        ledger
            .commit(create_request(subject, verified_outcome(), base + Duration::seconds(offset as i64)))
            .unwrap();
    }

    let records = ledger.records_for("CS201", today()).unwrap();
    let subjects: Vec<&str> = records.iter().map(|r| r.subject_id.as_str()).collect();
    assert_eq!(subjects, vec!["s-3", "s-1", "s-2"]);

    let other_day = today().succ_opt().unwrap();
    assert!(ledger.records_for("CS201", other_day).unwrap().is_empty());
    assert!(ledger.records_for("CS999", today()).unwrap().is_empty());
}

#[test]
fn test_missing_key_is_none() {
    let ledger = SqliteLedger::new(":memory:").unwrap();
    let key = AttendanceKey::new("nobody", "CS201", today());
    assert_eq!(ledger.find(&key).unwrap(), None);
}

#[test]
fn test_concurrent_commits_single_winner_shared_ledger() {
    let ledger = Arc::new(SqliteLedger::new(":memory:").unwrap());
    let barrier = Arc::new(Barrier::new(8));
    let now = issued() + Duration::seconds(3);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.commit(create_request("s-1", verified_outcome(), now))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(CommitError::AlreadyMarked { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
    assert_eq!(ledger.count().unwrap(), 1);
}

#[test]
fn test_concurrent_commits_single_winner_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    // Create the schema once before racing
    SqliteLedger::new(&path).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let now = issued() + Duration::seconds(3);

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ledger = SqliteLedger::new(&path).unwrap();
                barrier.wait();
                ledger.commit(create_request("s-1", verified_outcome(), now))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(CommitError::AlreadyMarked { .. }))));

    let ledger = SqliteLedger::new(&path).unwrap();
    assert_eq!(ledger.count().unwrap(), 1);
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let record = {
        let ledger = SqliteLedger::new(&path).unwrap();
        ledger
            .commit(create_request("s-9", verified_outcome(), issued()))
            .unwrap()
    };

    let reopened = SqliteLedger::new(&path).unwrap();
    assert_eq!(reopened.find(&record.key()).unwrap(), Some(record));
}
