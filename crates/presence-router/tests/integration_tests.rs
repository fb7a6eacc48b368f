//! Integration tests for the presence HTTP surface

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use presence_ledger::SqliteLedger;
use presence_router::{
    config::RouterConfig,
    handlers::{
        create_router, AppState, ErrorResponse, EvaluateResponse, GeofenceSummaryResponse,
        HealthCheckResponse, RecordResponse,
    },
    registry::GeofenceRegistry,
};
use presence_session::{ManualClock, OutcomeTokens, PresenceService};
use serde::de::DeserializeOwned;
use tower::ServiceExt; // for oneshot

/// Helper to create test application state on a controllable clock
fn create_test_state() -> (AppState, Arc<ManualClock>) {
    let config = RouterConfig::default_test_config();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 9, 14, 9, 4, 0).unwrap()));

    let service = PresenceService::new(
        Arc::new(SqliteLedger::new(":memory:").unwrap()),
        GeofenceRegistry::from_config(&config.courses).unwrap(),
        OutcomeTokens::new(&config.token_secret),
        config.service_config().unwrap(),
    )
    .with_clock(clock.clone());

    (
        AppState {
            service: Arc::new(service),
        },
        clock,
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap()
}

const IN_ROOM: &str = r#"{
    "courseId": "CS201",
    "subjectId": "s-1",
    "snapshotHints": {
        "gps": { "latitude": 37.4275, "longitude": -122.1697, "accuracy": 5.0 }
    }
}"#;

#[tokio::test]
async fn test_health_check_endpoint() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthCheckResponse = parse(&body);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.courses, 1);
    assert_eq!(health.ledger, "ok");
    assert_eq!(health.sessions, 0);
}

#[tokio::test]
async fn test_evaluate_and_commit() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, body) = send(&app, post_json("/presence/evaluate", IN_ROOM)).await;
    assert_eq!(status, StatusCode::OK);

    let evaluation: EvaluateResponse = parse(&body);
    assert!(evaluation.verified);
    assert_eq!(evaluation.method, "GPS");
    assert_eq!(evaluation.confidence, "HIGH");
    assert_eq!(evaluation.signals.gps, "acquired");
    assert_eq!(evaluation.signals.wifi, "failed");
    let token = evaluation.outcome_token.unwrap();

    let commit = format!(r#"{{"outcomeToken": "{}"}}"#, token);
    let (status, body) = send(&app, post_json("/presence/commit", &commit)).await;
    assert_eq!(status, StatusCode::CREATED);

    let record: RecordResponse = parse(&body);
    assert_eq!(record.status, "present");
    assert_eq!(record.marked_by, "subject");
    assert_eq!(record.verification_method, "GPS");
    assert!(record.evidence.starts_with("gps(±5m)"));

    let (status, body) = send(&app, get("/attendance/CS201/s-1/2026-09-14")).await;
    assert_eq!(status, StatusCode::OK);
    let found: RecordResponse = parse(&body);
    assert_eq!(found.record_id, record.record_id);
}

#[tokio::test]
async fn test_commit_twice_returns_conflict() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (_, body) = send(&app, post_json("/presence/evaluate", IN_ROOM)).await;
    let token = parse::<EvaluateResponse>(&body).outcome_token.unwrap();
    let commit = format!(r#"{{"outcomeToken": "{}"}}"#, token);

    let (first, _) = send(&app, post_json("/presence/commit", &commit)).await;
    let (second, body) = send(&app, post_json("/presence/commit", &commit)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(parse::<ErrorResponse>(&body).code, "already_marked");
}

#[tokio::test]
async fn test_expired_commit_returns_gone() {
    let (state, clock) = create_test_state();
    let app = create_router(state);

    let (_, body) = send(&app, post_json("/presence/evaluate", IN_ROOM)).await;
    let token = parse::<EvaluateResponse>(&body).outcome_token.unwrap();

    clock.advance(Duration::minutes(3));

    let commit = format!(r#"{{"outcomeToken": "{}"}}"#, token);
    let (status, body) = send(&app, post_json("/presence/commit", &commit)).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(parse::<ErrorResponse>(&body).code, "expired_proof");
}

#[tokio::test]
async fn test_unverified_evaluation_is_ok_without_token() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let request = r#"{
        "courseId": "CS201",
        "subjectId": "s-2",
        "snapshotHints": { "wifi": [{ "id": "Lab-204", "rssiDbm": -40 }] }
    }"#;
    let (status, body) = send(&app, post_json("/presence/evaluate", request)).await;
    assert_eq!(status, StatusCode::OK);

    let evaluation: EvaluateResponse = parse(&body);
    assert!(!evaluation.verified);
    assert_eq!(evaluation.method, "NONE");
    assert_eq!(evaluation.confidence, "LOW");
    assert!(evaluation.outcome_token.is_none());
    assert!(evaluation.reason.contains("WiFi network did not match classroom"));
}

#[tokio::test]
async fn test_beacon_triangulation_over_http() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let request = r#"{
        "courseId": "CS201",
        "subjectId": "s-3",
        "snapshotHints": { "beacons": ["CS201-BEACON-001", "CS201-BEACON-002", "CS202-BEACON-001"] }
    }"#;
    let (_, body) = send(&app, post_json("/presence/evaluate", request)).await;

    let evaluation: EvaluateResponse = parse(&body);
    assert!(evaluation.verified);
    assert_eq!(evaluation.method, "BEACON");
    assert_eq!(evaluation.confidence, "HIGH");
}

#[tokio::test]
async fn test_unknown_course_is_configuration_missing() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let request = r#"{"courseId": "HIST101", "subjectId": "s-1"}"#;
    let (status, body) = send(&app, post_json("/presence/evaluate", request)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse::<ErrorResponse>(&body).code, "configuration_missing");
}

#[tokio::test]
async fn test_invalid_session_id_is_bad_request() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let request = r#"{"courseId": "CS201", "subjectId": "s-1", "sessionId": "nope"}"#;
    let (status, _) = send(&app, post_json("/presence/evaluate", request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, _) = send(&app, get("/attendance/CS201/s-1/2026-09-14")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/attendance/CS201/s-1/yesterday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_geofences() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, body) = send(&app, get("/geofences")).await;
    assert_eq!(status, StatusCode::OK);

    let courses: Vec<GeofenceSummaryResponse> = parse(&body);
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].course_id, "CS201");
    assert_eq!(courses[0].room.as_deref(), Some("Lab 201"));
    assert_eq!(courses[0].fence, "circle");
    assert!(courses[0].scheduled);
}

#[tokio::test]
async fn test_malformed_evaluate_body_is_bad_request() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, body) = send(&app, post_json("/presence/evaluate", r#"{"subjectId": "s-1"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let error: ErrorResponse = parse(&body);
    assert_eq!(error.code, "bad_request");
    assert!(error.error.contains("courseId"));
}

#[tokio::test]
async fn test_malformed_commit_body_is_bad_request() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let (status, body) = send(&app, post_json("/presence/commit", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "bad_request");

    // Not JSON at all, and JSON without the content type
    let (status, body) = send(&app, post_json("/presence/commit", "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "bad_request");

    let request = Request::builder()
        .method("POST")
        .uri("/presence/commit")
        .body(Body::from(r#"{"outcomeToken": "x"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse::<ErrorResponse>(&body).code, "bad_request");
}

#[tokio::test]
async fn test_wrongly_typed_field_is_not_confused_with_failed_proof() {
    let (state, _clock) = create_test_state();
    let app = create_router(state);

    let request = r#"{"courseId": "CS201", "subjectId": 42}"#;
    let (status, body) = send(&app, post_json("/presence/evaluate", request)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_ne!(parse::<ErrorResponse>(&body).code, "not_verified");
}

#[tokio::test(flavor = "current_thread")]
async fn test_file_backed_reads_alongside_commit() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig::default_test_config();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 9, 14, 9, 4, 0).unwrap()));
    let service = PresenceService::new(
        Arc::new(SqliteLedger::new(dir.path().join("attendance.db")).unwrap()),
        GeofenceRegistry::from_config(&config.courses).unwrap(),
        OutcomeTokens::new(&config.token_secret),
        config.service_config().unwrap(),
    )
    .with_clock(clock);
    let app = create_router(AppState {
        service: Arc::new(service),
    });

    let (_, body) = send(&app, post_json("/presence/evaluate", IN_ROOM)).await;
    let token = parse::<EvaluateResponse>(&body).outcome_token.unwrap();
    let commit = format!(r#"{{"outcomeToken": "{}"}}"#, token);

    let mut reads = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let health_app = app.clone();
        reads.spawn(async move { send(&health_app, get("/health")).await });
        let attendance_app = app.clone();
        reads.spawn(async move { send(&attendance_app, get("/attendance/CS201/s-2/2026-09-14")).await });
    }
    let (status, _) = send(&app, post_json("/presence/commit", &commit)).await;
    assert_eq!(status, StatusCode::CREATED);

    while let Some(result) = reads.join_next().await {
        let (status, body) = result.unwrap();
        match status {
            StatusCode::OK => assert_eq!(parse::<HealthCheckResponse>(&body).ledger, "ok"),
            StatusCode::NOT_FOUND => assert_eq!(parse::<ErrorResponse>(&body).code, "not_found"),
            other => panic!("unexpected status {}", other),
        }
    }

    let (status, body) = send(&app, get("/attendance/CS201/s-1/2026-09-14")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<RecordResponse>(&body).status, "present");
}
