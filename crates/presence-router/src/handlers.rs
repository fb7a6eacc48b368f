//! HTTP request handlers for the presence service.
//!
//! Implements the evaluate/commit calls, read-only lookups, and the health
//! check using axum. Request and response bodies use camelCase JSON.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use chrono::{DateTime, NaiveDate, Utc};
use presence_domain::traits::{AttendanceLedger, GeofenceProvider};
use presence_domain::{AttendanceKey, AttendanceRecord, CommitError, Coordinates, SessionId};
use presence_ledger::SqliteLedger;
use presence_session::{EvaluateRequest, Evaluation, PresenceService, SessionError, SnapshotHints};
use presence_signals::WifiNetwork;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::registry::GeofenceRegistry;

/// The service as wired for HTTP
pub type Service = PresenceService<SqliteLedger, GeofenceRegistry>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Presence service (sessions, evaluator, ledger, geofences)
    pub service: Arc<Service>,
}

/// GPS reading reported by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsHint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy: f64,
}

/// A visible WiFi network reported by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiHint {
    /// Network identifier
    pub id: String,
    /// Signal strength in dBm
    #[serde(default)]
    pub rssi_dbm: Option<i32>,
}

/// Client-reported readings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotHintsBody {
    /// GPS fix
    #[serde(default)]
    pub gps: Option<GpsHint>,
    /// Visible networks
    #[serde(default)]
    pub wifi: Option<Vec<WifiHint>>,
    /// Detected beacon identifiers
    #[serde(default)]
    pub beacons: Option<Vec<String>>,
}

impl From<SnapshotHintsBody> for SnapshotHints {
    fn from(body: SnapshotHintsBody) -> Self {
        SnapshotHints {
            gps: body
                .gps
                .map(|g| Coordinates::new(g.latitude, g.longitude, g.accuracy)),
            wifi: body.wifi.map(|networks| {
                networks
                    .into_iter()
                    .map(|n| WifiNetwork::new(n.id, n.rssi_dbm))
                    .collect()
            }),
            beacons: body.beacons,
        }
    }
}

/// `POST /presence/evaluate` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateBody {
    /// Course being attended
    pub course_id: String,
    /// Authenticated subject
    pub subject_id: String,
    /// Proctor marking on the subject's behalf
    #[serde(default)]
    pub proctor_id: Option<String>,
    /// Unverified session to retry
    #[serde(default)]
    pub session_id: Option<String>,
    /// Client-reported readings
    #[serde(default)]
    pub snapshot_hints: Option<SnapshotHintsBody>,
}

/// How each signal source settled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReportBody {
    /// GPS status
    pub gps: String,
    /// WiFi status
    pub wifi: String,
    /// Beacon status
    pub beacon: String,
}

/// `POST /presence/evaluate` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    /// Session the outcome belongs to
    pub session_id: String,
    /// Whether presence was established
    pub verified: bool,
    /// GPS, WIFI, BEACON or NONE
    pub method: String,
    /// LOW, MEDIUM or HIGH
    pub confidence: String,
    /// Human-readable diagnostic
    pub reason: String,
    /// Commit token, present only when verified
    pub outcome_token: Option<String>,
    /// End of the outcome's validity window
    pub expires_at: DateTime<Utc>,
    /// Per-source acquisition status
    pub signals: SignalReportBody,
}

impl From<Evaluation> for EvaluateResponse {
    fn from(evaluation: Evaluation) -> Self {
        let outcome = &evaluation.outcome;
        let report = &outcome.snapshot().report;
        EvaluateResponse {
            session_id: evaluation.session_id.to_string(),
            verified: outcome.is_verified(),
            method: outcome.method().as_str().to_string(),
            confidence: outcome.confidence().as_str().to_string(),
            reason: outcome.reason().to_string(),
            outcome_token: evaluation.token.clone(),
            expires_at: outcome.expires_at(),
            signals: SignalReportBody {
                gps: report.gps.as_str().to_string(),
                wifi: report.wifi.as_str().to_string(),
                beacon: report.beacon.as_str().to_string(),
            },
        }
    }
}

/// `POST /presence/commit` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitBody {
    /// Token from a verified evaluation
    pub outcome_token: String,
}

/// An attendance record as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    /// Record identifier
    pub record_id: String,
    /// Subject identifier
    pub subject_id: String,
    /// Course identifier
    pub course_id: String,
    /// Calendar day
    pub date: NaiveDate,
    /// present or late
    pub status: String,
    /// Commit time
    pub marked_at: DateTime<Utc>,
    /// subject or proctor:<id>
    pub marked_by: String,
    /// Method of the committed outcome
    pub verification_method: String,
    /// Evidence summary and fingerprint
    pub evidence: String,
}

impl From<AttendanceRecord> for RecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        RecordResponse {
            record_id: record.record_id.to_string(),
            evidence: record.evidence_digest.to_string(),
            status: record.status.as_str().to_string(),
            marked_by: record.marked_by.to_storage(),
            verification_method: record.verification_method.as_str().to_string(),
            subject_id: record.subject_id,
            course_id: record.course_id,
            date: record.date,
            marked_at: record.marked_at,
        }
    }
}

/// One configured course
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceSummaryResponse {
    /// Course identifier
    pub course_id: String,
    /// Room label
    pub room: Option<String>,
    /// circle or polygon
    pub fence: String,
    /// Whether present/late is derived from a start time
    pub scheduled: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Number of configured courses
    pub courses: usize,
    /// Ledger status: "ok" or "unavailable"
    pub ledger: String,
    /// Live presence sessions
    pub sessions: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Presence service error
    Session(SessionError),
    /// Malformed request
    BadRequest(String),
    /// Nothing at the requested path
    NotFound(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Session(e) => {
                let status = match e {
                    SessionError::Commit(CommitError::NotVerified) => StatusCode::UNPROCESSABLE_ENTITY,
                    SessionError::Commit(CommitError::ExpiredProof { .. }) => StatusCode::GONE,
                    SessionError::Commit(CommitError::AlreadyMarked { .. }) => StatusCode::CONFLICT,
                    SessionError::Commit(CommitError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                    SessionError::ConfigurationMissing(_) => StatusCode::NOT_FOUND,
                    SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
                    SessionError::InvalidTransition { .. } => StatusCode::CONFLICT,
                    SessionError::InvalidToken => StatusCode::UNAUTHORIZED,
                    SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code())
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, "Request failed: {:?}", self);
        }

        let message = match self {
            AppError::Session(e) => e.to_string(),
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::Internal(msg) => msg,
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// POST /presence/evaluate - Acquire and evaluate presence
///
/// An unverified outcome is a normal 200 response with a diagnostic reason.
async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateBody>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let Json(body) = body?;
    let session_id = body
        .session_id
        .as_deref()
        .map(SessionId::from_string)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let request = EvaluateRequest {
        course_id: body.course_id,
        subject_id: body.subject_id,
        proctor_id: body.proctor_id,
        session_id,
        hints: body.snapshot_hints.unwrap_or_default().into(),
    };

    let evaluation = state.service.evaluate(request).await?;
    Ok(Json(evaluation.into()))
}

/// POST /presence/commit - Commit a verified outcome
async fn commit(
    State(state): State<AppState>,
    body: Result<Json<CommitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordResponse>), AppError> {
    let Json(body) = body?;
    let record = state.service.commit(&body.outcome_token).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /attendance/:course_id/:subject_id/:date - Ledger lookup
async fn get_attendance(
    State(state): State<AppState>,
    Path((course_id, subject_id, date)): Path<(String, String, String)>,
) -> Result<Json<RecordResponse>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("Invalid date {:?}: {}", date, e)))?;
    let key = AttendanceKey::new(subject_id, course_id, date);

    let ledger = Arc::clone(state.service.ledger());
    let lookup = key.clone();
    let record = tokio::task::spawn_blocking(move || ledger.find(&lookup))
        .await
        .map_err(|e| AppError::Internal(format!("Lookup task failed: {}", e)))?
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("No attendance record for {}", key)))?;

    Ok(Json(record.into()))
}

/// GET /geofences - Configured courses
async fn list_geofences(State(state): State<AppState>) -> Json<Vec<GeofenceSummaryResponse>> {
    let summaries = state
        .service
        .geofences()
        .summaries()
        .into_iter()
        .map(|s| GeofenceSummaryResponse {
            course_id: s.course_id,
            room: s.room,
            fence: s.fence_kind.to_string(),
            scheduled: s.scheduled,
        })
        .collect();
    Json(summaries)
}

/// GET /health - Service health
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let courses = state.service.geofences().course_ids().len();
    let ledger = Arc::clone(state.service.ledger());
    let ledger_ok = matches!(
        tokio::task::spawn_blocking(move || ledger.count()).await,
        Ok(Ok(_))
    );

    let status = if !ledger_ok {
        "unhealthy"
    } else if courses == 0 {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        courses,
        ledger: if ledger_ok { "ok" } else { "unavailable" }.to_string(),
        sessions: state.service.sessions().len(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/presence/evaluate", post(evaluate))
        .route("/presence/commit", post(commit))
        .route("/attendance/:course_id/:subject_id/:date", get(get_attendance))
        .route("/geofences", get(list_geofences))
        .route("/health", get(health_check))
        .with_state(state)
}
