//! The evaluate/commit orchestrator

use std::sync::Arc;

use presence_domain::traits::{AttendanceLedger, CommitRequest, GeofenceProvider};
use presence_domain::{
    AttendanceRecord, CommitError, Coordinates, MarkedBy, SessionId, VerificationOutcome,
};
use presence_evaluator::PresenceEvaluator;
use presence_signals::{HintSource, SignalAggregator, WifiNetwork};
use tracing::{debug, info, warn};

use crate::{
    Clock, OutcomeTokens, PresenceSession, ServiceConfig, SessionError, SessionState,
    SessionTable, SystemClock,
};

/// Client-reported readings standing in for sensor sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotHints {
    /// GPS fix
    pub gps: Option<Coordinates>,
    /// Visible WiFi networks
    pub wifi: Option<Vec<WifiNetwork>>,
    /// Detected beacon identifiers
    pub beacons: Option<Vec<String>>,
}

/// Input to [`PresenceService::evaluate`]
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    /// Course being attended
    pub course_id: String,
    /// Authenticated subject
    pub subject_id: String,
    /// Proctor marking on the subject's behalf
    pub proctor_id: Option<String>,
    /// Unverified session to retry; a new session is started when absent
    pub session_id: Option<SessionId>,
    /// Client-reported readings
    pub hints: SnapshotHints,
}

impl EvaluateRequest {
    /// A fresh attempt by the subject themselves
    pub fn new(course_id: impl Into<String>, subject_id: impl Into<String>, hints: SnapshotHints) -> Self {
        Self {
            course_id: course_id.into(),
            subject_id: subject_id.into(),
            proctor_id: None,
            session_id: None,
            hints,
        }
    }
}

/// Result of one evaluation
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Session the outcome belongs to
    pub session_id: SessionId,
    /// State the session moved to
    pub state: SessionState,
    /// The verdict
    pub outcome: VerificationOutcome,
    /// Commit token; only verified outcomes receive one
    pub token: Option<String>,
}

/// Runs presence sessions against a ledger and a geofence provider
pub struct PresenceService<L, P> {
    ledger: Arc<L>,
    geofences: P,
    evaluator: PresenceEvaluator,
    tokens: OutcomeTokens,
    sessions: Arc<SessionTable>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

impl<L, P> PresenceService<L, P>
where
    L: AttendanceLedger + Send + Sync + 'static,
    P: GeofenceProvider + Send + Sync,
{
    /// Create a service using the wall clock
    pub fn new(ledger: Arc<L>, geofences: P, tokens: OutcomeTokens, config: ServiceConfig) -> Self {
        Self {
            ledger,
            geofences,
            evaluator: PresenceEvaluator::new(config.evaluator.clone()),
            tokens,
            sessions: Arc::new(SessionTable::new()),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The attendance ledger
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// The geofence provider
    pub fn geofences(&self) -> &P {
        &self.geofences
    }

    /// The live session table
    pub fn sessions(&self) -> Arc<SessionTable> {
        Arc::clone(&self.sessions)
    }

    /// The service clock
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Acquire signals and evaluate presence for a course
    ///
    /// A missing geofence is a configuration error, distinct from a failed
    /// verification. An unverified outcome is a normal result.
    pub async fn evaluate(&self, request: EvaluateRequest) -> Result<Evaluation, SessionError> {
        let policy = self
            .geofences
            .course_policy(&request.course_id)
            .ok_or_else(|| SessionError::ConfigurationMissing(request.course_id.clone()))?;

        let shared = match request.session_id {
            Some(id) => {
                let shared = self.sessions.get(id).ok_or(SessionError::UnknownSession(id))?;
                {
                    let session = shared.lock().await;
                    if session.subject_id() != request.subject_id || session.course_id() != request.course_id {
                        return Err(SessionError::UnknownSession(id));
                    }
                }
                shared
            }
            None => {
                let marked_by = match request.proctor_id {
                    Some(proctor) => MarkedBy::Proctor(proctor),
                    None => MarkedBy::Subject,
                };
                self.sessions.insert(PresenceSession::new(
                    request.subject_id.clone(),
                    request.course_id.clone(),
                    marked_by,
                    self.clock.now(),
                ))
            }
        };

        let mut session = shared.lock().await;
        session.begin_evaluation()?;

        let hints = request.hints;
        let aggregator = SignalAggregator::new(
            HintSource::gps(hints.gps),
            HintSource::wifi(hints.wifi),
            HintSource::beacons(hints.beacons),
            self.config.acquisition,
        );
        let snapshot = aggregator.acquire().await;

        let outcome = self.evaluator.evaluate(&snapshot, &policy.geofence, self.clock.now());
        let state = session.finish_evaluation(outcome.clone())?;

        let token = if outcome.is_verified() {
            Some(self.tokens.issue(&session, &outcome)?)
        } else {
            None
        };

        info!(
            session_id = %session.id(),
            course_id = %session.course_id(),
            attempt = session.attempts(),
            verified = outcome.is_verified(),
            method = outcome.method().as_str(),
            confidence = outcome.confidence().as_str(),
            "Presence evaluated"
        );

        Ok(Evaluation {
            session_id: session.id(),
            state,
            outcome,
            token,
        })
    }

    /// Commit the verified outcome referenced by `token`
    ///
    /// Commits on one session are serialized. Once a session is terminal a
    /// repeat answers from the session without touching the ledger.
    pub async fn commit(&self, token: &str) -> Result<AttendanceRecord, SessionError> {
        let claims = self.tokens.verify(token)?;
        let session_id = claims.session_id()?;

        let Some(shared) = self.sessions.get(session_id) else {
            // Swept sessions are long expired; anything else was never ours
            if claims.is_expired_at(self.clock.now()) {
                let expired_at = claims.expires_at().ok_or(SessionError::InvalidToken)?;
                return Err(CommitError::ExpiredProof { expired_at }.into());
            }
            warn!(session_id = %session_id, "Outcome token names an unknown session");
            return Err(SessionError::InvalidToken);
        };

        let mut session = shared.lock_owned().await;
        if session.subject_id() != claims.sub || session.course_id() != claims.course {
            return Err(SessionError::InvalidToken);
        }
        if session.state().is_terminal() {
            debug!(session_id = %session_id, state = %session.state(), "Replaying terminal session");
            return Err(session.replay_commit());
        }

        let outcome = session.begin_commit()?;
        let now = self.clock.now();
        let today = now.with_timezone(&self.config.utc_offset).date_naive();
        let window = self
            .geofences
            .course_policy(session.course_id())
            .and_then(|policy| policy.schedule)
            .and_then(|schedule| schedule.window_on(today, self.config.utc_offset));

        let request = CommitRequest {
            outcome,
            subject_id: session.subject_id().to_string(),
            course_id: session.course_id().to_string(),
            today,
            now,
            marked_by: session.marked_by().clone(),
            window,
        };

        // The write and the transition finish together even if the caller goes away
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || {
            let result = ledger.commit(request);
            if let Err(e) = &result {
                info!(session_id = %session_id, code = e.code(), "Commit rejected");
            }
            session.finish_commit(result)
        })
        .await
        .unwrap_or_else(|e| Err(SessionError::Internal(format!("Commit task failed: {}", e))))
    }
}
