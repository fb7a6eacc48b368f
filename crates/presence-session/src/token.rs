//! Outcome tokens
//!
//! A verified outcome is handed to the client as a signed JWT naming the
//! session it belongs to. The token is a reference, not a capability: the
//! session table still holds the outcome, and expiry is judged by the
//! service clock rather than by the JWT library.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use presence_domain::{SessionId, VerificationOutcome};
use serde::{Deserialize, Serialize};

use crate::{PresenceSession, SessionError};

/// JWT claims for outcome tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeClaims {
    /// Session identifier
    pub sid: String,

    /// Subject identifier
    pub sub: String,

    /// Course identifier
    pub course: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Outcome expiry (Unix epoch seconds)
    pub exp: i64,
}

impl OutcomeClaims {
    /// The session this token refers to
    pub fn session_id(&self) -> Result<SessionId, SessionError> {
        SessionId::from_string(&self.sid).map_err(|_| SessionError::InvalidToken)
    }

    /// Whether the token's expiry has passed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

/// Issues and verifies outcome tokens
pub struct OutcomeTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl OutcomeTokens {
    /// Create a token authority with the given HMAC secret
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for a session's verified outcome
    pub fn issue(&self, session: &PresenceSession, outcome: &VerificationOutcome) -> Result<String, SessionError> {
        let claims = OutcomeClaims {
            sid: session.id().to_string(),
            sub: session.subject_id().to_string(),
            course: session.course_id().to_string(),
            iat: outcome.issued_at().timestamp(),
            exp: outcome.expires_at().timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Internal(format!("Failed to encode outcome token: {}", e)))
    }

    /// Verify a token's signature and extract its claims
    ///
    /// An expired but authentic token still verifies here.
    pub fn verify(&self, token: &str) -> Result<OutcomeClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let token_data = decode::<OutcomeClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| SessionError::InvalidToken)?;
        Ok(token_data.claims)
    }
}
