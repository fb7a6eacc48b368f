//! Verification outcomes
//!
//! An outcome is single-use and time-boxed. Whether it is verified is derived
//! from its method, so a verified outcome always names a method other than
//! [`Method::None`].

use chrono::{DateTime, Duration, Utc};

use crate::{ConfidenceTier, LocationSnapshot};

/// The signal that established presence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GPS fix fully inside the fence
    Gps,
    /// Associated with an expected WiFi network
    Wifi,
    /// At least one expected beacon detected
    Beacon,
    /// Nothing matched
    None,
}

impl Method {
    /// Get the method name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Gps => "GPS",
            Method::Wifi => "WIFI",
            Method::Beacon => "BEACON",
            Method::None => "NONE",
        }
    }

    /// Parse a method from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GPS" => Some(Method::Gps),
            "WIFI" => Some(Method::Wifi),
            "BEACON" => Some(Method::Beacon),
            "NONE" => Some(Method::None),
            _ => None,
        }
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    method: Method,
    confidence: ConfidenceTier,
    reason: String,
    snapshot: LocationSnapshot,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Create a verified outcome
    ///
    /// # Panics
    /// Panics if `method` is [`Method::None`]
    pub fn verified(
        method: Method,
        confidence: ConfidenceTier,
        reason: String,
        snapshot: LocationSnapshot,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        assert!(method != Method::None, "A verified outcome requires a method");

        Self {
            method,
            confidence,
            reason,
            snapshot,
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    /// Create a not-verified outcome (method NONE, confidence LOW)
    pub fn unverified(
        reason: String,
        snapshot: LocationSnapshot,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Self {
        Self {
            method: Method::None,
            confidence: ConfidenceTier::Low,
            reason,
            snapshot,
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    /// Whether presence was established
    pub fn is_verified(&self) -> bool {
        self.method != Method::None
    }

    /// Method used
    pub fn method(&self) -> Method {
        self.method
    }

    /// Confidence tier
    pub fn confidence(&self) -> ConfidenceTier {
        self.confidence
    }

    /// Human-readable diagnostic
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The evidence the verdict was based on
    pub fn snapshot(&self) -> &LocationSnapshot {
        &self.snapshot
    }

    /// Issuance time
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// End of the validity window
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True once `now` is strictly after `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
