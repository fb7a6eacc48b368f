//! Location snapshots - the evidence gathered for one evaluation attempt
//!
//! A snapshot is created fresh for every attempt and never persisted. Each
//! signal is an explicit optional value so "absent" is never confused with
//! "zero" or "empty string".

use std::collections::BTreeSet;
use std::fmt;

/// A GPS fix with its reported accuracy radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Reported accuracy radius in meters (68% confidence circle)
    pub accuracy_m: f64,
}

impl Coordinates {
    /// Create a new GPS fix
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
        }
    }

    /// Check that the fix is finite, in range, and has a non-negative accuracy
    pub fn is_well_formed(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.accuracy_m.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy_m >= 0.0
    }
}

/// The three kinds of location signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalKind {
    /// Satellite positioning
    Gps,
    /// Associated WiFi network
    Wifi,
    /// Bluetooth proximity beacons
    Beacon,
}

impl SignalKind {
    /// Get the signal name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Gps => "gps",
            SignalKind::Wifi => "wifi",
            SignalKind::Beacon => "beacon",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a single source settled during acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalStatus {
    /// The source was never asked (snapshot built by hand)
    NotAttempted,
    /// A reading was obtained and used
    Acquired,
    /// The source answered but had nothing to report
    Empty,
    /// The source failed (permission denied, hardware absent, ...)
    Failed(String),
    /// The source did not answer within its budget
    TimedOut,
    /// The source answered with a reading that could not be trusted
    Malformed(String),
}

impl SignalStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::NotAttempted => "not_attempted",
            SignalStatus::Acquired => "acquired",
            SignalStatus::Empty => "empty",
            SignalStatus::Failed(_) => "failed",
            SignalStatus::TimedOut => "timed_out",
            SignalStatus::Malformed(_) => "malformed",
        }
    }
}

/// Per-source record of what happened during acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// GPS source status
    pub gps: SignalStatus,
    /// WiFi source status
    pub wifi: SignalStatus,
    /// Beacon source status
    pub beacon: SignalStatus,
}

impl Default for AcquisitionReport {
    fn default() -> Self {
        Self {
            gps: SignalStatus::NotAttempted,
            wifi: SignalStatus::NotAttempted,
            beacon: SignalStatus::NotAttempted,
        }
    }
}

impl AcquisitionReport {
    /// Status for a given signal kind
    pub fn status(&self, kind: SignalKind) -> &SignalStatus {
        match kind {
            SignalKind::Gps => &self.gps,
            SignalKind::Wifi => &self.wifi,
            SignalKind::Beacon => &self.beacon,
        }
    }
}

/// Evidence for one evaluation attempt
///
/// No-signal is a valid, evaluable state; it simply yields "not verified".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationSnapshot {
    /// GPS fix, absent if GPS failed or timed out
    pub coordinates: Option<Coordinates>,

    /// Identifier of the strongest associated WiFi network
    pub wifi_network_id: Option<String>,

    /// Detected proximity-beacon identifiers (may be empty)
    pub beacon_ids: BTreeSet<String>,

    /// How each source settled
    pub report: AcquisitionReport,
}

impl LocationSnapshot {
    /// Snapshot with no signals at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the GPS fix
    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    /// Set the WiFi network identifier
    pub fn with_wifi(mut self, network_id: impl Into<String>) -> Self {
        self.wifi_network_id = Some(network_id.into());
        self
    }

    /// Add detected beacons
    pub fn with_beacons<I, S>(mut self, beacons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.beacon_ids.extend(beacons.into_iter().map(Into::into));
        self
    }

    /// Attach the acquisition report
    pub fn with_report(mut self, report: AcquisitionReport) -> Self {
        self.report = report;
        self
    }

    /// Signal kinds for which a value is present
    pub fn present_signals(&self) -> Vec<SignalKind> {
        let mut present = Vec::with_capacity(3);
        if self.coordinates.is_some() {
            present.push(SignalKind::Gps);
        }
        if self.wifi_network_id.is_some() {
            present.push(SignalKind::Wifi);
        }
        if !self.beacon_ids.is_empty() {
            present.push(SignalKind::Beacon);
        }
        present
    }

    /// True when no signal value is present
    pub fn is_empty(&self) -> bool {
        self.present_signals().is_empty()
    }
}
