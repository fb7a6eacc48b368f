//! Signal fusion

use chrono::{DateTime, Utc};
use presence_domain::{ConfidenceTier, Geofence, LocationSnapshot, Method, VerificationOutcome};

use crate::geometry::{containment, Containment};
use crate::EvaluatorConfig;

/// What the GPS signal showed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpsFinding {
    /// No fix in the snapshot
    Absent,
    /// Fix present but out of range or non-finite
    Malformed,
    /// Nominal point outside the fence
    Outside,
    /// Point inside but accuracy circle crosses the boundary
    TooCoarse,
    /// Accuracy circle fully inside
    Inside {
        /// Slack between the accuracy circle and the boundary
        margin_m: f64,
    },
}

/// What the WiFi signal showed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiFinding {
    /// No associated network
    Absent,
    /// Associated network is not one of the room's
    Mismatch,
    /// Associated with a room network
    Match,
}

/// What the beacon scan showed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconFinding {
    /// No beacons detected
    Absent,
    /// Beacons detected, none of them the room's
    Mismatch,
    /// This many distinct room beacons detected
    Match(usize),
}

/// The presence decision engine
pub struct PresenceEvaluator {
    config: EvaluatorConfig,
}

impl PresenceEvaluator {
    /// Create a new evaluator with the given configuration
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Create an evaluator with default configuration
    pub fn default_config() -> Self {
        Self::new(EvaluatorConfig::default())
    }

    /// The active configuration
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate a snapshot against a geofence
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Evidence gathered for this attempt
    /// * `geofence` - The course's registered boundary
    /// * `issued_at` - Issuance time; the only time input
    ///
    /// # Returns
    ///
    /// An outcome that expires `config.validity` after `issued_at`. Identical
    /// inputs always produce identical outcomes.
    pub fn evaluate(
        &self,
        snapshot: &LocationSnapshot,
        geofence: &Geofence,
        issued_at: DateTime<Utc>,
    ) -> VerificationOutcome {
        let validity = self.config.validity;

        // 1. GPS: direct position measurement
        let gps = Self::check_gps(snapshot, geofence);
        if let GpsFinding::Inside { margin_m } = gps {
            return VerificationOutcome::verified(
                Method::Gps,
                ConfidenceTier::High,
                format!("GPS position inside classroom geofence ({:.1} m margin)", margin_m),
                snapshot.clone(),
                issued_at,
                validity,
            );
        }

        // 2. WiFi: room-level network proxy
        let wifi = Self::check_wifi(snapshot, geofence);
        if wifi == WifiFinding::Match {
            return VerificationOutcome::verified(
                Method::Wifi,
                ConfidenceTier::Medium,
                "Connected to classroom WiFi network".to_string(),
                snapshot.clone(),
                issued_at,
                validity,
            );
        }

        // 3. Beacons, upgraded when enough distinct room beacons are heard
        let beacons = Self::check_beacons(snapshot, geofence);
        if let BeaconFinding::Match(count) = beacons {
            let (confidence, reason) = if count >= self.config.triangulation_beacons {
                (
                    ConfidenceTier::Medium.upgrade(),
                    format!("Detected {} classroom beacons (triangulated)", count),
                )
            } else {
                (
                    ConfidenceTier::Medium,
                    format!("Detected {} classroom beacon{}", count, if count == 1 { "" } else { "s" }),
                )
            };
            return VerificationOutcome::verified(
                Method::Beacon,
                confidence,
                reason,
                snapshot.clone(),
                issued_at,
                validity,
            );
        }

        // 4. Nothing matched
        VerificationOutcome::unverified(
            Self::diagnose(gps, wifi, beacons),
            snapshot.clone(),
            issued_at,
            validity,
        )
    }

    /// Classify the GPS signal
    pub fn check_gps(snapshot: &LocationSnapshot, geofence: &Geofence) -> GpsFinding {
        let Some(fix) = &snapshot.coordinates else {
            return GpsFinding::Absent;
        };
        if !fix.is_well_formed() {
            return GpsFinding::Malformed;
        }

        match containment(fix, &geofence.shape) {
            Containment::Inside { margin_m } => GpsFinding::Inside { margin_m },
            Containment::Straddles => GpsFinding::TooCoarse,
            Containment::Outside => GpsFinding::Outside,
        }
    }

    /// Classify the WiFi signal
    pub fn check_wifi(snapshot: &LocationSnapshot, geofence: &Geofence) -> WifiFinding {
        match &snapshot.wifi_network_id {
            None => WifiFinding::Absent,
            Some(id) if geofence.expected_wifi_network_ids.contains(id) => WifiFinding::Match,
            Some(_) => WifiFinding::Mismatch,
        }
    }

    /// Classify the beacon scan
    pub fn check_beacons(snapshot: &LocationSnapshot, geofence: &Geofence) -> BeaconFinding {
        if snapshot.beacon_ids.is_empty() {
            return BeaconFinding::Absent;
        }

        let matched = snapshot
            .beacon_ids
            .intersection(&geofence.expected_beacon_ids)
            .count();

        if matched == 0 {
            BeaconFinding::Mismatch
        } else {
            BeaconFinding::Match(matched)
        }
    }

    /// Enumerate absent vs. present-but-non-matching signals
    fn diagnose(gps: GpsFinding, wifi: WifiFinding, beacons: BeaconFinding) -> String {
        let gps = match gps {
            GpsFinding::Absent => "GPS unavailable",
            GpsFinding::Malformed => "GPS reading rejected as malformed",
            GpsFinding::Outside => "GPS position outside classroom geofence",
            GpsFinding::TooCoarse => "GPS accuracy too coarse to confirm classroom",
            GpsFinding::Inside { .. } => "GPS position inside classroom geofence",
        };
        let wifi = match wifi {
            WifiFinding::Absent => "WiFi unavailable",
            WifiFinding::Mismatch => "WiFi network did not match classroom",
            WifiFinding::Match => "WiFi network matched classroom",
        };
        let beacons = match beacons {
            BeaconFinding::Absent => "no Bluetooth beacons detected",
            BeaconFinding::Mismatch => "detected beacons did not match classroom",
            BeaconFinding::Match(_) => "classroom beacons detected",
        };

        format!("{}; {}; {}", gps, wifi, beacons)
    }
}
