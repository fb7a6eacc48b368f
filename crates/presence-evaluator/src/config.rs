//! Evaluator configuration

use chrono::Duration;

/// Default validity window of an outcome, in seconds
pub const DEFAULT_VALIDITY_SECS: i64 = 120;

/// Distinct expected beacons needed for the triangulation upgrade
pub const DEFAULT_TRIANGULATION_BEACONS: usize = 2;

/// Configuration for outcome issuance
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// How long an outcome may be committed after issuance
    pub validity: Duration,

    /// Distinct expected beacons needed to upgrade a beacon match to HIGH
    pub triangulation_beacons: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            validity: Duration::seconds(DEFAULT_VALIDITY_SECS),
            triangulation_beacons: DEFAULT_TRIANGULATION_BEACONS,
        }
    }
}

impl EvaluatorConfig {
    /// Default configuration with a custom validity window
    pub fn with_validity_secs(secs: i64) -> Self {
        Self {
            validity: Duration::seconds(secs),
            ..Self::default()
        }
    }
}
