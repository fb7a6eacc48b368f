//! Acquisition budgets

use std::time::Duration;

/// Time budgets for one acquisition
///
/// Every sub-budget is clamped to the overall budget at acquisition time, so a
/// single slow source can never hold the aggregation past `overall_budget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Upper bound on the whole acquisition
    pub overall_budget: Duration,
    /// Budget for the GPS source
    pub gps_budget: Duration,
    /// Budget for the WiFi source
    pub wifi_budget: Duration,
    /// Budget for the beacon source
    pub beacon_budget: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            overall_budget: Duration::from_secs(9),
            gps_budget: Duration::from_secs(8),
            wifi_budget: Duration::from_secs(4),
            beacon_budget: Duration::from_secs(5),
        }
    }
}

impl AggregatorConfig {
    /// Same budget for every source, capped by `overall`
    pub fn uniform(overall: Duration, per_source: Duration) -> Self {
        Self {
            overall_budget: overall,
            gps_budget: per_source,
            wifi_budget: per_source,
            beacon_budget: per_source,
        }
    }
}
