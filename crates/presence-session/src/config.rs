//! Service configuration

use chrono::{Duration, FixedOffset, Offset, Utc};
use presence_evaluator::EvaluatorConfig;
use presence_signals::AggregatorConfig;

/// Configuration for [`PresenceService`](crate::PresenceService)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Outcome validity and beacon upgrade threshold
    pub evaluator: EvaluatorConfig,

    /// Acquisition budgets
    pub acquisition: AggregatorConfig,

    /// Offset of the institution's local time; decides the ledger's calendar day
    pub utc_offset: FixedOffset,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            acquisition: AggregatorConfig::default(),
            utc_offset: Utc.fix(),
        }
    }
}

/// Configuration for [`SessionSweeper`](crate::SessionSweeper)
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Time between sweeps
    pub interval: std::time::Duration,

    /// How long a session is kept after its outcome expires
    pub retention: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            retention: Duration::seconds(600),
        }
    }
}
