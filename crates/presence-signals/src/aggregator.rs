//! Concurrent acquisition with per-source budgets

use std::collections::BTreeSet;
use std::time::Duration;

use presence_domain::{AcquisitionReport, Coordinates, LocationSnapshot, SignalStatus};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::{AggregatorConfig, SignalError, SignalSource, WifiNetwork};

/// How one source settled before post-processing
enum Settled<T> {
    Reading(T),
    Failed(SignalError),
    TimedOut,
}

/// Builds a [`LocationSnapshot`] from three independent sources
///
/// Sources are launched concurrently. None of them can abort the aggregation
/// or hold it past the overall budget.
pub struct SignalAggregator<G, W, B> {
    gps: G,
    wifi: W,
    beacons: B,
    config: AggregatorConfig,
}

impl<G, W, B> SignalAggregator<G, W, B>
where
    G: SignalSource<Reading = Coordinates>,
    W: SignalSource<Reading = Vec<WifiNetwork>>,
    B: SignalSource<Reading = Vec<String>>,
{
    /// Create an aggregator over the given sources
    pub fn new(gps: G, wifi: W, beacons: B, config: AggregatorConfig) -> Self {
        Self {
            gps,
            wifi,
            beacons,
            config,
        }
    }

    /// The active budgets
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Acquire a snapshot within the configured overall budget
    pub async fn acquire(&self) -> LocationSnapshot {
        self.acquire_within(self.config.overall_budget).await
    }

    /// Acquire a snapshot within `overall_budget`
    ///
    /// Always returns; a snapshot with no signals is a valid result.
    pub async fn acquire_within(&self, overall_budget: Duration) -> LocationSnapshot {
        let started = Instant::now();
        let deadline = started + overall_budget;

        let (gps, wifi, beacons) = tokio::join!(
            settle(&self.gps, self.config.gps_budget, deadline),
            settle(&self.wifi, self.config.wifi_budget, deadline),
            settle(&self.beacons, self.config.beacon_budget, deadline),
        );

        let mut snapshot = LocationSnapshot::empty();
        let mut report = AcquisitionReport::default();

        report.gps = match gps {
            Settled::Reading(fix) if fix.is_well_formed() => {
                snapshot.coordinates = Some(fix);
                SignalStatus::Acquired
            }
            Settled::Reading(fix) => {
                warn!(
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    accuracy_m = fix.accuracy_m,
                    "Dropping malformed GPS reading"
                );
                SignalStatus::Malformed("coordinates out of range".to_string())
            }
            other => settled_status(other),
        };

        report.wifi = match wifi {
            Settled::Reading(networks) => match strongest_network(&networks) {
                Some(id) => {
                    snapshot.wifi_network_id = Some(id);
                    SignalStatus::Acquired
                }
                None => SignalStatus::Empty,
            },
            other => settled_status(other),
        };

        report.beacon = match beacons {
            Settled::Reading(ids) => {
                let ids: BTreeSet<String> = ids
                    .into_iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
                if ids.is_empty() {
                    SignalStatus::Empty
                } else {
                    snapshot.beacon_ids = ids;
                    SignalStatus::Acquired
                }
            }
            other => settled_status(other),
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            gps = report.gps.as_str(),
            wifi = report.wifi.as_str(),
            beacon = report.beacon.as_str(),
            "Location snapshot acquired"
        );

        snapshot.with_report(report)
    }
}

/// Run one source under `min(now + budget, deadline)`
async fn settle<S: SignalSource>(source: &S, budget: Duration, deadline: Instant) -> Settled<S::Reading> {
    let cap = (Instant::now() + budget).min(deadline);
    match timeout_at(cap, source.acquire()).await {
        Ok(Ok(reading)) => Settled::Reading(reading),
        Ok(Err(e)) => {
            debug!(source = %source.kind(), error = %e, "Signal source failed");
            Settled::Failed(e)
        }
        Err(_) => {
            debug!(source = %source.kind(), "Signal source exceeded its budget");
            Settled::TimedOut
        }
    }
}

fn settled_status<T>(settled: Settled<T>) -> SignalStatus {
    match settled {
        Settled::Reading(_) => SignalStatus::Acquired,
        Settled::Failed(SignalError::TimedOut) | Settled::TimedOut => SignalStatus::TimedOut,
        Settled::Failed(SignalError::Malformed(detail)) => SignalStatus::Malformed(detail),
        Settled::Failed(e) => SignalStatus::Failed(e.to_string()),
    }
}

/// Pick the strongest network; unknown strength ranks last, ties keep list order
fn strongest_network(networks: &[WifiNetwork]) -> Option<String> {
    let mut best: Option<&WifiNetwork> = None;
    for network in networks.iter().filter(|n| !n.id.trim().is_empty()) {
        let stronger = match best {
            None => true,
            Some(current) => match (network.rssi_dbm, current.rssi_dbm) {
                (Some(candidate), Some(held)) => candidate > held,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if stronger {
            best = Some(network);
        }
    }
    best.map(|n| n.id.trim().to_string())
}
