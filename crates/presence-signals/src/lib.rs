//! Presence Signals
//!
//! Concurrent, partial-failure-tolerant acquisition of location signals.
//!
//! Three independent [`SignalSource`]s (GPS, WiFi, Bluetooth beacons) are
//! raced under their own sub-budgets, all capped by one overall budget. A
//! source that fails, hangs, or reports garbage yields an absent field, never
//! an aborted aggregation; the resulting
//! [`LocationSnapshot`](presence_domain::LocationSnapshot) records how each
//! source settled.
//!
//! # Examples
//!
//! ```no_run
//! use presence_domain::Coordinates;
//! use presence_signals::{AggregatorConfig, HintSource, SignalAggregator};
//!
//! # async fn run() {
//! let aggregator = SignalAggregator::new(
//!     HintSource::gps(Some(Coordinates::new(40.0, -74.0, 8.0))),
//!     HintSource::wifi(None),
//!     HintSource::beacons(Some(vec!["B-1".to_string()])),
//!     AggregatorConfig::default(),
//! );
//! let snapshot = aggregator.acquire().await;
//! assert!(snapshot.coordinates.is_some());
//! # }
//! ```

#![warn(missing_docs)]

mod aggregator;
mod config;
mod error;
mod source;

pub use aggregator::SignalAggregator;
pub use config::AggregatorConfig;
pub use error::SignalError;
pub use source::{HintSource, SignalSource, WifiNetwork};
