//! Presence Evaluator
//!
//! Fuses a location snapshot and a course geofence into a verification
//! outcome. Evaluation is a pure function: no I/O, no randomness, and no clock
//! reads beyond the issuance timestamp supplied by the caller.
//!
//! Signals are tried highest-confidence first and the first match wins:
//!
//! 1. GPS fix whose accuracy circle lies fully inside the fence (HIGH)
//! 2. Associated WiFi network among the expected networks (MEDIUM)
//! 3. Expected beacons detected (MEDIUM, HIGH with two or more)
//! 4. Otherwise not verified (NONE, LOW) with a per-signal diagnostic
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use presence_domain::{Geofence, GeoPoint, LocationSnapshot, Method};
//! use presence_evaluator::{EvaluatorConfig, PresenceEvaluator};
//!
//! let evaluator = PresenceEvaluator::new(EvaluatorConfig::default());
//! let fence = Geofence::circle(GeoPoint::new(40.0, -74.0), 20.0).with_wifi(["Lab-201"]);
//! let snapshot = LocationSnapshot::empty().with_wifi("Lab-201");
//!
//! let outcome = evaluator.evaluate(&snapshot, &fence, Utc::now());
//! assert_eq!(outcome.method(), Method::Wifi);
//! ```

#![warn(missing_docs)]

mod config;
mod evaluator;
pub mod geometry;

pub use config::EvaluatorConfig;
pub use evaluator::{BeaconFinding, GpsFinding, PresenceEvaluator, WifiFinding};
