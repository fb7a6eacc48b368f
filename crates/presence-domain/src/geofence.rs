//! Geofences and per-course attendance policy
//!
//! Owned by course administration; read-only to the presence core.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::record::AttendanceWindow;

/// A point on the earth's surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Spatial boundary of a classroom
#[derive(Debug, Clone, PartialEq)]
pub enum FenceShape {
    /// Center plus radius in meters
    Circle {
        /// Fence center
        center: GeoPoint,
        /// Radius in meters
        radius_m: f64,
    },

    /// Simple polygon; vertices in order, implicitly closed
    Polygon {
        /// Polygon vertices
        vertices: Vec<GeoPoint>,
    },
}

/// The registered boundary defining "in the classroom" for a course
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    /// Spatial boundary
    pub shape: FenceShape,

    /// WiFi network identifiers installed in the room
    pub expected_wifi_network_ids: BTreeSet<String>,

    /// Beacon identifiers installed in the room
    pub expected_beacon_ids: BTreeSet<String>,
}

impl Geofence {
    /// Circular fence with no network expectations
    pub fn circle(center: GeoPoint, radius_m: f64) -> Self {
        Self {
            shape: FenceShape::Circle { center, radius_m },
            expected_wifi_network_ids: BTreeSet::new(),
            expected_beacon_ids: BTreeSet::new(),
        }
    }

    /// Polygonal fence with no network expectations
    pub fn polygon(vertices: Vec<GeoPoint>) -> Self {
        Self {
            shape: FenceShape::Polygon { vertices },
            expected_wifi_network_ids: BTreeSet::new(),
            expected_beacon_ids: BTreeSet::new(),
        }
    }

    /// Add expected WiFi networks
    pub fn with_wifi<I, S>(mut self, networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_wifi_network_ids
            .extend(networks.into_iter().map(Into::into));
        self
    }

    /// Add expected beacons
    pub fn with_beacons<I, S>(mut self, beacons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_beacon_ids
            .extend(beacons.into_iter().map(Into::into));
        self
    }
}

/// Daily class start time and the grace window for an on-time mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSchedule {
    /// Local wall-clock start time
    pub starts_at: NaiveTime,
    /// How long after the start a mark still counts as present
    pub grace: Duration,
}

impl ClassSchedule {
    /// Resolve the schedule to an absolute window on a calendar day
    pub fn window_on(&self, date: NaiveDate, offset: FixedOffset) -> Option<AttendanceWindow> {
        let local = date.and_time(self.starts_at);
        let opens_at: DateTime<Utc> = offset
            .from_local_datetime(&local)
            .single()?
            .with_timezone(&Utc);

        Some(AttendanceWindow {
            opens_at,
            grace: self.grace,
        })
    }
}

/// Everything the presence core needs to know about a course
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePolicy {
    /// Course identifier
    pub course_id: String,
    /// Room label, for diagnostics only
    pub room: Option<String>,
    /// The active geofence
    pub geofence: Geofence,
    /// Start time and grace window (None = every mark is on time)
    pub schedule: Option<ClassSchedule>,
}
