//! Configuration file parsing for the presence service.
//!
//! Loads settings from TOML files including bind address, token secret,
//! acquisition budgets, and the course geofences.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Duration, FixedOffset, NaiveTime};
use presence_domain::{ClassSchedule, CoursePolicy, GeoPoint, Geofence};
use presence_evaluator::EvaluatorConfig;
use presence_session::{ServiceConfig, SweeperConfig};
use presence_signals::AggregatorConfig;
use serde::Deserialize;
use thiserror::Error;

/// Longest an outcome may stay committable
pub const MAX_VALIDITY_SECS: i64 = 3600;

/// Longest a session may be kept after its outcome expires
pub const MAX_RETENTION_SECS: i64 = 7 * 24 * 3600;

/// Longest grace period after a class start
pub const MAX_GRACE_MINUTES: i64 = 24 * 60;

/// Longest acquisition budget, overall or per source
pub const MAX_BUDGET_MS: u64 = 60_000;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// HMAC secret for signing outcome tokens
    pub token_secret: String,

    /// SQLite ledger path (default: "presence.db")
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Institution's offset from UTC in minutes; decides the attendance day
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Signal acquisition budgets
    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    /// Outcome validity
    #[serde(default)]
    pub outcome: OutcomeSettings,

    /// Session sweeper schedule
    #[serde(default)]
    pub sweeper: SweeperSettings,

    /// Courses with an active geofence
    #[serde(default)]
    pub courses: Vec<CourseConfig>,
}

/// `[acquisition]` section
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionSettings {
    /// Overall budget in milliseconds (default: 9000)
    #[serde(default = "default_overall_budget_ms")]
    pub overall_budget_ms: u64,

    /// GPS budget in milliseconds (default: 8000)
    #[serde(default = "default_gps_budget_ms")]
    pub gps_budget_ms: u64,

    /// WiFi budget in milliseconds (default: 4000)
    #[serde(default = "default_wifi_budget_ms")]
    pub wifi_budget_ms: u64,

    /// Beacon budget in milliseconds (default: 5000)
    #[serde(default = "default_beacon_budget_ms")]
    pub beacon_budget_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            overall_budget_ms: default_overall_budget_ms(),
            gps_budget_ms: default_gps_budget_ms(),
            wifi_budget_ms: default_wifi_budget_ms(),
            beacon_budget_ms: default_beacon_budget_ms(),
        }
    }
}

/// `[outcome]` section
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeSettings {
    /// Seconds a verified outcome stays committable (default: 120)
    #[serde(default = "default_validity_secs")]
    pub validity_secs: i64,
}

impl Default for OutcomeSettings {
    fn default() -> Self {
        Self {
            validity_secs: default_validity_secs(),
        }
    }
}

/// `[sweeper]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperSettings {
    /// Seconds between sweeps (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Seconds a session is kept after its outcome expires (default: 600)
    #[serde(default = "default_retention_secs")]
    pub retention_secs: i64,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
        }
    }
}

/// One `[[courses]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    /// Course identifier
    pub id: String,

    /// Room label
    #[serde(default)]
    pub room: Option<String>,

    /// Local start time as "HH:MM"; without it every mark is present
    #[serde(default)]
    pub starts_at: Option<String>,

    /// Minutes after the start that still count as present (default: 10)
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,

    /// Spatial boundary
    pub fence: FenceConfig,

    /// Classroom WiFi network identifiers
    #[serde(default)]
    pub expected_wifi: Vec<String>,

    /// Classroom beacon identifiers
    #[serde(default)]
    pub expected_beacons: Vec<String>,
}

/// Fence shape as written in TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FenceConfig {
    /// `kind = "circle"`
    Circle {
        /// Center latitude
        latitude: f64,
        /// Center longitude
        longitude: f64,
        /// Radius in meters
        radius_m: f64,
    },
    /// `kind = "polygon"`
    Polygon {
        /// Vertices as `[lat, lng]` pairs
        vertices: Vec<[f64; 2]>,
    },
}

fn default_database_path() -> String {
    "presence.db".to_string()
}

fn default_overall_budget_ms() -> u64 {
    9000
}

fn default_gps_budget_ms() -> u64 {
    8000
}

fn default_wifi_budget_ms() -> u64 {
    4000
}

fn default_beacon_budget_ms() -> u64 {
    5000
}

fn default_validity_secs() -> i64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_retention_secs() -> i64 {
    600
}

fn default_grace_minutes() -> i64 {
    10
}

fn check_point(course: &str, latitude: f64, longitude: f64) -> Result<(), ConfigError> {
    let in_range = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if in_range {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "course {}: coordinate ({}, {}) out of range",
            course, latitude, longitude
        )))
    }
}

impl CourseConfig {
    /// Build the course policy this entry describes
    pub fn to_policy(&self) -> Result<CoursePolicy, ConfigError> {
        let geofence = match &self.fence {
            FenceConfig::Circle {
                latitude,
                longitude,
                radius_m,
            } => {
                check_point(&self.id, *latitude, *longitude)?;
                if !(radius_m.is_finite() && *radius_m > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "course {}: radius_m must be positive",
                        self.id
                    )));
                }
                Geofence::circle(GeoPoint::new(*latitude, *longitude), *radius_m)
            }
            FenceConfig::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(ConfigError::Invalid(format!(
                        "course {}: polygon needs at least 3 vertices, got {}",
                        self.id,
                        vertices.len()
                    )));
                }
                for [lat, lng] in vertices {
                    check_point(&self.id, *lat, *lng)?;
                }
                Geofence::polygon(vertices.iter().map(|[lat, lng]| GeoPoint::new(*lat, *lng)).collect())
            }
        }
        .with_wifi(self.expected_wifi.iter().cloned())
        .with_beacons(self.expected_beacons.iter().cloned());

        let schedule = match &self.starts_at {
            Some(raw) => {
                let starts_at = NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| {
                    ConfigError::Invalid(format!("course {}: bad starts_at {:?}: {}", self.id, raw, e))
                })?;
                if !(0..=MAX_GRACE_MINUTES).contains(&self.grace_minutes) {
                    return Err(ConfigError::Invalid(format!(
                        "course {}: grace_minutes must be between 0 and {}",
                        self.id, MAX_GRACE_MINUTES
                    )));
                }
                Some(ClassSchedule {
                    starts_at,
                    grace: Duration::minutes(self.grace_minutes),
                })
            }
            None => None,
        };

        Ok(CoursePolicy {
            course_id: self.id.clone(),
            room: self.room.clone(),
            geofence,
            schedule,
        })
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that parsing alone cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.is_empty() {
            return Err(ConfigError::MissingField("token_secret".to_string()));
        }
        if !(1..=MAX_VALIDITY_SECS).contains(&self.outcome.validity_secs) {
            return Err(ConfigError::Invalid(format!(
                "outcome.validity_secs must be between 1 and {}",
                MAX_VALIDITY_SECS
            )));
        }
        if !(0..=MAX_RETENTION_SECS).contains(&self.sweeper.retention_secs) {
            return Err(ConfigError::Invalid(format!(
                "sweeper.retention_secs must be between 0 and {}",
                MAX_RETENTION_SECS
            )));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(ConfigError::Invalid("sweeper.interval_secs must be positive".to_string()));
        }
        let budgets = &self.acquisition;
        for (name, ms) in [
            ("overall_budget_ms", budgets.overall_budget_ms),
            ("gps_budget_ms", budgets.gps_budget_ms),
            ("wifi_budget_ms", budgets.wifi_budget_ms),
            ("beacon_budget_ms", budgets.beacon_budget_ms),
        ] {
            if ms > MAX_BUDGET_MS {
                return Err(ConfigError::Invalid(format!(
                    "acquisition.{} must be at most {}",
                    name, MAX_BUDGET_MS
                )));
            }
        }
        self.utc_offset()?;

        let mut seen = HashSet::new();
        for course in &self.courses {
            if !seen.insert(course.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate course id {}", course.id)));
            }
            course.to_policy()?;
        }

        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        RouterConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            token_secret: "test-secret-key-do-not-use-in-production".to_string(),
            database_path: ":memory:".to_string(),
            utc_offset_minutes: 0,
            acquisition: AcquisitionSettings::default(),
            outcome: OutcomeSettings::default(),
            sweeper: SweeperSettings::default(),
            courses: vec![CourseConfig {
                id: "CS201".to_string(),
                room: Some("Lab 201".to_string()),
                starts_at: Some("09:00".to_string()),
                grace_minutes: 10,
                fence: FenceConfig::Circle {
                    latitude: 37.4275,
                    longitude: -122.1697,
                    radius_m: 20.0,
                },
                expected_wifi: vec!["Lab-201".to_string(), "Lab-202".to_string()],
                expected_beacons: vec![
                    "CS201-BEACON-001".to_string(),
                    "CS201-BEACON-002".to_string(),
                    "CS201-BEACON-003".to_string(),
                ],
            }],
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// The institution's UTC offset
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Invalid(format!("utc_offset_minutes out of range: {}", self.utc_offset_minutes))
        })
    }

    /// Settings for the presence service
    ///
    /// Sub-budgets larger than the overall budget are clamped to it.
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let budgets = &self.acquisition;
        let overall = std::time::Duration::from_millis(budgets.overall_budget_ms);
        let capped = |ms: u64| std::time::Duration::from_millis(ms).min(overall);

        Ok(ServiceConfig {
            evaluator: EvaluatorConfig::with_validity_secs(self.outcome.validity_secs),
            acquisition: AggregatorConfig {
                overall_budget: overall,
                gps_budget: capped(budgets.gps_budget_ms),
                wifi_budget: capped(budgets.wifi_budget_ms),
                beacon_budget: capped(budgets.beacon_budget_ms),
            },
            utc_offset: self.utc_offset()?,
        })
    }

    /// Settings for the session sweeper
    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: std::time::Duration::from_secs(self.sweeper.interval_secs.max(1)),
            retention: Duration::seconds(self.sweeper.retention_secs.max(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_domain::FenceShape;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default_test_config();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.courses.len(), 1);
        assert_eq!(config.courses[0].id, "CS201");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = RouterConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            token_secret = "my-secret"
            utc_offset_minutes = -300

            [acquisition]
            overall_budget_ms = 6000
            gps_budget_ms = 7000

            [outcome]
            validity_secs = 90

            [[courses]]
            id = "CS201"
            room = "Lab 201"
            starts_at = "09:00"
            expected_wifi = ["Lab-201", "Lab-202"]
            expected_beacons = ["B-1", "B-2", "B-3"]
            fence = { kind = "circle", latitude = 37.4275, longitude = -122.1697, radius_m = 20.0 }

            [[courses]]
            id = "MATH110"
            fence = { kind = "polygon", vertices = [[40.0, -74.0], [40.0002, -74.0], [40.0002, -74.0003]] }
        "#;

        let config = RouterConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.database_path, "presence.db");
        assert_eq!(config.acquisition.wifi_budget_ms, 4000);
        assert_eq!(config.sweeper.retention_secs, 600);
        assert_eq!(config.courses[0].grace_minutes, 10);

        let service = config.service_config().unwrap();
        assert_eq!(service.acquisition.gps_budget, std::time::Duration::from_millis(6000));
        assert_eq!(service.evaluator.validity, Duration::seconds(90));
        assert_eq!(service.utc_offset.local_minus_utc(), -300 * 60);

        let polygon = config.courses[1].to_policy().unwrap();
        assert!(matches!(polygon.geofence.shape, FenceShape::Polygon { ref vertices } if vertices.len() == 3));
        assert!(polygon.schedule.is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let config = RouterConfig::from_toml(include_str!("../../../config/presence.toml")).unwrap();
        assert_eq!(config.courses.len(), 2);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -420 * 60);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            token_secret = ""
        "#;
        assert!(matches!(
            RouterConfig::from_toml(toml),
            Err(ConfigError::MissingField(field)) if field == "token_secret"
        ));
    }

    #[test]
    fn test_duplicate_course_rejected() {
        let mut config = RouterConfig::default_test_config();
        config.courses.push(config.courses[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_bad_fences_rejected() {
        let mut config = RouterConfig::default_test_config();
        config.courses[0].fence = FenceConfig::Polygon {
            vertices: vec![[0.0, 0.0], [0.0, 1.0]],
        };
        assert!(config.validate().is_err());

        config.courses[0].fence = FenceConfig::Circle {
            latitude: 0.0,
            longitude: 0.0,
            radius_m: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let mut config = RouterConfig::default_test_config();
        config.outcome.validity_secs = i64::MAX / 1000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("validity_secs")));

        let mut config = RouterConfig::default_test_config();
        config.sweeper.retention_secs = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("retention_secs")));

        let mut config = RouterConfig::default_test_config();
        config.sweeper.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RouterConfig::default_test_config();
        config.acquisition.gps_budget_ms = u64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("gps_budget_ms")));

        let mut config = RouterConfig::default_test_config();
        config.courses[0].grace_minutes = i64::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("grace_minutes")));
    }

    #[test]
    fn test_upper_bounds_accepted() {
        let mut config = RouterConfig::default_test_config();
        config.outcome.validity_secs = MAX_VALIDITY_SECS;
        config.sweeper.retention_secs = MAX_RETENTION_SECS;
        config.acquisition.overall_budget_ms = MAX_BUDGET_MS;
        config.courses[0].grace_minutes = MAX_GRACE_MINUTES;
        assert!(config.validate().is_ok());
        assert!(config.service_config().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let mut config = RouterConfig::default_test_config();
        config.courses[0].fence = FenceConfig::Circle {
            latitude: 200.0,
            longitude: 0.0,
            radius_m: 20.0,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("out of range")));

        config.courses[0].fence = FenceConfig::Polygon {
            vertices: vec![[0.0, 0.0], [0.0, 181.0], [0.001, 0.001]],
        };
        assert!(config.validate().is_err());

        config.courses[0].fence = FenceConfig::Circle {
            latitude: f64::NAN,
            longitude: 0.0,
            radius_m: 20.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_start_time_rejected() {
        let mut config = RouterConfig::default_test_config();
        config.courses[0].starts_at = Some("9 o'clock".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "bind_address = \"127.0.0.1\"\nbind_port = 8081\ntoken_secret = \"s\"\n",
        )
        .unwrap();

        let config = RouterConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_port, 8081);
        assert!(config.courses.is_empty());
    }
}
