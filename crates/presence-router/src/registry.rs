//! Geofence registry built from configuration.
//!
//! Course administration is out of scope, so the registry is loaded once at
//! start-up and is read-only afterwards.

use std::collections::BTreeMap;

use presence_domain::traits::GeofenceProvider;
use presence_domain::{CoursePolicy, FenceShape};

use crate::config::{ConfigError, CourseConfig};

/// Summary of a configured course, safe to show to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSummary {
    /// Course identifier
    pub course_id: String,
    /// Room label
    pub room: Option<String>,
    /// "circle" or "polygon"
    pub fence_kind: &'static str,
    /// Whether a class start time is configured
    pub scheduled: bool,
}

/// In-memory geofence provider
#[derive(Debug, Clone, Default)]
pub struct GeofenceRegistry {
    courses: BTreeMap<String, CoursePolicy>,
}

impl GeofenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from configuration
    pub fn from_config(configs: &[CourseConfig]) -> Result<Self, ConfigError> {
        let mut courses = BTreeMap::new();
        for config in configs {
            let policy = config.to_policy()?;
            if courses.insert(policy.course_id.clone(), policy).is_some() {
                return Err(ConfigError::Invalid(format!("duplicate course id {}", config.id)));
            }
        }
        Ok(Self { courses })
    }

    /// Number of configured courses
    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// True when no course is configured
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    /// Summaries of every configured course, ordered by id
    pub fn summaries(&self) -> Vec<CourseSummary> {
        self.courses
            .values()
            .map(|policy| CourseSummary {
                course_id: policy.course_id.clone(),
                room: policy.room.clone(),
                fence_kind: match policy.geofence.shape {
                    FenceShape::Circle { .. } => "circle",
                    FenceShape::Polygon { .. } => "polygon",
                },
                scheduled: policy.schedule.is_some(),
            })
            .collect()
    }
}

impl GeofenceProvider for GeofenceRegistry {
    fn course_policy(&self, course_id: &str) -> Option<CoursePolicy> {
        self.courses.get(course_id).cloned()
    }

    fn course_ids(&self) -> Vec<String> {
        self.courses.keys().cloned().collect()
    }
}
