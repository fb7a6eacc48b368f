//! Confidence tiers for verification methods

/// Coarse ranking of how trustworthy a verification is considered
///
/// Tiers are ordered: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceTier {
    /// No usable proof
    Low,

    /// Room-level network proxy (WiFi, a single beacon)
    Medium,

    /// Direct position measurement or beacon triangulation
    High,
}

impl ConfidenceTier {
    /// Get the tier name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "LOW",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::High => "HIGH",
        }
    }

    /// Parse a tier from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Some(ConfidenceTier::Low),
            "MEDIUM" => Some(ConfidenceTier::Medium),
            "HIGH" => Some(ConfidenceTier::High),
            _ => None,
        }
    }

    /// Next tier up, used for the multi-beacon upgrade
    pub fn upgrade(&self) -> Self {
        match self {
            ConfidenceTier::Low => ConfidenceTier::Medium,
            ConfidenceTier::Medium | ConfidenceTier::High => ConfidenceTier::High,
        }
    }
}

impl std::str::FromStr for ConfidenceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid confidence tier: {}", s))
    }
}
