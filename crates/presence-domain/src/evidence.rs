//! Evidence digests
//!
//! The ledger keeps a summary and a fingerprint of the snapshot, never the raw
//! coordinates or network identifiers.

use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

use crate::LocationSnapshot;

/// Non-identifying summary of the evidence behind a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvidenceDigest {
    /// Which signals were present, e.g. `gps(±10m) wifi beacons(2)`
    pub summary: String,
    /// Lowercase hex SHA-256 over the canonical snapshot
    pub fingerprint: String,
}

impl EvidenceDigest {
    /// Digest a snapshot
    pub fn from_snapshot(snapshot: &LocationSnapshot) -> Self {
        Self {
            summary: summarize(snapshot),
            fingerprint: fingerprint(snapshot),
        }
    }
}

impl fmt::Display for EvidenceDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..16).unwrap_or(&self.fingerprint);
        write!(f, "{} [sha256:{}]", self.summary, short)
    }
}

fn summarize(snapshot: &LocationSnapshot) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(c) = &snapshot.coordinates {
        parts.push(format!("gps(±{:.0}m)", c.accuracy_m));
    }
    if snapshot.wifi_network_id.is_some() {
        parts.push("wifi".to_string());
    }
    if !snapshot.beacon_ids.is_empty() {
        parts.push(format!("beacons({})", snapshot.beacon_ids.len()));
    }

    if parts.is_empty() {
        "no-signal".to_string()
    } else {
        parts.join(" ")
    }
}

fn fingerprint(snapshot: &LocationSnapshot) -> String {
    // BTreeSet iteration keeps beacon order canonical
    let mut canonical = String::new();
    match &snapshot.coordinates {
        Some(c) => {
            let _ = write!(
                canonical,
                "gps={:.6},{:.6},{:.1}",
                c.latitude, c.longitude, c.accuracy_m
            );
        }
        None => canonical.push_str("gps=-"),
    }
    let _ = write!(
        canonical,
        "|wifi={}",
        snapshot.wifi_network_id.as_deref().unwrap_or("-")
    );
    canonical.push_str("|beacons=");
    let beacons: Vec<&str> = snapshot.beacon_ids.iter().map(String::as_str).collect();
    canonical.push_str(&beacons.join(","));

    let hash = Sha256::digest(canonical.as_bytes());
    hash.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}
