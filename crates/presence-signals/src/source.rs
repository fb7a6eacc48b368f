//! The signal source contract and the hint-backed adapter

use std::future::Future;

use presence_domain::{Coordinates, SignalKind};

use crate::SignalError;

/// A visible WiFi network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    /// Network identifier (SSID or BSSID)
    pub id: String,
    /// Received signal strength; `None` ranks below any known strength
    pub rssi_dbm: Option<i32>,
}

impl WifiNetwork {
    /// Create a network entry
    pub fn new(id: impl Into<String>, rssi_dbm: Option<i32>) -> Self {
        Self {
            id: id.into(),
            rssi_dbm,
        }
    }
}

/// A leaf adapter producing one reading or failing independently
///
/// How the reading is obtained from hardware is the adapter's business; the
/// aggregator only relies on this contract.
pub trait SignalSource: Send + Sync {
    /// What a successful acquisition yields
    type Reading: Send;

    /// Which signal this source provides
    fn kind(&self) -> SignalKind;

    /// Acquire a single reading
    fn acquire(&self) -> impl Future<Output = Result<Self::Reading, SignalError>> + Send;
}

/// A source backed by a reading the client already reported
///
/// Used when readings arrive as request hints. A missing hint behaves like an
/// unavailable sensor.
#[derive(Debug, Clone)]
pub struct HintSource<T> {
    kind: SignalKind,
    reading: Option<T>,
}

impl HintSource<Coordinates> {
    /// GPS hint
    pub fn gps(reading: Option<Coordinates>) -> Self {
        Self {
            kind: SignalKind::Gps,
            reading,
        }
    }
}

impl HintSource<Vec<WifiNetwork>> {
    /// WiFi scan hint
    pub fn wifi(reading: Option<Vec<WifiNetwork>>) -> Self {
        Self {
            kind: SignalKind::Wifi,
            reading,
        }
    }
}

impl HintSource<Vec<String>> {
    /// Beacon scan hint
    pub fn beacons(reading: Option<Vec<String>>) -> Self {
        Self {
            kind: SignalKind::Beacon,
            reading,
        }
    }
}

impl<T> SignalSource for HintSource<T>
where
    T: Clone + Send + Sync,
{
    type Reading = T;

    fn kind(&self) -> SignalKind {
        self.kind
    }

    async fn acquire(&self) -> Result<T, SignalError> {
        self.reading
            .clone()
            .ok_or_else(|| SignalError::Unavailable(format!("no {} reading reported", self.kind)))
    }
}
