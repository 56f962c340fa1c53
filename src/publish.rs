//! Dual-sink publication of unit state.
//!
//! Every publish goes to both the fleet backend API and the real-time
//! store. The sinks are independent: both are always attempted, each
//! failure is logged where it happens, and the caller gets per-sink
//! result flags instead of an error. A partial failure never raises.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::presence::PresenceRecord;
use crate::providers::backend::{ApiClient, BackendError};
use crate::providers::gps::Fix;
use crate::providers::realtime::{RealtimeClient, RealtimeError};

/// The two publication targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Api,
    Realtime,
}

/// One sink declined or failed a publish. Absorbed inside the publisher
/// after logging; callers see only the result flags.
#[derive(Debug, Error)]
#[error("{sink:?} sink failed: {cause}")]
pub struct PublishFailure {
    pub sink: Sink,
    pub cause: String,
}

/// Per-sink outcome of one publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResult {
    pub api_ok: bool,
    pub realtime_ok: bool,
}

impl PublishResult {
    pub fn all_ok(&self) -> bool {
        self.api_ok && self.realtime_ok
    }

    pub fn failed_sinks(&self) -> u64 {
        u64::from(!self.api_ok) + u64::from(!self.realtime_ok)
    }
}

/// Client construction failure at startup. The only fatal error this
/// module produces; after construction nothing here aborts.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("Realtime client: {0}")]
    Realtime(#[from] RealtimeError),
}

/// Body written to `station_updates/<station_id>` in the real-time store.
#[derive(Debug, Serialize)]
struct StationBoard<'a> {
    timestamp: i64,
    buses: &'a [PresenceRecord],
}

pub struct Publisher {
    api: ApiClient,
    realtime: RealtimeClient,
}

impl Publisher {
    pub fn new(api: ApiClient, realtime: RealtimeClient) -> Self {
        Self { api, realtime }
    }

    /// Publish a bus position to both sinks. The real-time body is the
    /// bare fix; the key path carries the bus id.
    pub async fn publish_location(&self, bus_id: &str, fix: &Fix) -> PublishResult {
        let api = async {
            self.api
                .update_location(bus_id, fix)
                .await
                .map_err(|e| PublishFailure {
                    sink: Sink::Api,
                    cause: e.to_string(),
                })
        };
        let realtime = async {
            let path = format!("bus_locations/{}", urlencoding::encode(bus_id));
            self.realtime
                .set(&path, fix)
                .await
                .map_err(|e| PublishFailure {
                    sink: Sink::Realtime,
                    cause: e.to_string(),
                })
        };

        let (api, realtime) = tokio::join!(api, realtime);
        Self::into_flags(api, realtime)
    }

    /// Publish a station's arrival board to both sinks.
    pub async fn publish_presence(
        &self,
        station_id: &str,
        now: i64,
        snapshot: &[PresenceRecord],
    ) -> PublishResult {
        let api = async {
            self.api
                .update_station(station_id, snapshot)
                .await
                .map_err(|e| PublishFailure {
                    sink: Sink::Api,
                    cause: e.to_string(),
                })
        };
        let realtime = async {
            let path = format!("station_updates/{}", urlencoding::encode(station_id));
            let board = StationBoard {
                timestamp: now,
                buses: snapshot,
            };
            self.realtime
                .set(&path, &board)
                .await
                .map_err(|e| PublishFailure {
                    sink: Sink::Realtime,
                    cause: e.to_string(),
                })
        };

        let (api, realtime) = tokio::join!(api, realtime);
        Self::into_flags(api, realtime)
    }

    fn into_flags(
        api: Result<(), PublishFailure>,
        realtime: Result<(), PublishFailure>,
    ) -> PublishResult {
        if let Err(ref e) = api {
            warn!(error = %e, "API publish failed");
        }
        if let Err(ref e) = realtime {
            warn!(error = %e, "Realtime publish failed");
        }
        PublishResult {
            api_ok: api.is_ok(),
            realtime_ok: realtime.is_ok(),
        }
    }
}
