//! Onboard tracker loop for the bus unit.
//!
//! Every cycle samples the position, broadcasts ETA frames to stations
//! near the sampled fix, and publishes the fix to both sinks. A failed
//! station lookup skips only the broadcast phase; the location is
//! published every cycle regardless.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ChannelMessage, ShortRangeChannel};
use crate::config::Config;
use crate::counters::TrackerCounters;
use crate::providers::backend::ApiClient;
use crate::providers::gps::{Fix, PositionSource};
use crate::providers::realtime::RealtimeClient;
use crate::publish::{BuildError, Publisher};

pub struct BusTrackerLoop {
    bus_id: String,
    search_radius_km: f64,
    interval: Duration,
    position: PositionSource,
    api: ApiClient,
    publisher: Publisher,
    channel: ShortRangeChannel,
    counters: TrackerCounters,
}

impl BusTrackerLoop {
    /// Build the unit from configuration. The loop owns all of its
    /// collaborators; only a broken base URL fails construction. A
    /// missing transceiver or GPS daemon degrades per cycle instead.
    pub fn new(config: &Config) -> Result<Self, BuildError> {
        let api = ApiClient::new(&config.backend.base_url, &config.backend.api_key)?;
        let realtime = RealtimeClient::new(&config.realtime.base_url)?;

        Ok(Self {
            bus_id: config.bus.bus_id.clone(),
            search_radius_km: config.bus.search_radius_km,
            interval: Duration::from_secs(config.bus.update_interval_secs),
            position: PositionSource::new(&config.gps),
            publisher: Publisher::new(api.clone(), realtime),
            api,
            channel: ShortRangeChannel::open(
                &config.transceiver.device,
                config.transceiver.baud_rate,
            ),
            counters: TrackerCounters::new(),
        })
    }

    /// Handle onto the loop's cycle counters.
    pub fn counters(&self) -> TrackerCounters {
        self.counters.clone()
    }

    /// Run until cancelled. The stop signal is checked at cycle
    /// boundaries only; an in-flight cycle completes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            bus_id = %self.bus_id,
            interval_secs = self.interval.as_secs(),
            "Bus tracker starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(bus_id = %self.bus_id, "Bus tracker stopping");
                    return;
                }

                _ = interval.tick() => {}
            }

            self.run_cycle().await;
        }
    }

    async fn run_cycle(&mut self) {
        self.counters.record_cycle();

        let fix = self.position.sample().await;
        debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            synthetic = fix.synthetic,
            "Sampled position"
        );

        self.broadcast_nearby(&fix).await;

        let result = self.publisher.publish_location(&self.bus_id, &fix).await;
        self.counters.record_publish(&result);
        debug!(
            api_ok = result.api_ok,
            realtime_ok = result.realtime_ok,
            "Published location"
        );
    }

    /// Look up stations near the fix and send one ETA frame to each.
    /// Without a transceiver there is nobody to reach, so the lookup is
    /// skipped entirely.
    async fn broadcast_nearby(&mut self, fix: &Fix) {
        if !self.channel.is_connected() {
            return;
        }

        let stations = match self
            .api
            .nearby_stations(fix.latitude, fix.longitude, self.search_radius_km)
            .await
        {
            Ok(stations) => stations,
            Err(e) => {
                warn!(error = %e, "Nearby-station lookup unavailable, skipping broadcast");
                self.counters.record_lookup_failed();
                return;
            }
        };

        for station in stations {
            let msg = ChannelMessage {
                bus_id: self.bus_id.clone(),
                station_id: station.id,
                eta: station.eta,
            };
            match self.channel.send(&msg) {
                Ok(()) => {
                    debug!(station_id = %msg.station_id, eta = msg.eta, "Broadcast ETA frame");
                    self.counters.record_frame_sent();
                }
                Err(e) => {
                    warn!(station_id = %msg.station_id, error = %e, "Broadcast failed");
                }
            }
        }
    }
}
