//! Roadside receiver loop for the station unit.
//!
//! Every cycle drains broadcast frames from the short-range link into
//! the presence cache, sweeps out buses unseen for too long, and - when
//! any buses remain - renders the arrivals display and publishes the
//! board to both sinks. A cycle that fails unexpectedly delays the next
//! poll by the error backoff instead of the normal interval.

use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelError, ShortRangeChannel};
use crate::config::Config;
use crate::counters::ReceiverCounters;
use crate::display;
use crate::presence::{PresenceCache, PresenceRecord};
use crate::providers::backend::ApiClient;
use crate::providers::realtime::RealtimeClient;
use crate::publish::{BuildError, Publisher};

/// Upper bound on receives per cycle so a frame burst cannot starve
/// eviction and publishing. Whatever is left stays buffered for the
/// next cycle.
const MAX_DRAIN_PER_CYCLE: usize = 100;

pub struct StationReceiverLoop {
    station_id: String,
    poll_interval: Duration,
    stale_window: Duration,
    error_backoff: Duration,
    channel: ShortRangeChannel,
    cache: PresenceCache,
    publisher: Publisher,
    display: Box<dyn Write + Send>,
    counters: ReceiverCounters,
    /// Set after a failed cycle; the next wait uses the backoff instead
    /// of the poll interval.
    backoff_armed: bool,
}

impl StationReceiverLoop {
    /// Build the unit from configuration. A missing transceiver is not
    /// fatal; the loop runs degraded with a disconnected channel. The
    /// display is stdout, standing in for the physical board.
    pub fn new(config: &Config) -> Result<Self, BuildError> {
        let api = ApiClient::new(&config.backend.base_url, &config.backend.api_key)?;
        let realtime = RealtimeClient::new(&config.realtime.base_url)?;

        Ok(Self {
            station_id: config.station.station_id.clone(),
            poll_interval: Duration::from_secs(config.station.poll_interval_secs),
            stale_window: Duration::from_secs(config.station.stale_after_secs),
            error_backoff: Duration::from_secs(config.station.error_backoff_secs),
            channel: ShortRangeChannel::open(
                &config.transceiver.device,
                config.transceiver.baud_rate,
            ),
            cache: PresenceCache::new(),
            publisher: Publisher::new(api, realtime),
            display: Box::new(io::stdout()),
            counters: ReceiverCounters::new(),
            backoff_armed: false,
        })
    }

    /// Handle onto the loop's cycle counters.
    pub fn counters(&self) -> ReceiverCounters {
        self.counters.clone()
    }

    pub fn is_backing_off(&self) -> bool {
        self.backoff_armed
    }

    /// Run until cancelled. The stop signal is checked at cycle
    /// boundaries only; an in-flight cycle completes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            station_id = %self.station_id,
            poll_secs = self.poll_interval.as_secs(),
            "Station receiver starting"
        );

        loop {
            let wait = if self.backoff_armed {
                self.error_backoff
            } else {
                self.poll_interval
            };

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(station_id = %self.station_id, "Station receiver stopping");
                    return;
                }

                _ = tokio::time::sleep(wait) => {}
            }

            self.backoff_armed = false;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!(
                    error = %e,
                    backoff_secs = self.error_backoff.as_secs(),
                    "Receiver cycle failed, backing off"
                );
                self.counters.record_cycle_error();
                self.backoff_armed = true;
            }
        }
    }

    async fn run_cycle(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        self.counters.record_cycle();

        self.drain_channel(now.timestamp());

        let evicted = self.cache.evict_stale(now.timestamp(), self.stale_window);
        if !evicted.is_empty() {
            debug!(buses = ?evicted, "Evicted stale buses");
            self.counters.record_evictions(evicted.len() as u64);
        }

        if self.cache.is_empty() {
            return Ok(());
        }

        let snapshot = self.cache.snapshot();
        display::render(self.display.as_mut(), &self.station_id, now, &snapshot)?;

        let result = self
            .publisher
            .publish_presence(&self.station_id, now.timestamp(), &snapshot)
            .await;
        self.counters.record_publish(&result);
        debug!(
            buses = snapshot.len(),
            api_ok = result.api_ok,
            realtime_ok = result.realtime_ok,
            "Published station board"
        );
        Ok(())
    }

    /// Pull frames until the channel runs dry or the per-cycle bound is
    /// hit. Malformed frames are dropped; a channel failure ends the
    /// drain for this cycle only.
    fn drain_channel(&mut self, now: i64) {
        for _ in 0..MAX_DRAIN_PER_CYCLE {
            match self.channel.try_receive() {
                Ok(Some(msg)) => {
                    info!(bus_id = %msg.bus_id, eta = msg.eta, "Received bus broadcast");
                    self.counters.record_frame_accepted();
                    self.cache.upsert(PresenceRecord {
                        bus_id: msg.bus_id,
                        eta: msg.eta,
                        last_seen: now,
                    });
                }
                Ok(None) => return,
                Err(ChannelError::MalformedFrame(line)) => {
                    warn!(line = %line, "Dropping malformed frame");
                    self.counters.record_frame_rejected();
                }
                Err(e) => {
                    warn!(error = %e, "Channel receive failed, stopping drain");
                    return;
                }
            }
        }
        debug!(
            limit = MAX_DRAIN_PER_CYCLE,
            "Drain bound reached, deferring remaining frames"
        );
    }
}
