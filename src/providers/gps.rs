//! Position acquisition for the onboard unit.
//!
//! Reads fixes from a gpsd-compatible daemon over its JSON TCP protocol.
//! When the daemon is unreachable or has no fix yet, a synthetic fix
//! jittered around a configured reference point is substituted so the
//! rest of the tracker keeps exercising its path without hardware.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::GpsConfig;

/// gpsd watch command enabling newline-delimited JSON reports
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true}\n";

/// TPV mode values of 2 (2D) or 3 (3D) carry usable coordinates
const MODE_2D: u8 = 2;

/// Maximum jitter applied around the reference point for synthetic fixes
const SYNTHETIC_JITTER: f64 = 0.01;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A single positioning sample.
///
/// `synthetic` distinguishes generated fixes from live GPS fixes; the
/// serialized form matches what the backend and real-time store expect
/// and deliberately omits the flag.
#[derive(Debug, Clone, Serialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in km/h
    pub speed: f64,
    /// Heading in degrees, 0-359
    pub heading: f64,
    /// Unix seconds at sampling time
    pub timestamp: i64,
    #[serde(skip)]
    pub synthetic: bool,
}

/// Reasons the daemon produced no usable fix this cycle. Never escapes
/// the sampler: every variant is swallowed and replaced by a synthetic
/// fix.
#[derive(Debug, Error)]
enum NoFixAvailable {
    #[error("daemon unreachable: {0}")]
    Unreachable(String),
    #[error("daemon connection closed")]
    Disconnected,
    #[error("no report within {0:?}")]
    Timeout(Duration),
    #[error("no fix yet (mode {0})")]
    NoFix(u8),
}

/// One gpsd JSON report. Only TPV fields are of interest; other classes
/// (VERSION, DEVICES, SKY, ...) parse fine and are skipped by class.
#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: Option<u8>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    /// Speed over ground in m/s
    #[serde(default)]
    speed: Option<f64>,
    /// Course over ground in degrees
    #[serde(default)]
    track: Option<f64>,
}

impl GpsdReport {
    fn is_tpv(&self) -> bool {
        self.class == "TPV"
    }

    fn has_fix(&self) -> bool {
        self.mode.unwrap_or(0) >= MODE_2D && self.lat.is_some() && self.lon.is_some()
    }
}

pub struct PositionSource {
    daemon_addr: String,
    reference: (f64, f64),
    conn: Option<BufReader<TcpStream>>,
}

impl PositionSource {
    pub fn new(config: &GpsConfig) -> Self {
        Self {
            daemon_addr: config.daemon_addr.clone(),
            reference: (config.reference_latitude, config.reference_longitude),
            conn: None,
        }
    }

    /// Sample the current position. Infallible: a daemon failure or a
    /// report without a fix yields a synthetic fix instead of an error.
    pub async fn sample(&mut self) -> Fix {
        match self.poll_daemon().await {
            Ok(fix) => fix,
            Err(e) => {
                debug!(error = %e, "No usable GPS fix, substituting synthetic");
                // Reconnect from scratch next cycle
                self.conn = None;
                self.synthetic_fix()
            }
        }
    }

    async fn poll_daemon(&mut self) -> Result<Fix, NoFixAvailable> {
        if self.conn.is_none() {
            self.conn = Some(self.connect().await?);
        }
        // Checked above
        let Some(reader) = self.conn.as_mut() else {
            return Err(NoFixAvailable::Disconnected);
        };

        let mut last_mode = 0;
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        let mut line = String::new();
        loop {
            line.clear();
            let read = tokio::time::timeout_at(deadline, reader.read_line(&mut line)).await;
            let bytes = match read {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(NoFixAvailable::Unreachable(e.to_string())),
                Err(_) => {
                    if last_mode > 0 {
                        return Err(NoFixAvailable::NoFix(last_mode));
                    }
                    return Err(NoFixAvailable::Timeout(READ_TIMEOUT));
                }
            };
            if bytes == 0 {
                return Err(NoFixAvailable::Disconnected);
            }

            let Ok(report) = serde_json::from_str::<GpsdReport>(line.trim()) else {
                continue;
            };
            if !report.is_tpv() {
                continue;
            }
            if !report.has_fix() {
                last_mode = report.mode.unwrap_or(0);
                continue;
            }

            return Ok(Fix {
                // has_fix() guarantees both coordinates
                latitude: report.lat.unwrap_or_default(),
                longitude: report.lon.unwrap_or_default(),
                speed: report.speed.unwrap_or(0.0) * 3.6,
                heading: report.track.unwrap_or(0.0),
                timestamp: Utc::now().timestamp(),
                synthetic: false,
            });
        }
    }

    async fn connect(&self) -> Result<BufReader<TcpStream>, NoFixAvailable> {
        let connect = TcpStream::connect(&self.daemon_addr);
        let mut stream = match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(NoFixAvailable::Unreachable(e.to_string())),
            Err(_) => return Err(NoFixAvailable::Unreachable("connect timed out".to_string())),
        };
        stream
            .write_all(WATCH_COMMAND)
            .await
            .map_err(|e| NoFixAvailable::Unreachable(e.to_string()))?;
        debug!(daemon = %self.daemon_addr, "Connected to GPS daemon");
        Ok(BufReader::new(stream))
    }

    fn synthetic_fix(&self) -> Fix {
        let mut rng = rand::rng();
        Fix {
            latitude: self.reference.0 + rng.random_range(-SYNTHETIC_JITTER..=SYNTHETIC_JITTER),
            longitude: self.reference.1 + rng.random_range(-SYNTHETIC_JITTER..=SYNTHETIC_JITTER),
            speed: rng.random_range(0.0..=60.0),
            heading: rng.random_range(0.0..=359.0),
            timestamp: Utc::now().timestamp(),
            synthetic: true,
        }
    }
}
